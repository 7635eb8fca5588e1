use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use voltset_core::{Category, VoltsetError, VoltsetResult};

/// Inclusive percentage range, e.g. `{ min: -50, max: 50 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PercentRange {
    pub min: f64,
    pub max: f64,
}

impl PercentRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, pct: f64) -> bool {
        pct >= self.min && pct <= self.max
    }

    /// Draw a percentage uniformly from `[min, max]`.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..=self.max)
    }

    fn check(&self, what: &str) -> VoltsetResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(VoltsetError::Config(format!(
                "{what} range bounds must be finite"
            )));
        }
        if self.min > self.max {
            return Err(VoltsetError::Config(format!(
                "{what} range min ({}) exceeds max ({})",
                self.min, self.max
            )));
        }
        if self.min < -100.0 {
            return Err(VoltsetError::Config(format!(
                "{what} range min ({}) is below -100%; setpoints would change sign",
                self.min
            )));
        }
        Ok(())
    }
}

/// How one category of components is perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryPerturbation {
    /// Fraction of the category perturbed per scenario, in `[0, 1]`.
    pub fraction: f64,
    pub real_power: PercentRange,
    pub reactive_power: PercentRange,
}

impl CategoryPerturbation {
    fn default_for(category: Category) -> Self {
        let fraction = match category {
            Category::Load => 0.7,
            Category::Generator => 0.3,
        };
        Self {
            fraction,
            real_power: PercentRange::new(-50.0, 50.0),
            reactive_power: PercentRange::new(-10.0, 10.0),
        }
    }
}

fn default_loads() -> CategoryPerturbation {
    CategoryPerturbation::default_for(Category::Load)
}

fn default_generators() -> CategoryPerturbation {
    CategoryPerturbation::default_for(Category::Generator)
}

fn default_scenarios() -> usize {
    500
}

fn default_output() -> PathBuf {
    PathBuf::from("training_data.csv")
}

/// Sampler settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    #[serde(default = "default_scenarios")]
    pub scenarios: usize,
    /// Seed for the scenario RNG; unset means a fresh entropy seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_loads")]
    pub loads: CategoryPerturbation,
    #[serde(default = "default_generators")]
    pub generators: CategoryPerturbation,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            scenarios: default_scenarios(),
            seed: None,
            loads: default_loads(),
            generators: default_generators(),
            output: default_output(),
        }
    }
}

impl SamplerConfig {
    pub fn perturbation(&self, category: Category) -> &CategoryPerturbation {
        match category {
            Category::Load => &self.loads,
            Category::Generator => &self.generators,
        }
    }

    /// Default configuration rendered as YAML.
    pub fn template() -> Result<String> {
        serde_yaml::to_string(&Self::default()).context("rendering config template")
    }
}

pub fn load_config_from_path(path: &Path) -> Result<SamplerConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading sampler config '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing sampler config yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing sampler config json")
        }
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(&data).context("parsing sampler config toml")
        }
        _ => serde_yaml::from_str(&data)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(&data).map_err(anyhow::Error::from))
            .or_else(|_| toml::from_str(&data).map_err(anyhow::Error::from))
            .context("parsing sampler config"),
    }
}

/// Reject configurations the sampler cannot run, before any oracle call.
pub fn validate(config: &SamplerConfig) -> VoltsetResult<()> {
    if config.scenarios == 0 {
        return Err(VoltsetError::Config("scenarios must be >= 1".to_string()));
    }
    for category in Category::ALL {
        let perturbation = config.perturbation(category);
        let fraction = perturbation.fraction;
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(VoltsetError::Config(format!(
                "{category} fraction {fraction} must be within [0, 1]"
            )));
        }
        perturbation
            .real_power
            .check(&format!("{category} real power"))?;
        perturbation
            .reactive_power
            .check(&format!("{category} reactive power"))?;
    }
    Ok(())
}
