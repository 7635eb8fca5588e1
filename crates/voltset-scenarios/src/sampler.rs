//! Randomized scenario sampling.
//!
//! Each scenario starts from the baseline [`Snapshot`], scales a random subset
//! of loads and generators by uniformly drawn percentages, solves, and records
//! one [`DatasetRow`] if the solve converged. Non-converged scenarios are
//! counted and skipped. After the loop the circuit is reset to its baseline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use voltset_core::{
    Category, CircuitOracle, PowerSetpoint, Snapshot, SnapshotEntry, SolveOutcome, VoltsetError,
    VoltsetResult,
};

use crate::config::{validate, CategoryPerturbation, SamplerConfig};
use crate::dataset::{DatasetRow, Observation, RowSink, Schema};

/// Number of components perturbed per scenario: `round(fraction * total)`,
/// at least one, at most `total`.
pub fn selection_count(fraction: f64, total: usize) -> usize {
    let wanted = (fraction * total as f64).round().max(1.0) as usize;
    wanted.min(total)
}

/// One component's change within a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    pub category: Category,
    pub name: String,
    pub real_pct: f64,
    pub reactive_pct: f64,
    /// Setpoint written to the oracle.
    pub setpoint: PowerSetpoint,
}

/// Components selected for one scenario and the percentages applied to them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioDraw {
    pub index: usize,
    pub perturbations: Vec<Perturbation>,
}

impl ScenarioDraw {
    pub fn selected(&self, category: Category) -> impl Iterator<Item = &Perturbation> {
        self.perturbations
            .iter()
            .filter(move |perturbation| perturbation.category == category)
    }
}

/// Outcome counters of one sampling run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleSummary {
    pub requested: usize,
    pub attempted: usize,
    pub retained: usize,
    pub skipped: usize,
    pub interrupted: bool,
    pub loads: usize,
    pub generators: usize,
    pub loads_per_scenario: usize,
    pub generators_per_scenario: usize,
}

pub struct Sampler {
    config: SamplerConfig,
    seed: u64,
    rng: StdRng,
    stop: Option<Arc<AtomicBool>>,
}

impl Sampler {
    /// Validate `config` and seed the generator. Without a configured seed a
    /// random one is drawn so the run can still be reproduced from its manifest.
    pub fn new(config: SamplerConfig) -> VoltsetResult<Self> {
        validate(&config)?;
        let seed = config
            .seed
            .unwrap_or_else(|| StdRng::from_entropy().gen::<u64>());
        Ok(Self {
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
            stop: None,
        })
    }

    /// Checked before every scenario; once set the run ends early.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Seed actually used by the generator.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run<O, S>(&mut self, oracle: &mut O, sink: &mut S) -> VoltsetResult<SampleSummary>
    where
        O: CircuitOracle + ?Sized,
        S: RowSink + ?Sized,
    {
        self.run_with(oracle, sink, |_, _| {})
    }

    /// Like [`Sampler::run`], calling `observe` after every solve.
    pub fn run_with<O, S, F>(
        &mut self,
        oracle: &mut O,
        sink: &mut S,
        observe: F,
    ) -> VoltsetResult<SampleSummary>
    where
        O: CircuitOracle + ?Sized,
        S: RowSink + ?Sized,
        F: FnMut(&ScenarioDraw, &SolveOutcome),
    {
        let snapshot = Snapshot::capture(oracle)?;
        let result = self.sample_scenarios(oracle, sink, &snapshot, observe);
        let restored = snapshot.restore(oracle);
        let summary = result?;
        restored?;
        info!(
            requested = summary.requested,
            attempted = summary.attempted,
            retained = summary.retained,
            skipped = summary.skipped,
            interrupted = summary.interrupted,
            "sampling finished"
        );
        Ok(summary)
    }

    fn sample_scenarios<O, S, F>(
        &mut self,
        oracle: &mut O,
        sink: &mut S,
        snapshot: &Snapshot,
        mut observe: F,
    ) -> VoltsetResult<SampleSummary>
    where
        O: CircuitOracle + ?Sized,
        S: RowSink + ?Sized,
        F: FnMut(&ScenarioDraw, &SolveOutcome),
    {
        let loads: Vec<&SnapshotEntry> = entries(snapshot, Category::Load);
        let generators: Vec<&SnapshotEntry> = entries(snapshot, Category::Generator);
        let mut summary = SampleSummary {
            requested: self.config.scenarios,
            loads: loads.len(),
            generators: generators.len(),
            loads_per_scenario: selection_count(self.config.loads.fraction, loads.len()),
            generators_per_scenario: selection_count(
                self.config.generators.fraction,
                generators.len(),
            ),
            ..SampleSummary::default()
        };
        info!(
            scenarios = summary.requested,
            seed = self.seed,
            loads = summary.loads,
            generators = summary.generators,
            loads_per_scenario = summary.loads_per_scenario,
            generators_per_scenario = summary.generators_per_scenario,
            "sampling scenarios"
        );

        let mut schema: Option<Schema> = None;
        for index in 0..self.config.scenarios {
            if self.stop_requested() {
                warn!(attempted = summary.attempted, "stop requested; ending early");
                summary.interrupted = true;
                break;
            }

            snapshot.restore(oracle)?;
            let mut draw = ScenarioDraw {
                index,
                perturbations: Vec::new(),
            };
            let loads_cfg = self.config.loads;
            let generators_cfg = self.config.generators;
            self.draw_category(
                &mut draw,
                &loads,
                summary.loads_per_scenario,
                &loads_cfg,
            );
            self.draw_category(
                &mut draw,
                &generators,
                summary.generators_per_scenario,
                &generators_cfg,
            );
            for perturbation in &draw.perturbations {
                oracle.set_parameters(
                    perturbation.category,
                    &perturbation.name,
                    perturbation.setpoint,
                )?;
            }

            let outcome = oracle.solve()?;
            summary.attempted += 1;
            observe(&draw, &outcome);
            if !outcome.converged {
                summary.skipped += 1;
                warn!(scenario = index, "solution did not converge; skipping scenario");
                continue;
            }

            let observation = Observation::collect(oracle, outcome)?;
            if schema.is_none() {
                schema = Some(Schema::from_observation(&observation)?);
            }
            if let Some(schema) = &schema {
                let row = DatasetRow::from_observation(schema, &observation)?;
                sink.accept(schema, &row)?;
            }
            summary.retained += 1;
            debug!(
                scenario = index,
                perturbed = draw.perturbations.len(),
                "scenario retained"
            );
        }
        Ok(summary)
    }

    fn draw_category(
        &mut self,
        draw: &mut ScenarioDraw,
        components: &[&SnapshotEntry],
        count: usize,
        perturbation: &CategoryPerturbation,
    ) {
        if count == 0 {
            return;
        }
        let picked = rand::seq::index::sample(&mut self.rng, components.len(), count);
        for idx in picked.iter() {
            let entry = components[idx];
            let real_pct = perturbation.real_power.sample(&mut self.rng);
            let reactive_pct = perturbation.reactive_power.sample(&mut self.rng);
            draw.perturbations.push(Perturbation {
                category: entry.category,
                name: entry.name.clone(),
                real_pct,
                reactive_pct,
                setpoint: entry.setpoint.scaled(real_pct, reactive_pct),
            });
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Solve the circuit as it stands and read back features and voltages.
    /// Non-convergence is an error here.
    pub fn solve_once<O: CircuitOracle + ?Sized>(oracle: &mut O) -> VoltsetResult<Observation> {
        let outcome = oracle.solve()?;
        if !outcome.converged {
            return Err(VoltsetError::NotConverged);
        }
        Observation::collect(oracle, outcome)
    }
}

fn entries(snapshot: &Snapshot, category: Category) -> Vec<&SnapshotEntry> {
    snapshot
        .iter()
        .filter(|entry| entry.category == category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_count_rounds_and_clamps() {
        assert_eq!(selection_count(0.5, 4), 2);
        assert_eq!(selection_count(0.1, 4), 1);
        assert_eq!(selection_count(0.0, 4), 1);
        assert_eq!(selection_count(1.0, 4), 4);
        assert_eq!(selection_count(0.7, 10), 7);
        assert_eq!(selection_count(0.3, 5), 2);
        assert_eq!(selection_count(0.5, 0), 0);
    }

    #[test]
    fn selection_count_rounds_half_away_from_zero() {
        assert_eq!(selection_count(0.5, 5), 3);
        assert_eq!(selection_count(0.5, 3), 2);
        assert_eq!(selection_count(0.25, 6), 2);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = SamplerConfig::default();
        config.scenarios = 0;
        assert!(matches!(
            Sampler::new(config),
            Err(VoltsetError::Config(_))
        ));
    }

    #[test]
    fn configured_seed_is_kept() {
        let config = SamplerConfig {
            seed: Some(42),
            ..SamplerConfig::default()
        };
        assert_eq!(Sampler::new(config).unwrap().seed(), 42);
    }

    #[test]
    fn draw_selects_distinct_components_within_range() {
        let snapshot = Snapshot::from_entries((1..=6).map(|i| {
            (
                Category::Load,
                format!("L{i}"),
                PowerSetpoint::new(10.0, 2.0),
            )
        }))
        .unwrap();
        let loads = entries(&snapshot, Category::Load);
        let config = SamplerConfig {
            seed: Some(3),
            ..SamplerConfig::default()
        };
        let mut sampler = Sampler::new(config).unwrap();
        let perturbation = sampler.config.loads;
        for _ in 0..50 {
            let mut draw = ScenarioDraw::default();
            sampler.draw_category(&mut draw, &loads, 4, &perturbation);
            let mut names: Vec<&str> = draw
                .perturbations
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), 4);
            for p in &draw.perturbations {
                assert!(perturbation.real_power.contains(p.real_pct));
                assert!(perturbation.reactive_power.contains(p.reactive_pct));
                let kw = p.setpoint.real_power.value();
                assert!((5.0..=15.0).contains(&kw));
            }
        }
    }
}
