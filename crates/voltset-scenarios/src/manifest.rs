use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::SamplerConfig;
use crate::sampler::SampleSummary;

/// Record of one sampling run, written next to the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub output: PathBuf,
    pub seed: u64,
    pub config: SamplerConfig,
    pub summary: SampleSummary,
}

impl SampleManifest {
    pub fn new(output: &Path, seed: u64, config: &SamplerConfig, summary: &SampleSummary) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            output: output.to_path_buf(),
            seed,
            config: config.clone(),
            summary: summary.clone(),
        }
    }
}

/// `training_data.csv` -> `training_data.csv.manifest.json`.
pub fn manifest_path_for(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("dataset"));
    name.push(".manifest.json");
    output.with_file_name(name)
}

pub fn write_manifest(path: &Path, manifest: &SampleManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
        }
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing sample manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing sample manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<SampleManifest> {
    let file = File::open(path)
        .with_context(|| format!("opening sample manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing sample manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn manifest_path_sits_next_to_output() {
        assert_eq!(
            manifest_path_for(Path::new("out/training_data.csv")),
            PathBuf::from("out/training_data.csv.manifest.json")
        );
    }

    #[test]
    fn manifest_writes_and_reads_back() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("data.csv");
        let summary = SampleSummary {
            requested: 10,
            attempted: 10,
            retained: 8,
            skipped: 2,
            ..SampleSummary::default()
        };
        let manifest = SampleManifest::new(&output, 7, &SamplerConfig::default(), &summary);
        let path = manifest_path_for(&output);
        write_manifest(&path, &manifest).unwrap();

        let parsed = load_manifest(&path).unwrap();
        assert_eq!(parsed.run_id, manifest.run_id);
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.summary, summary);
        assert_eq!(parsed.config, SamplerConfig::default());
    }
}
