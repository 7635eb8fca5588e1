//! Scenario sampling and dataset building for voltset.
//!
//! [`Sampler`] drives a [`voltset_core::CircuitOracle`] through randomized
//! load/generator perturbations and streams converged results into a
//! [`RowSink`], usually a [`CsvSink`]. [`run_what_if`] answers one-off
//! questions about the same circuit: scale some components, switch branches
//! out, and compare bus voltages against the unmodified solve.

pub mod config;
pub mod dataset;
pub mod manifest;
pub mod sampler;
pub mod whatif;

pub use config::{
    load_config_from_path, validate, CategoryPerturbation, PercentRange, SamplerConfig,
};
pub use dataset::{ColumnKey, CsvSink, Dataset, DatasetRow, Observation, RowSink, Schema};
pub use manifest::{load_manifest, manifest_path_for, write_manifest, SampleManifest};
pub use sampler::{selection_count, Perturbation, SampleSummary, Sampler, ScenarioDraw};
pub use whatif::{
    run_what_if, Outage, ScaleAdjustment, ScaleTarget, SetpointChange, VoltageComparison, WhatIf,
    WhatIfReport,
};
