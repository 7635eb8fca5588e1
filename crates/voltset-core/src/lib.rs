//! # voltset-core: data model and oracle contract
//!
//! voltset builds training datasets by perturbing load and generator setpoints
//! inside an external circuit engine and recording the solved bus voltages.
//! This crate holds the pieces every other crate agrees on:
//!
//! - [`CircuitOracle`] - the black-box engine interface (get/set setpoints,
//!   solve, branch outages)
//! - [`Category`] / [`Attribute`] - typed element kinds and attributes, used
//!   instead of string-built property names
//! - [`PowerSetpoint`], [`SolveOutcome`], [`BusVoltage`] - values crossing the
//!   oracle boundary
//! - [`Snapshot`] - the baseline captured before sampling
//! - [`VoltsetError`] - the error taxonomy
//!
//! ## Modules
//!
//! - [`units`] - kW / kvar / per-unit newtypes
//! - [`error`] - unified error type
//! - [`oracle`] - the oracle trait
//! - [`snapshot`] - baseline capture and restore

pub mod error;
pub mod model;
pub mod oracle;
pub mod snapshot;
pub mod units;

pub use error::{VoltsetError, VoltsetResult};
pub use model::{Attribute, BranchKind, BusVoltage, Category, PowerSetpoint, SolveOutcome};
pub use oracle::CircuitOracle;
pub use snapshot::{Snapshot, SnapshotEntry};
pub use units::{Kilovars, Kilowatts, PerUnit};
