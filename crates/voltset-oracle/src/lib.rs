//! Circuit oracles for voltset.
//!
//! The sampler only knows the [`voltset_core::CircuitOracle`] trait. This
//! crate provides the implementations:
//!
//! - [`ProcessOracle`] - drives an external engine process over a
//!   line-delimited JSON protocol on stdin/stdout
//! - [`FixtureOracle`] - an in-memory circuit with fixed voltages, for dry runs
//!   and tests
//!
//! and the engine side of the protocol ([`plugin`]), so an engine adapter
//! written in Rust only has to implement [`EngineBackend`].
//!
//! ```text
//! voltset ──stdin──> engine (subprocess, one circuit in memory)
//!         <─stdout──
//!         <─stderr── (logs, inherited)
//! ```

pub mod error;
pub mod fixture;
pub mod plugin;
pub mod process;
pub mod protocol;

pub use error::{OracleError, OracleResult};
pub use fixture::{
    load_fixture_from_path, FixtureBranch, FixtureCircuit, FixtureComponent, FixtureEngine,
    FixtureOracle,
};
pub use plugin::{run_engine_plugin, serve, EngineBackend};
pub use process::{EngineConfig, ProcessOracle};
pub use protocol::{Request, Response};

/// Protocol version for engine compatibility checking.
/// Increment when making breaking changes to the message format.
pub const PROTOCOL_VERSION: i32 = 1;
