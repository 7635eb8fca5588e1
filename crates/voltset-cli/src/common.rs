//! Output formats and oracle construction shared by the commands.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};
use tracing::info;
use voltset_core::CircuitOracle;
use voltset_oracle::{EngineConfig, FixtureOracle, ProcessOracle};

use crate::cli::OracleArgs;

/// Output format for tabular/structured data.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON array
    Json,
    /// JSON Lines, one object per line
    Jsonl,
    /// Comma-separated values
    Csv,
}

/// Build the engine configuration described by the flags.
pub fn engine_config(args: &OracleArgs) -> Result<EngineConfig> {
    let circuit = args
        .circuit
        .clone()
        .ok_or_else(|| anyhow!("--circuit is required unless --fixture is given"))?;
    let mut config = match &args.engine {
        Some(engine) => EngineConfig::new(engine.clone(), circuit),
        None => EngineConfig::for_circuit(circuit),
    };
    if let Some(binary) = &args.engine_bin {
        config = config.with_binary(binary.clone());
    }
    config.max_iterations = args.max_iterations;
    config.max_control_iterations = args.max_control_iterations;
    config.request_timeout_secs = args.request_timeout;
    Ok(config)
}

/// Open the oracle selected by the flags. Failure here means nothing ran.
pub fn open_oracle(args: &OracleArgs) -> Result<Box<dyn CircuitOracle>> {
    if let Some(fixture) = &args.fixture {
        info!("Loading fixture circuit {}", fixture.display());
        let oracle = FixtureOracle::from_path(fixture)
            .with_context(|| format!("loading fixture '{}'", fixture.display()))?;
        return Ok(Box::new(oracle));
    }
    let config = engine_config(args)?;
    info!(
        "Starting engine {} for circuit {}",
        config.engine,
        config.circuit.display()
    );
    let oracle = ProcessOracle::spawn(&config)
        .with_context(|| format!("opening circuit '{}'", config.circuit.display()))?;
    Ok(Box::new(oracle))
}

/// Write data as JSON to the given writer.
pub fn write_json<W: Write, T: Serialize>(
    data: &T,
    writer: &mut W,
    pretty: bool,
) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, data).map_err(io::Error::other)?;
    } else {
        serde_json::to_writer(&mut *writer, data).map_err(io::Error::other)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write data as JSON Lines (one JSON object per line) to the given writer.
pub fn write_jsonl<W: Write, T: Serialize>(data: &[T], writer: &mut W) -> io::Result<()> {
    for item in data {
        serde_json::to_writer(&mut *writer, item).map_err(io::Error::other)?;
        writeln!(writer)?;
    }
    Ok(())
}
