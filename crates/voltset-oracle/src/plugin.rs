//! Plugin harness for engine binaries.
//!
//! An engine adapter implements [`EngineBackend`] and hands it to
//! [`run_engine_plugin`]; the harness owns tracing setup, the request loop and
//! error replies.
//!
//! ```rust,ignore
//! use voltset_oracle::plugin::{run_engine_plugin, EngineBackend};
//!
//! struct DssEngine { /* handle to the simulation library */ }
//!
//! impl EngineBackend for DssEngine {
//!     fn name(&self) -> &'static str { "voltset-opendss" }
//!     // open / names / get / set / solve ...
//! }
//!
//! fn main() {
//!     run_engine_plugin(DssEngine::new());
//! }
//! ```

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info, warn};
use voltset_core::{BranchKind, Category, PowerSetpoint, SolveOutcome};

use crate::error::OracleResult;
use crate::protocol::{write_message, Request, Response};
use crate::PROTOCOL_VERSION;

/// Engine side of the oracle protocol.
pub trait EngineBackend {
    /// The engine name (e.g., "voltset-opendss").
    fn name(&self) -> &'static str;

    /// Compile the circuit and apply solver iteration limits.
    fn open(&mut self, circuit: &str, max_iterations: u32, max_control_iterations: u32)
        -> Result<()>;

    fn names(&mut self, category: Category) -> Result<Vec<String>>;

    fn get(&mut self, category: Category, name: &str) -> Result<PowerSetpoint>;

    fn set(&mut self, category: Category, name: &str, setpoint: PowerSetpoint) -> Result<()>;

    fn solve(&mut self) -> Result<SolveOutcome>;

    /// Switch a line or transformer in or out of service.
    fn switch(&mut self, kind: BranchKind, name: &str, _in_service: bool) -> Result<()> {
        bail!("{} cannot switch {kind} '{name}'", self.name())
    }
}

/// Serve requests from `reader` until `close` or end of input.
///
/// Backend failures are answered with an error response and the loop keeps
/// going; only I/O failures on the streams end it early. Returns the number of
/// requests handled.
pub fn serve<B, R, W>(backend: &mut B, reader: R, mut writer: W) -> OracleResult<usize>
where
    B: EngineBackend + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut handled = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        handled += 1;
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!("malformed request: {err}");
                write_message(
                    &mut writer,
                    &Response::Error {
                        message: format!("malformed request: {err}"),
                    },
                )?;
                continue;
            }
        };
        debug!(op = request.op(), "handling request");
        if request == Request::Close {
            write_message(&mut writer, &Response::Ok)?;
            break;
        }
        let response = match dispatch(backend, request) {
            Ok(response) => response,
            Err(err) => Response::Error {
                message: format!("{err:#}"),
            },
        };
        write_message(&mut writer, &response)?;
    }
    Ok(handled)
}

fn dispatch<B: EngineBackend + ?Sized>(backend: &mut B, request: Request) -> Result<Response> {
    let response = match request {
        Request::Open {
            circuit,
            max_iterations,
            max_control_iterations,
            protocol,
        } => {
            if protocol != PROTOCOL_VERSION {
                bail!(
                    "protocol version {protocol} not supported (engine speaks {PROTOCOL_VERSION})"
                );
            }
            backend.open(&circuit, max_iterations, max_control_iterations)?;
            info!("{} compiled circuit {}", backend.name(), circuit);
            Response::Ok
        }
        Request::Names { category } => Response::Names {
            names: backend.names(category)?,
        },
        Request::Get { category, name } => {
            let setpoint = backend.get(category, &name)?;
            Response::Setpoint {
                kw: setpoint.real_power.value(),
                kvar: setpoint.reactive_power.value(),
            }
        }
        Request::Set {
            category,
            name,
            kw,
            kvar,
        } => {
            backend.set(category, &name, PowerSetpoint::new(kw, kvar))?;
            Response::Ok
        }
        Request::Solve => {
            let outcome = backend.solve()?;
            Response::Solution {
                converged: outcome.converged,
                buses: outcome.voltages,
            }
        }
        Request::Switch {
            kind,
            name,
            in_service,
        } => {
            backend.switch(kind, &name, in_service)?;
            info!(in_service, "switched {kind} {name}");
            Response::Ok
        }
        Request::Close => Response::Ok,
    };
    Ok(response)
}

/// Run an engine plugin on stdin/stdout and exit.
///
/// Tracing goes to stderr (respects `RUST_LOG`) so stdout stays reserved for
/// protocol messages.
pub fn run_engine_plugin<B: EngineBackend>(mut backend: B) -> ! {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    info!(
        "{} v{} (protocol v{})",
        backend.name(),
        env!("CARGO_PKG_VERSION"),
        PROTOCOL_VERSION
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let code = match serve(&mut backend, stdin.lock(), stdout.lock()) {
        Ok(handled) => {
            debug!("served {handled} requests");
            0
        }
        Err(err) => {
            error!("engine I/O failed: {err}");
            1
        }
    };
    std::process::exit(code);
}
