//! Engine subprocess management.
//!
//! A [`ProcessOracle`] owns one long-lived engine process. The engine compiles
//! the circuit on `open` and keeps it in memory; every later request mutates or
//! solves that same circuit.
//!
//! Engine stdout is drained by a reader thread into a channel so a request can
//! wait with a deadline. An engine that misses the deadline is killed and the
//! oracle is closed.

use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use voltset_core::{
    BranchKind, Category, CircuitOracle, PowerSetpoint, SolveOutcome, VoltsetError,
    VoltsetResult,
};

use crate::error::{OracleError, OracleResult};
use crate::protocol::{parse_message, read_line, write_message, Request, Response};
use crate::PROTOCOL_VERSION;

const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// How to launch an engine and which circuit to compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine name, used for binary discovery when `binary` is unset.
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Explicit path to the engine executable.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Extra arguments passed to the engine executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Circuit file the engine compiles on open.
    pub circuit: PathBuf,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_control_iterations")]
    pub max_control_iterations: u32,
    /// Seconds to wait for each engine response. Unset waits forever.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_engine() -> String {
    "voltset-opendss".to_string()
}

fn default_max_iterations() -> u32 {
    1000
}

fn default_max_control_iterations() -> u32 {
    100
}

impl EngineConfig {
    pub fn new(engine: impl Into<String>, circuit: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            binary: None,
            args: Vec::new(),
            circuit: circuit.into(),
            max_iterations: default_max_iterations(),
            max_control_iterations: default_max_control_iterations(),
            request_timeout_secs: None,
        }
    }

    /// Configuration for the default engine.
    pub fn for_circuit(circuit: impl Into<PathBuf>) -> Self {
        Self::new(default_engine(), circuit)
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = Some(seconds);
        self
    }

    /// Locate the engine executable.
    ///
    /// Search order:
    /// 1. `binary` if set
    /// 2. ~/.voltset/engines/<engine>
    /// 3. System PATH
    pub fn resolve_binary(&self) -> OracleResult<PathBuf> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }

        if let Some(home) = dirs::home_dir() {
            let local = home.join(".voltset").join("engines").join(&self.engine);
            if local.exists() {
                return Ok(local);
            }
        }

        if let Ok(path) = which::which(&self.engine) {
            return Ok(path);
        }

        Err(OracleError::NotInstalled {
            engine: self.engine.clone(),
            hint: self.engine.clone(),
        })
    }
}

/// Oracle backed by an engine subprocess speaking the JSON-lines protocol.
pub struct ProcessOracle {
    engine: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    responses: Receiver<OracleResult<String>>,
    timeout: Option<Duration>,
}

impl ProcessOracle {
    /// Spawn the engine and compile the configured circuit.
    ///
    /// Any failure here is a setup failure: the caller gets
    /// [`VoltsetError::OracleUnavailable`] and no scenario should run.
    pub fn spawn(config: &EngineConfig) -> VoltsetResult<Self> {
        Self::spawn_inner(config).map_err(|err| VoltsetError::OracleUnavailable(err.to_string()))
    }

    fn spawn_inner(config: &EngineConfig) -> OracleResult<Self> {
        let binary = config.resolve_binary()?;
        info!(
            "starting engine {} ({}) for circuit {}",
            config.engine,
            binary.display(),
            config.circuit.display()
        );

        let mut child = Command::new(&binary)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(OracleError::ProcessStart)?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (stdin, stdout) = match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::Protocol(
                    "engine stdio was not captured".to_string(),
                ));
            }
        };

        let (sender, responses) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let next = read_line(&mut reader);
                let done = !matches!(next, Ok(Some(_)));
                if let Some(line) = next.transpose() {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                if done {
                    break;
                }
            }
        });

        let mut oracle = ProcessOracle {
            engine: config.engine.clone(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            responses,
            timeout: config.request_timeout_secs.map(Duration::from_secs),
        };

        let open = Request::Open {
            circuit: config.circuit.display().to_string(),
            max_iterations: config.max_iterations,
            max_control_iterations: config.max_control_iterations,
            protocol: PROTOCOL_VERSION,
        };
        match oracle.request(&open)? {
            Response::Ok => Ok(oracle),
            other => Err(unexpected(&open, &other)),
        }
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Send one request and wait for its response.
    fn request(&mut self, request: &Request) -> OracleResult<Response> {
        let stdin = self.stdin.as_mut().ok_or(OracleError::Closed)?;
        debug!(op = request.op(), "engine request");
        write_message(stdin, request)?;
        let line = match self.timeout {
            Some(limit) => match self.responses.recv_timeout(limit) {
                Ok(line) => line?,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "engine {} did not answer '{}' in time; killing it",
                        self.engine,
                        request.op()
                    );
                    self.stdin = None;
                    let _ = self.child.kill();
                    return Err(OracleError::Timeout {
                        seconds: limit.as_secs(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(OracleError::Closed),
            },
            None => self.responses.recv().map_err(|_| OracleError::Closed)??,
        };
        match parse_message::<Response>(&line)? {
            Response::Error { message } => Err(OracleError::Engine(message)),
            response => Ok(response),
        }
    }

    /// Ask the engine to exit and reap it, killing it if it lingers.
    fn shutdown(&mut self) {
        if self.stdin.is_some() {
            if let Err(err) = self.request(&Request::Close) {
                debug!("engine close request failed: {err}");
            }
        }
        self.stdin = None;

        let deadline = Instant::now() + CLOSE_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        warn!("engine {} exited with {status}", self.engine);
                    }
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                _ => break,
            }
        }
        warn!("engine {} did not exit; killing it", self.engine);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ProcessOracle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unexpected(request: &Request, response: &Response) -> OracleError {
    OracleError::Protocol(format!(
        "unexpected response to '{}': {:?}",
        request.op(),
        response
    ))
}

impl CircuitOracle for ProcessOracle {
    fn component_names(&mut self, category: Category) -> VoltsetResult<Vec<String>> {
        let request = Request::Names { category };
        match self.request(&request)? {
            Response::Names { names } => Ok(names),
            other => Err(unexpected(&request, &other).into()),
        }
    }

    fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint> {
        let request = Request::Get {
            category,
            name: name.to_string(),
        };
        match self.request(&request)? {
            Response::Setpoint { kw, kvar } => Ok(PowerSetpoint::new(kw, kvar)),
            other => Err(unexpected(&request, &other).into()),
        }
    }

    fn set_parameters(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()> {
        let request = Request::Set {
            category,
            name: name.to_string(),
            kw: setpoint.real_power.value(),
            kvar: setpoint.reactive_power.value(),
        };
        match self.request(&request)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(&request, &other).into()),
        }
    }

    fn solve(&mut self) -> VoltsetResult<SolveOutcome> {
        let request = Request::Solve;
        match self.request(&request)? {
            Response::Solution { converged, buses } => Ok(SolveOutcome {
                converged,
                voltages: buses,
            }),
            other => Err(unexpected(&request, &other).into()),
        }
    }

    fn set_in_service(
        &mut self,
        kind: BranchKind,
        name: &str,
        in_service: bool,
    ) -> VoltsetResult<()> {
        let request = Request::Switch {
            kind,
            name: name.to_string(),
            in_service,
        };
        match self.request(&request)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(&request, &other).into()),
        }
    }
}
