//! In-memory fixture circuit.
//!
//! A fixture lists loads and generators with baseline setpoints, buses with
//! their baseline solved voltages, and optionally lines and transformers that
//! can be switched out. A solve returns the listed voltages shifted by a linear
//! droop:
//!
//! ```text
//! vm_pu = listed - kw_sensitivity_pu * (net load kW - baseline net load kW)
//!                - sum(outage_drop_pu of out-of-service branches)
//! ```
//!
//! where net load is total load kW minus total generator kW. Both terms are zero
//! by default, so a plain fixture answers with fixed voltages. Every
//! `diverge_every`-th solve reports non-convergence instead. That is enough to
//! drive the sampler end to end without an engine.
//!
//! ```yaml
//! name: four-load-feeder
//! loads:
//!   - { name: L1, kw: 10.0, kvar: 2.0 }
//! generators:
//!   - { name: G1, kw: 50.0, kvar: 0.0 }
//! lines:
//!   - { name: L12, outage_drop_pu: 0.02 }
//! buses:
//!   - { bus: B1, vm_pu: 1.0 }
//! kw_sensitivity_pu: 0.0005
//! diverge_every: 4
//! ```

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;
use voltset_core::{
    BranchKind, BusVoltage, Category, CircuitOracle, PowerSetpoint, SolveOutcome, VoltsetError,
    VoltsetResult,
};

use crate::error::{OracleError, OracleResult};
use crate::plugin::EngineBackend;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureComponent {
    pub name: String,
    pub kw: f64,
    pub kvar: f64,
}

/// Switchable line or transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureBranch {
    pub name: String,
    /// Voltage drop applied to every bus while the branch is out of service.
    #[serde(default)]
    pub outage_drop_pu: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureCircuit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub loads: Vec<FixtureComponent>,
    #[serde(default)]
    pub generators: Vec<FixtureComponent>,
    #[serde(default)]
    pub lines: Vec<FixtureBranch>,
    #[serde(default)]
    pub transformers: Vec<FixtureBranch>,
    #[serde(default)]
    pub buses: Vec<BusVoltage>,
    /// Per-unit voltage drop per kW of added net load.
    #[serde(default)]
    pub kw_sensitivity_pu: f64,
    /// Report non-convergence on every n-th solve.
    #[serde(default)]
    pub diverge_every: Option<usize>,
}

impl FixtureCircuit {
    fn components(&self, category: Category) -> &[FixtureComponent] {
        match category {
            Category::Load => &self.loads,
            Category::Generator => &self.generators,
        }
    }

    fn branches(&self, kind: BranchKind) -> &[FixtureBranch] {
        match kind {
            BranchKind::Line => &self.lines,
            BranchKind::Transformer => &self.transformers,
        }
    }

    /// Baseline load kW minus generator kW.
    fn baseline_net_load(&self) -> f64 {
        let loads: f64 = self.loads.iter().map(|c| c.kw).sum();
        let generators: f64 = self.generators.iter().map(|c| c.kw).sum();
        loads - generators
    }

    pub fn validate(&self) -> OracleResult<()> {
        for category in Category::ALL {
            let mut seen = HashSet::new();
            for component in self.components(category) {
                if !seen.insert(component.name.as_str()) {
                    return Err(OracleError::Fixture(format!(
                        "duplicate {category} '{}' in fixture",
                        component.name
                    )));
                }
                if !component.kw.is_finite() || !component.kvar.is_finite() {
                    return Err(OracleError::Fixture(format!(
                        "{category} '{}' has a non-finite setpoint",
                        component.name
                    )));
                }
            }
        }
        for kind in BranchKind::ALL {
            let mut seen = HashSet::new();
            for branch in self.branches(kind) {
                if !seen.insert(branch.name.as_str()) {
                    return Err(OracleError::Fixture(format!(
                        "duplicate {kind} '{}' in fixture",
                        branch.name
                    )));
                }
                if !branch.outage_drop_pu.is_finite() {
                    return Err(OracleError::Fixture(format!(
                        "{kind} '{}' has a non-finite outage drop",
                        branch.name
                    )));
                }
            }
        }
        if !self.kw_sensitivity_pu.is_finite() {
            return Err(OracleError::Fixture("kw_sensitivity_pu must be finite".to_string()));
        }
        let mut buses = HashSet::new();
        for bus in &self.buses {
            if !buses.insert(bus.bus.as_str()) {
                return Err(OracleError::Fixture(format!(
                    "duplicate bus '{}' in fixture",
                    bus.bus
                )));
            }
        }
        if self.diverge_every == Some(0) {
            return Err(OracleError::Fixture(
                "diverge_every must be >= 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_fixture_from_path(path: &Path) -> OracleResult<FixtureCircuit> {
    let data = fs::read_to_string(path).map_err(|err| {
        OracleError::Fixture(format!("reading fixture '{}': {err}", path.display()))
    })?;
    let extension = path.extension().and_then(|ext| ext.to_str());
    let parsed: Result<FixtureCircuit, String> = match extension {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).map_err(|err| err.to_string())
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).map_err(|err| err.to_string())
        }
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(&data).map_err(|err| err.to_string())
        }
        _ => serde_yaml::from_str(&data)
            .map_err(|err| err.to_string())
            .or_else(|_| serde_json::from_str(&data).map_err(|err| err.to_string()))
            .or_else(|_| toml::from_str(&data).map_err(|err| err.to_string())),
    };
    let circuit = parsed.map_err(|err| {
        OracleError::Fixture(format!("parsing fixture '{}': {err}", path.display()))
    })?;
    circuit.validate()?;
    Ok(circuit)
}

/// Oracle over a [`FixtureCircuit`] held in memory.
#[derive(Debug, Clone)]
pub struct FixtureOracle {
    circuit: FixtureCircuit,
    state: HashMap<(Category, String), PowerSetpoint>,
    out_of_service: HashSet<(BranchKind, String)>,
    solves: usize,
}

impl FixtureOracle {
    pub fn new(circuit: FixtureCircuit) -> OracleResult<Self> {
        circuit.validate()?;
        let mut state = HashMap::new();
        for category in Category::ALL {
            for component in circuit.components(category) {
                state.insert(
                    (category, component.name.clone()),
                    PowerSetpoint::new(component.kw, component.kvar),
                );
            }
        }
        Ok(Self {
            circuit,
            state,
            out_of_service: HashSet::new(),
            solves: 0,
        })
    }

    pub fn from_path(path: &Path) -> OracleResult<Self> {
        Self::new(load_fixture_from_path(path)?)
    }

    pub fn circuit(&self) -> &FixtureCircuit {
        &self.circuit
    }

    /// Number of solves performed so far.
    pub fn solve_count(&self) -> usize {
        self.solves
    }

    pub fn is_in_service(&self, kind: BranchKind, name: &str) -> bool {
        !self.out_of_service.contains(&(kind, name.to_string()))
    }

    /// Current load kW minus generator kW, summed in circuit order.
    fn net_load(&self) -> f64 {
        let total = |category: Category| -> f64 {
            self.circuit
                .components(category)
                .iter()
                .filter_map(|c| self.state.get(&(category, c.name.clone())))
                .map(|setpoint| setpoint.real_power.value())
                .sum()
        };
        total(Category::Load) - total(Category::Generator)
    }

    fn outage_drop(&self) -> f64 {
        BranchKind::ALL
            .iter()
            .flat_map(move |&kind| {
                self.circuit
                    .branches(kind)
                    .iter()
                    .filter(move |branch| !self.is_in_service(kind, &branch.name))
            })
            .map(|branch| branch.outage_drop_pu)
            .sum()
    }

    fn lookup(&mut self, category: Category, name: &str) -> VoltsetResult<&mut PowerSetpoint> {
        self.state
            .get_mut(&(category, name.to_string()))
            .ok_or_else(|| VoltsetError::Oracle(format!("unknown {category} '{name}'")))
    }
}

impl CircuitOracle for FixtureOracle {
    fn component_names(&mut self, category: Category) -> VoltsetResult<Vec<String>> {
        Ok(self
            .circuit
            .components(category)
            .iter()
            .map(|component| component.name.clone())
            .collect())
    }

    fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint> {
        self.lookup(category, name).map(|setpoint| *setpoint)
    }

    fn set_parameters(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()> {
        if !setpoint.real_power.is_finite() || !setpoint.reactive_power.is_finite() {
            return Err(VoltsetError::Oracle(format!(
                "non-finite setpoint for {category} '{name}'"
            )));
        }
        *self.lookup(category, name)? = setpoint;
        Ok(())
    }

    fn solve(&mut self) -> VoltsetResult<SolveOutcome> {
        self.solves += 1;
        if let Some(every) = self.circuit.diverge_every {
            if self.solves % every == 0 {
                return Ok(SolveOutcome::diverged());
            }
        }
        let shift = self.circuit.kw_sensitivity_pu
            * (self.net_load() - self.circuit.baseline_net_load())
            + self.outage_drop();
        let voltages = self
            .circuit
            .buses
            .iter()
            .map(|bus| BusVoltage::new(bus.bus.clone(), bus.vm_pu.value() - shift))
            .collect();
        Ok(SolveOutcome::converged(voltages))
    }

    fn set_in_service(
        &mut self,
        kind: BranchKind,
        name: &str,
        in_service: bool,
    ) -> VoltsetResult<()> {
        if !self.circuit.branches(kind).iter().any(|b| b.name == name) {
            return Err(VoltsetError::Oracle(format!("unknown {kind} '{name}'")));
        }
        let key = (kind, name.to_string());
        if in_service {
            self.out_of_service.remove(&key);
        } else {
            self.out_of_service.insert(key);
        }
        Ok(())
    }
}

/// Serves a fixture over the engine protocol; `open` loads the fixture file
/// named as the circuit.
#[derive(Debug, Default)]
pub struct FixtureEngine {
    oracle: Option<FixtureOracle>,
}

impl FixtureEngine {
    fn oracle(&mut self) -> anyhow::Result<&mut FixtureOracle> {
        self.oracle
            .as_mut()
            .ok_or_else(|| anyhow!("no circuit compiled; send open first"))
    }
}

impl EngineBackend for FixtureEngine {
    fn name(&self) -> &'static str {
        "voltset-fixture-engine"
    }

    fn open(
        &mut self,
        circuit: &str,
        max_iterations: u32,
        max_control_iterations: u32,
    ) -> anyhow::Result<()> {
        debug!(
            max_iterations,
            max_control_iterations, "fixture engine ignores iteration limits"
        );
        self.oracle = Some(FixtureOracle::from_path(Path::new(circuit))?);
        Ok(())
    }

    fn names(&mut self, category: Category) -> anyhow::Result<Vec<String>> {
        Ok(self.oracle()?.component_names(category)?)
    }

    fn get(&mut self, category: Category, name: &str) -> anyhow::Result<PowerSetpoint> {
        Ok(self.oracle()?.parameters(category, name)?)
    }

    fn set(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> anyhow::Result<()> {
        Ok(self.oracle()?.set_parameters(category, name, setpoint)?)
    }

    fn solve(&mut self) -> anyhow::Result<SolveOutcome> {
        Ok(self.oracle()?.solve()?)
    }

    fn switch(&mut self, kind: BranchKind, name: &str, in_service: bool) -> anyhow::Result<()> {
        Ok(self.oracle()?.set_in_service(kind, name, in_service)?)
    }
}
