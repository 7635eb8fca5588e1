//! What-if studies against a single circuit.
//!
//! A study scales chosen loads or generators by a percentage, switches lines
//! or transformers out of service, re-solves, and pairs every bus voltage with
//! its value in the unmodified circuit. The circuit is put back to its baseline
//! afterwards, outages included.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};
use voltset_core::{
    BranchKind, Category, CircuitOracle, PerUnit, PowerSetpoint, Snapshot, SolveOutcome,
    VoltsetError, VoltsetResult,
};

use crate::sampler::Sampler;

/// Which components of a category a scale applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleTarget {
    All,
    Named(String),
}

/// Percentage change applied to both kW and kvar of the targeted components.
///
/// Parsed from `CATEGORY:NAME=PCT`, e.g. `load:L7=25` or `generator:*=-10`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleAdjustment {
    pub category: Category,
    pub target: ScaleTarget,
    pub pct: f64,
}

impl FromStr for ScaleAdjustment {
    type Err = VoltsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || VoltsetError::Config(format!("expected CATEGORY:NAME=PCT, got '{s}'"));
        let (category, rest) = s.split_once(':').ok_or_else(malformed)?;
        let (name, pct) = rest.rsplit_once('=').ok_or_else(malformed)?;
        let category = parse_category(category)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed());
        }
        let pct: f64 = pct
            .trim()
            .parse()
            .map_err(|_| VoltsetError::Config(format!("'{pct}' is not a percentage")))?;
        if !pct.is_finite() || pct < -100.0 {
            return Err(VoltsetError::Config(format!(
                "scale {pct}% must be finite and at least -100%"
            )));
        }
        let target = match name {
            "*" => ScaleTarget::All,
            name => ScaleTarget::Named(name.to_string()),
        };
        Ok(Self {
            category,
            target,
            pct,
        })
    }
}

fn parse_category(s: &str) -> VoltsetResult<Category> {
    match s.trim().to_ascii_lowercase().as_str() {
        "load" | "loads" => Ok(Category::Load),
        "generator" | "generators" | "gen" => Ok(Category::Generator),
        other => Err(VoltsetError::Config(format!(
            "unknown category '{other}' (expected load or generator)"
        ))),
    }
}

/// A line or transformer switched out for the study. Parsed from `KIND:NAME`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outage {
    pub kind: BranchKind,
    pub name: String,
}

impl FromStr for Outage {
    type Err = VoltsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| VoltsetError::Config(format!("expected KIND:NAME, got '{s}'")))?;
        let kind = match kind.trim().to_ascii_lowercase().as_str() {
            "line" => BranchKind::Line,
            "transformer" => BranchKind::Transformer,
            other => {
                return Err(VoltsetError::Config(format!(
                    "unknown branch kind '{other}' (expected line or transformer)"
                )))
            }
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(VoltsetError::Config(format!("outage '{s}' names no branch")));
        }
        Ok(Self {
            kind,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Outage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Changes to study. Later scales override earlier ones for the same component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhatIf {
    pub scales: Vec<ScaleAdjustment>,
    pub outages: Vec<Outage>,
}

impl WhatIf {
    pub fn is_empty(&self) -> bool {
        self.scales.is_empty() && self.outages.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetpointChange {
    pub category: Category,
    pub name: String,
    pub pct: f64,
    pub baseline: PowerSetpoint,
    pub modified: PowerSetpoint,
}

/// One bus before and after the changes. A side is `None` when the bus is
/// missing from that solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageComparison {
    pub bus: String,
    pub baseline: Option<PerUnit>,
    pub modified: Option<PerUnit>,
    pub delta: Option<PerUnit>,
}

impl VoltageComparison {
    fn new(bus: String, baseline: Option<PerUnit>, modified: Option<PerUnit>) -> Self {
        let delta = baseline.zip(modified).map(|(before, after)| after - before);
        Self {
            bus,
            baseline,
            modified,
            delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatIfReport {
    pub changes: Vec<SetpointChange>,
    pub outages: Vec<Outage>,
    /// Whether the modified circuit converged. When it did not, every
    /// `modified` voltage is `None`.
    pub converged: bool,
    pub voltages: Vec<VoltageComparison>,
}

impl WhatIfReport {
    /// Largest voltage drop (most negative delta), if any bus dropped.
    pub fn worst_drop(&self) -> Option<&VoltageComparison> {
        self.voltages
            .iter()
            .filter(|v| v.delta.is_some_and(|d| d.value() < 0.0))
            .min_by(|a, b| {
                let (a, b) = (a.delta.unwrap_or_default(), b.delta.unwrap_or_default());
                a.value().total_cmp(&b.value())
            })
    }
}

/// Resolve scales against the baseline into one percentage per component, in
/// first-mentioned order.
fn resolve_scales(
    snapshot: &Snapshot,
    scales: &[ScaleAdjustment],
) -> VoltsetResult<Vec<(Category, String, f64)>> {
    let mut resolved: Vec<(Category, String, f64)> = Vec::new();
    let mut index: HashMap<(Category, String), usize> = HashMap::new();
    for scale in scales {
        let names = match &scale.target {
            ScaleTarget::All => snapshot.names(scale.category),
            ScaleTarget::Named(name) => {
                if snapshot.get(scale.category, name).is_none() {
                    return Err(VoltsetError::Config(format!(
                        "unknown {} '{name}'",
                        scale.category
                    )));
                }
                vec![name.clone()]
            }
        };
        for name in names {
            let key = (scale.category, name.clone());
            match index.get(&key) {
                Some(&at) => resolved[at].2 = scale.pct,
                None => {
                    index.insert(key, resolved.len());
                    resolved.push((scale.category, name, scale.pct));
                }
            }
        }
    }
    Ok(resolved)
}

/// Run a what-if study and leave the circuit as it was found.
///
/// The unmodified circuit must converge; otherwise there is nothing to compare
/// against and [`VoltsetError::NotConverged`] is returned.
pub fn run_what_if<O: CircuitOracle + ?Sized>(
    oracle: &mut O,
    what_if: &WhatIf,
) -> VoltsetResult<WhatIfReport> {
    let snapshot = Snapshot::capture(oracle)?;
    let targets = resolve_scales(&snapshot, &what_if.scales)?;
    let baseline = Sampler::solve_once(oracle)?;

    let mut switched: Vec<&Outage> = Vec::new();
    let result = apply_and_solve(oracle, &snapshot, &targets, what_if, &mut switched);

    let mut restored = snapshot.restore(oracle);
    for outage in switched {
        if let Err(err) = oracle.set_in_service(outage.kind, &outage.name, true) {
            warn!("could not return {outage} to service: {err}");
            restored = restored.and(Err(err));
        }
    }
    let (changes, modified) = result?;
    restored?;

    let converged = modified.converged;
    if !converged {
        warn!("modified circuit did not converge");
    }
    let mut voltages: Vec<VoltageComparison> = baseline
        .voltages
        .iter()
        .map(|before| {
            let after = modified
                .voltages
                .iter()
                .find(|after| after.bus == before.bus)
                .map(|after| after.vm_pu);
            VoltageComparison::new(before.bus.clone(), Some(before.vm_pu), after)
        })
        .collect();
    for after in &modified.voltages {
        if !baseline.voltages.iter().any(|before| before.bus == after.bus) {
            voltages.push(VoltageComparison::new(after.bus.clone(), None, Some(after.vm_pu)));
        }
    }

    Ok(WhatIfReport {
        changes,
        outages: what_if.outages.clone(),
        converged,
        voltages,
    })
}

fn apply_and_solve<'a, O: CircuitOracle + ?Sized>(
    oracle: &mut O,
    snapshot: &Snapshot,
    targets: &[(Category, String, f64)],
    what_if: &'a WhatIf,
    switched: &mut Vec<&'a Outage>,
) -> VoltsetResult<(Vec<SetpointChange>, SolveOutcome)> {
    let mut changes = Vec::with_capacity(targets.len());
    for (category, name, pct) in targets {
        let baseline = snapshot
            .get(*category, name)
            .ok_or_else(|| VoltsetError::Config(format!("unknown {category} '{name}'")))?;
        let modified = baseline.scaled(*pct, *pct);
        oracle.set_parameters(*category, name, modified)?;
        changes.push(SetpointChange {
            category: *category,
            name: name.clone(),
            pct: *pct,
            baseline,
            modified,
        });
    }
    for outage in &what_if.outages {
        oracle.set_in_service(outage.kind, &outage.name, false)?;
        switched.push(outage);
    }
    info!(scaled = changes.len(), outages = switched.len(), "solving modified circuit");
    let outcome = oracle.solve()?;
    Ok((changes, outcome))
}
