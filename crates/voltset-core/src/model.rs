use serde::{Deserialize, Serialize};
use std::fmt;

use crate::units::{Kilovars, Kilowatts, PerUnit};

/// Kind of circuit element whose setpoints the sampler perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Load,
    Generator,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Load, Category::Generator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Load => "load",
            Category::Generator => "generator",
        }
    }

    /// Prefix used in dataset column names (`load_<name>_kW`, `gen_<name>_kW`).
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Category::Load => "load",
            Category::Generator => "gen",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of branch element that can be switched out of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Line,
    Transformer,
}

impl BranchKind {
    pub const ALL: [BranchKind; 2] = [BranchKind::Line, BranchKind::Transformer];

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::Line => "line",
            BranchKind::Transformer => "transformer",
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable scalar attribute of a load or generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    RealPower,
    ReactivePower,
}

impl Attribute {
    pub const ALL: [Attribute; 2] = [Attribute::RealPower, Attribute::ReactivePower];

    /// Unit suffix used in dataset column names.
    pub fn column_suffix(&self) -> &'static str {
        match self {
            Attribute::RealPower => "kW",
            Attribute::ReactivePower => "kvar",
        }
    }
}

/// Real/reactive power pair of one component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerSetpoint {
    pub real_power: Kilowatts,
    pub reactive_power: Kilovars,
}

impl PowerSetpoint {
    pub fn new(kw: f64, kvar: f64) -> Self {
        Self {
            real_power: Kilowatts(kw),
            reactive_power: Kilovars(kvar),
        }
    }

    /// Raw value of one attribute.
    pub fn get(&self, attribute: Attribute) -> f64 {
        match attribute {
            Attribute::RealPower => self.real_power.value(),
            Attribute::ReactivePower => self.reactive_power.value(),
        }
    }

    /// Apply independent percentage changes to each attribute.
    pub fn scaled(&self, real_pct: f64, reactive_pct: f64) -> Self {
        Self {
            real_power: self.real_power * crate::units::percent_scale(real_pct),
            reactive_power: self.reactive_power * crate::units::percent_scale(reactive_pct),
        }
    }
}

/// Solved voltage magnitude at one bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusVoltage {
    pub bus: String,
    pub vm_pu: PerUnit,
}

impl BusVoltage {
    pub fn new(bus: impl Into<String>, vm_pu: f64) -> Self {
        Self {
            bus: bus.into(),
            vm_pu: PerUnit(vm_pu),
        }
    }
}

/// Result of one oracle solve. `voltages` keeps the oracle's bus order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub converged: bool,
    pub voltages: Vec<BusVoltage>,
}

impl SolveOutcome {
    pub fn converged(voltages: Vec<BusVoltage>) -> Self {
        Self {
            converged: true,
            voltages,
        }
    }

    pub fn diverged() -> Self {
        Self {
            converged: false,
            voltages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_applies_each_percentage_independently() {
        let base = PowerSetpoint::new(10.0, 2.0);
        let scaled = base.scaled(50.0, -10.0);
        assert!((scaled.real_power.value() - 15.0).abs() < 1e-12);
        assert!((scaled.reactive_power.value() - 1.8).abs() < 1e-12);
        assert_eq!(base, PowerSetpoint::new(10.0, 2.0));
    }

    #[test]
    fn column_affixes() {
        assert_eq!(Category::Load.column_prefix(), "load");
        assert_eq!(Category::Generator.column_prefix(), "gen");
        assert_eq!(Attribute::RealPower.column_suffix(), "kW");
        assert_eq!(Attribute::ReactivePower.column_suffix(), "kvar");
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Generator).unwrap();
        assert_eq!(json, "\"generator\"");
        let kind: BranchKind = serde_json::from_str("\"transformer\"").unwrap();
        assert_eq!(kind, BranchKind::Transformer);
        assert_eq!(BranchKind::Line.to_string(), "line");
    }
}
