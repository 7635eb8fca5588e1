use std::collections::HashMap;

use crate::error::{VoltsetError, VoltsetResult};
use crate::model::{Category, PowerSetpoint};
use crate::oracle::CircuitOracle;

/// One component's baseline setpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub category: Category,
    pub name: String,
    pub setpoint: PowerSetpoint,
}

/// Immutable baseline of every load and generator setpoint.
///
/// Captured once before sampling starts; every scenario resets the circuit
/// from it so perturbations never accumulate. Entries keep the oracle's order,
/// loads first.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
    index: HashMap<(Category, String), usize>,
}

impl Snapshot {
    /// Read the current setpoint of every load and generator from the oracle.
    pub fn capture<O: CircuitOracle + ?Sized>(oracle: &mut O) -> VoltsetResult<Self> {
        let mut snapshot = Snapshot::default();
        for category in Category::ALL {
            for name in oracle.component_names(category)? {
                let setpoint = oracle.parameters(category, &name)?;
                snapshot.push(category, name, setpoint)?;
            }
        }
        Ok(snapshot)
    }

    /// Build a snapshot from known entries (used by tests and fixtures).
    pub fn from_entries(
        entries: impl IntoIterator<Item = (Category, String, PowerSetpoint)>,
    ) -> VoltsetResult<Self> {
        let mut snapshot = Snapshot::default();
        for (category, name, setpoint) in entries {
            snapshot.push(category, name, setpoint)?;
        }
        Ok(snapshot)
    }

    fn push(
        &mut self,
        category: Category,
        name: String,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()> {
        let key = (category, name.clone());
        if self.index.contains_key(&key) {
            return Err(VoltsetError::Oracle(format!(
                "duplicate {category} name '{name}' reported by oracle"
            )));
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(SnapshotEntry {
            category,
            name,
            setpoint,
        });
        Ok(())
    }

    /// Write every baseline setpoint back to the oracle.
    pub fn restore<O: CircuitOracle + ?Sized>(&self, oracle: &mut O) -> VoltsetResult<()> {
        for entry in &self.entries {
            oracle.set_parameters(entry.category, &entry.name, entry.setpoint)?;
        }
        Ok(())
    }

    pub fn get(&self, category: Category, name: &str) -> Option<PowerSetpoint> {
        self.index
            .get(&(category, name.to_string()))
            .map(|&idx| self.entries[idx].setpoint)
    }

    /// Component names of one category, in capture order.
    pub fn names(&self, category: Category) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn count(&self, category: Category) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.category == category)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot::from_entries([
            (Category::Load, "L1".to_string(), PowerSetpoint::new(10.0, 2.0)),
            (Category::Load, "L2".to_string(), PowerSetpoint::new(5.0, 1.0)),
            (Category::Generator, "G1".to_string(), PowerSetpoint::new(50.0, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn lookup_and_counts() {
        let snap = sample();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.count(Category::Load), 2);
        assert_eq!(snap.count(Category::Generator), 1);
        assert_eq!(snap.names(Category::Load), vec!["L1", "L2"]);
        assert_eq!(
            snap.get(Category::Load, "L2"),
            Some(PowerSetpoint::new(5.0, 1.0))
        );
        assert_eq!(snap.get(Category::Generator, "L2"), None);
    }

    #[test]
    fn same_name_in_different_categories_is_allowed() {
        let snap = Snapshot::from_entries([
            (Category::Load, "X".to_string(), PowerSetpoint::new(1.0, 0.0)),
            (Category::Generator, "X".to_string(), PowerSetpoint::new(2.0, 0.0)),
        ])
        .unwrap();
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Snapshot::from_entries([
            (Category::Load, "L1".to_string(), PowerSetpoint::new(1.0, 0.0)),
            (Category::Load, "L1".to_string(), PowerSetpoint::new(2.0, 0.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, VoltsetError::Oracle(_)));
    }
}
