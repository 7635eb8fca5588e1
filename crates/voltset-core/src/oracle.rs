//! The circuit-solve oracle contract.
//!
//! An oracle owns the live circuit state. Callers read and write load and
//! generator setpoints by name and ask it to solve; nothing else about the
//! engine is visible. Every method takes `&mut self` because read-modify-solve
//! sequences against one circuit are not reentrant.

use crate::error::{VoltsetError, VoltsetResult};
use crate::model::{BranchKind, Category, PowerSetpoint, SolveOutcome};

pub trait CircuitOracle {
    /// All component names of a category, in the engine's order.
    fn component_names(&mut self, category: Category) -> VoltsetResult<Vec<String>>;

    /// Current setpoint of one component.
    fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint>;

    /// Overwrite the setpoint of one component.
    fn set_parameters(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()>;

    /// Solve the circuit with its current setpoints.
    ///
    /// Non-convergence is reported through [`SolveOutcome::converged`], not as
    /// an error; `Err` means the oracle itself failed.
    fn solve(&mut self) -> VoltsetResult<SolveOutcome>;

    /// Switch a line or transformer in or out of service. The change stays in
    /// effect until it is switched back or the circuit is reopened.
    fn set_in_service(
        &mut self,
        kind: BranchKind,
        name: &str,
        _in_service: bool,
    ) -> VoltsetResult<()> {
        Err(VoltsetError::Oracle(format!("this oracle cannot switch {kind} '{name}'")))
    }
}

impl<O: CircuitOracle + ?Sized> CircuitOracle for &mut O {
    fn component_names(&mut self, category: Category) -> VoltsetResult<Vec<String>> {
        (**self).component_names(category)
    }

    fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint> {
        (**self).parameters(category, name)
    }

    fn set_parameters(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()> {
        (**self).set_parameters(category, name, setpoint)
    }

    fn solve(&mut self) -> VoltsetResult<SolveOutcome> {
        (**self).solve()
    }

    fn set_in_service(
        &mut self,
        kind: BranchKind,
        name: &str,
        in_service: bool,
    ) -> VoltsetResult<()> {
        (**self).set_in_service(kind, name, in_service)
    }
}

impl<O: CircuitOracle + ?Sized> CircuitOracle for Box<O> {
    fn component_names(&mut self, category: Category) -> VoltsetResult<Vec<String>> {
        (**self).component_names(category)
    }

    fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint> {
        (**self).parameters(category, name)
    }

    fn set_parameters(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()> {
        (**self).set_parameters(category, name, setpoint)
    }

    fn solve(&mut self) -> VoltsetResult<SolveOutcome> {
        (**self).solve()
    }

    fn set_in_service(
        &mut self,
        kind: BranchKind,
        name: &str,
        in_service: bool,
    ) -> VoltsetResult<()> {
        (**self).set_in_service(kind, name, in_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl CircuitOracle for Fixed {
        fn component_names(&mut self, _category: Category) -> VoltsetResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint> {
            Err(VoltsetError::Oracle(format!("unknown {category} '{name}'")))
        }

        fn set_parameters(
            &mut self,
            _category: Category,
            _name: &str,
            _setpoint: PowerSetpoint,
        ) -> VoltsetResult<()> {
            Ok(())
        }

        fn solve(&mut self) -> VoltsetResult<SolveOutcome> {
            Ok(SolveOutcome::converged(Vec::new()))
        }
    }

    #[test]
    fn outages_are_unsupported_unless_implemented() {
        let mut oracle: Box<dyn CircuitOracle> = Box::new(Fixed);
        let err = oracle
            .set_in_service(BranchKind::Line, "L12", false)
            .unwrap_err();
        assert!(matches!(err, VoltsetError::Oracle(ref msg) if msg.contains("line 'L12'")));
    }
}
