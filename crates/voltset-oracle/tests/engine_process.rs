use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;
use voltset_core::{BranchKind, Category, CircuitOracle, PowerSetpoint, Snapshot, VoltsetError};
use voltset_oracle::{EngineConfig, ProcessOracle};

fn engine_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_voltset-fixture-engine"))
}

fn write_fixture(dir: &std::path::Path, diverge_every: Option<usize>) -> PathBuf {
    let path = dir.join("feeder.yaml");
    let mut text = String::from(
        "name: feeder\n\
         loads:\n  - { name: L1, kw: 10.0, kvar: 2.0 }\n  - { name: L2, kw: 8.0, kvar: 1.0 }\n\
         generators:\n  - { name: G1, kw: 30.0, kvar: 5.0 }\n\
         buses:\n  - { bus: B1, vm_pu: 1.01 }\n  - { bus: B2, vm_pu: 0.99 }\n",
    );
    if let Some(n) = diverge_every {
        text.push_str(&format!("diverge_every: {n}\n"));
    }
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn drives_fixture_engine_over_pipes() {
    let dir = tempdir().unwrap();
    let circuit = write_fixture(dir.path(), None);
    let config = EngineConfig::new("voltset-fixture-engine", &circuit).with_binary(engine_bin());
    let mut oracle = ProcessOracle::spawn(&config).unwrap();

    assert_eq!(
        oracle.component_names(Category::Load).unwrap(),
        vec!["L1", "L2"]
    );
    let snapshot = Snapshot::capture(&mut oracle).unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(
        snapshot.get(Category::Generator, "G1"),
        Some(PowerSetpoint::new(30.0, 5.0))
    );

    oracle
        .set_parameters(Category::Load, "L1", PowerSetpoint::new(12.5, 2.25))
        .unwrap();
    assert_eq!(
        oracle.parameters(Category::Load, "L1").unwrap(),
        PowerSetpoint::new(12.5, 2.25)
    );

    let outcome = oracle.solve().unwrap();
    assert!(outcome.converged);
    let buses: Vec<&str> = outcome.voltages.iter().map(|v| v.bus.as_str()).collect();
    assert_eq!(buses, vec!["B1", "B2"]);
}

#[test]
fn engine_errors_surface_as_oracle_errors() {
    let dir = tempdir().unwrap();
    let circuit = write_fixture(dir.path(), Some(1));
    let config = EngineConfig::new("voltset-fixture-engine", &circuit).with_binary(engine_bin());
    let mut oracle = ProcessOracle::spawn(&config).unwrap();

    let err = oracle.parameters(Category::Load, "missing").unwrap_err();
    assert!(matches!(err, VoltsetError::Oracle(ref msg) if msg.contains("missing")));

    // the session survives a rejected request
    assert!(!oracle.solve().unwrap().converged);
}

#[test]
fn failed_open_is_oracle_unavailable() {
    let dir = tempdir().unwrap();
    let config = EngineConfig::new("voltset-fixture-engine", dir.path().join("absent.yaml"))
        .with_binary(engine_bin());
    let err = ProcessOracle::spawn(&config).err().unwrap();
    assert!(matches!(err, VoltsetError::OracleUnavailable(_)));
}

#[test]
fn outages_travel_over_pipes_within_the_deadline() {
    let dir = tempdir().unwrap();
    let circuit = dir.path().join("branches.yaml");
    fs::write(
        &circuit,
        "loads:\n  - { name: L1, kw: 10.0, kvar: 2.0 }\n\
         transformers:\n  - { name: T1, outage_drop_pu: 0.05 }\n\
         buses:\n  - { bus: B1, vm_pu: 1.0 }\n",
    )
    .unwrap();
    let config = EngineConfig::new("voltset-fixture-engine", &circuit)
        .with_binary(engine_bin())
        .with_request_timeout(30);
    let mut oracle = ProcessOracle::spawn(&config).unwrap();

    oracle
        .set_in_service(BranchKind::Transformer, "T1", false)
        .unwrap();
    let outcome = oracle.solve().unwrap();
    assert!((outcome.voltages[0].vm_pu.value() - 0.95).abs() < 1e-12);

    let err = oracle
        .set_in_service(BranchKind::Line, "T1", false)
        .unwrap_err();
    assert!(matches!(err, VoltsetError::Oracle(ref msg) if msg.contains("T1")));
}
