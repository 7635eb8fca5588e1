use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use voltset_core::{
    BusVoltage, Category, CircuitOracle, PowerSetpoint, SolveOutcome, VoltsetError, VoltsetResult,
};
use voltset_oracle::{FixtureCircuit, FixtureComponent, FixtureOracle};
use voltset_scenarios::{
    CsvSink, Dataset, PercentRange, Sampler, SamplerConfig, ScenarioDraw, Schema,
};

/// Oracle that records every setpoint as seen at solve time.
struct RecordingOracle {
    order: Vec<(Category, String)>,
    state: HashMap<(Category, String), PowerSetpoint>,
    buses: Vec<String>,
    solves: Vec<HashMap<(Category, String), PowerSetpoint>>,
    fail_solve_at: Option<usize>,
    add_bus_after: Option<usize>,
}

impl RecordingOracle {
    fn new(loads: usize, generators: usize) -> Self {
        let mut order = Vec::new();
        let mut state = HashMap::new();
        for i in 1..=loads {
            let key = (Category::Load, format!("L{i}"));
            state.insert(key.clone(), PowerSetpoint::new(10.0, 2.0));
            order.push(key);
        }
        for i in 1..=generators {
            let key = (Category::Generator, format!("G{i}"));
            state.insert(key.clone(), PowerSetpoint::new(50.0, 5.0));
            order.push(key);
        }
        Self {
            order,
            state,
            buses: vec!["B1".into(), "B2".into()],
            solves: Vec::new(),
            fail_solve_at: None,
            add_bus_after: None,
        }
    }

    fn baseline(&self, key: &(Category, String)) -> PowerSetpoint {
        match key.0 {
            Category::Load => PowerSetpoint::new(10.0, 2.0),
            Category::Generator => PowerSetpoint::new(50.0, 5.0),
        }
    }
}

impl CircuitOracle for RecordingOracle {
    fn component_names(&mut self, category: Category) -> VoltsetResult<Vec<String>> {
        Ok(self
            .order
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn parameters(&mut self, category: Category, name: &str) -> VoltsetResult<PowerSetpoint> {
        self.state
            .get(&(category, name.to_string()))
            .copied()
            .ok_or_else(|| VoltsetError::Oracle(format!("unknown {category} '{name}'")))
    }

    fn set_parameters(
        &mut self,
        category: Category,
        name: &str,
        setpoint: PowerSetpoint,
    ) -> VoltsetResult<()> {
        self.state.insert((category, name.to_string()), setpoint);
        Ok(())
    }

    fn solve(&mut self) -> VoltsetResult<SolveOutcome> {
        if self.fail_solve_at == Some(self.solves.len()) {
            return Err(VoltsetError::Oracle("engine crashed".into()));
        }
        if self.add_bus_after == Some(self.solves.len()) {
            self.buses.push("B3".into());
        }
        self.solves.push(self.state.clone());
        let total_kw: f64 = self.state.values().map(|s| s.real_power.value()).sum();
        Ok(SolveOutcome::converged(
            self.buses
                .iter()
                .map(|bus| BusVoltage::new(bus.clone(), 1.0 - total_kw * 1e-4))
                .collect(),
        ))
    }
}

fn loads_only_config(fraction: f64, scenarios: usize, seed: u64) -> SamplerConfig {
    let mut config = SamplerConfig {
        scenarios,
        seed: Some(seed),
        ..SamplerConfig::default()
    };
    config.loads.fraction = fraction;
    config
}

fn fixture(diverge_every: Option<usize>) -> FixtureOracle {
    let component = |name: &str, kw: f64, kvar: f64| FixtureComponent {
        name: name.into(),
        kw,
        kvar,
    };
    FixtureOracle::new(FixtureCircuit {
        name: Some("four-load-feeder".into()),
        loads: vec![
            component("L1", 10.0, 2.0),
            component("L2", 10.0, 2.0),
            component("L3", 10.0, 2.0),
            component("L4", 10.0, 2.0),
        ],
        generators: vec![component("G1", 40.0, 4.0), component("G2", 20.0, 0.0)],
        buses: vec![BusVoltage::new("B1", 1.0), BusVoltage::new("B2", 0.98)],
        diverge_every,
        ..FixtureCircuit::default()
    })
    .unwrap()
}

#[test]
fn four_load_scenario_perturbs_exactly_two_loads() {
    let mut oracle = FixtureOracle::new(FixtureCircuit {
        loads: (1..=4)
            .map(|i| FixtureComponent {
                name: format!("L{i}"),
                kw: 10.0,
                kvar: 2.0,
            })
            .collect(),
        buses: vec![BusVoltage::new("B1", 1.0)],
        ..FixtureCircuit::default()
    })
    .unwrap();
    let mut sampler = Sampler::new(loads_only_config(0.5, 50, 11)).unwrap();
    let mut dataset = Dataset::new();
    let mut draws: Vec<ScenarioDraw> = Vec::new();
    let summary = sampler
        .run_with(&mut oracle, &mut dataset, |draw, _| draws.push(draw.clone()))
        .unwrap();

    assert_eq!(summary.retained, 50);
    assert_eq!(summary.loads_per_scenario, 2);
    assert_eq!(summary.generators_per_scenario, 0);
    assert_eq!(draws.len(), 50);
    assert_eq!(dataset.rows().len(), 50);

    let schema = dataset.schema().unwrap();
    assert_eq!(
        schema.column_names(),
        vec![
            "load_L1_kW",
            "load_L1_kvar",
            "load_L2_kW",
            "load_L2_kvar",
            "load_L3_kW",
            "load_L3_kvar",
            "load_L4_kW",
            "load_L4_kvar",
            "bus_B1_Vpu"
        ]
    );

    for (draw, row) in draws.iter().zip(dataset.rows()) {
        assert_eq!(draw.selected(Category::Load).count(), 2);
        assert_eq!(draw.selected(Category::Generator).count(), 0);
        let selected: Vec<&str> = draw
            .selected(Category::Load)
            .map(|p| p.name.as_str())
            .collect();
        assert_ne!(selected[0], selected[1]);

        let values = row.values();
        for (i, pair) in values[..8].chunks(2).enumerate() {
            let name = format!("L{}", i + 1);
            let (kw, kvar) = (pair[0], pair[1]);
            if selected.contains(&name.as_str()) {
                assert!((5.0..=15.0).contains(&kw), "{name} kW {kw} out of range");
                assert!((1.8..=2.2).contains(&kvar), "{name} kvar {kvar} out of range");
            } else {
                assert_eq!((kw, kvar), (10.0, 2.0), "{name} left its baseline");
            }
        }
        assert_eq!(values[8], 1.0);
    }
}

#[test]
fn unselected_components_hold_their_baseline_at_solve_time() {
    let mut oracle = RecordingOracle::new(5, 3);
    let config = SamplerConfig {
        scenarios: 25,
        seed: Some(5),
        ..SamplerConfig::default()
    };
    let mut sampler = Sampler::new(config).unwrap();
    let mut draws: Vec<ScenarioDraw> = Vec::new();
    let summary = sampler
        .run_with(&mut oracle, &mut Dataset::new(), |draw, _| {
            draws.push(draw.clone())
        })
        .unwrap();

    assert_eq!(summary.retained, 25);
    assert_eq!(summary.loads_per_scenario, 4);
    assert_eq!(summary.generators_per_scenario, 1);
    assert_eq!(oracle.solves.len(), 25);
    for (draw, state) in draws.iter().zip(&oracle.solves) {
        assert_eq!(draw.selected(Category::Load).count(), 4);
        assert_eq!(draw.selected(Category::Generator).count(), 1);
        for key in &oracle.order {
            let applied = draw
                .perturbations
                .iter()
                .find(|p| p.category == key.0 && p.name == key.1);
            match applied {
                Some(p) => assert_eq!(state[key], p.setpoint),
                None => assert_eq!(state[key], oracle.baseline(key)),
            }
        }
    }
}

#[test]
fn oracle_is_left_at_baseline() {
    let mut oracle = RecordingOracle::new(3, 2);
    let mut sampler = Sampler::new(loads_only_config(1.0, 5, 1)).unwrap();
    sampler.run(&mut oracle, &mut Dataset::new()).unwrap();
    for key in oracle.order.clone() {
        assert_eq!(oracle.state[&key], oracle.baseline(&key));
    }
}

#[test]
fn same_seed_gives_identical_csv() {
    let run = |seed: u64| {
        let mut oracle = fixture(None);
        let mut sampler = Sampler::new(loads_only_config(0.5, 20, seed)).unwrap();
        let mut sink = CsvSink::new(Vec::new());
        sampler.run(&mut oracle, &mut sink).unwrap();
        sink.finish().unwrap()
    };
    let first = run(99);
    assert_eq!(first, run(99));
    assert_ne!(first, run(100));
}

#[test]
fn small_fraction_still_selects_one_component() {
    let mut oracle = RecordingOracle::new(4, 0);
    let mut sampler = Sampler::new(loads_only_config(0.1, 10, 2)).unwrap();
    let mut draws = Vec::new();
    let summary = sampler
        .run_with(&mut oracle, &mut Dataset::new(), |draw, _| {
            draws.push(draw.clone())
        })
        .unwrap();
    assert_eq!(summary.loads_per_scenario, 1);
    assert!(draws
        .iter()
        .all(|draw| draw.selected(Category::Load).count() == 1));
}

#[test]
fn non_converged_scenarios_are_skipped_and_counted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/data.csv");
    let mut oracle = fixture(Some(3));
    let mut sampler = Sampler::new(loads_only_config(0.5, 10, 4)).unwrap();
    let mut sink = CsvSink::create(&path).unwrap();
    let summary = sampler.run(&mut oracle, &mut sink).unwrap();
    sink.finish().unwrap();

    assert_eq!(summary.attempted, 10);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.retained, 7);
    assert_eq!(summary.retained + summary.skipped, summary.attempted);
    assert!(!summary.interrupted);

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 8);
    assert!(lines[0].starts_with("load_L1_kW,load_L1_kvar"));
    assert!(lines[0].ends_with("gen_G2_kvar,bus_B1_Vpu,bus_B2_Vpu"));
}

#[test]
fn stop_flag_ends_the_run_between_scenarios() {
    let stop = Arc::new(AtomicBool::new(false));
    let mut oracle = fixture(None);
    let mut sampler = Sampler::new(loads_only_config(0.5, 50, 8))
        .unwrap()
        .with_stop_flag(stop.clone());
    let mut dataset = Dataset::new();
    let summary = sampler
        .run_with(&mut oracle, &mut dataset, |draw, _| {
            if draw.index == 2 {
                stop.store(true, Ordering::SeqCst);
            }
        })
        .unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.attempted, 3);
    assert_eq!(dataset.len(), 3);
    assert_eq!(oracle.solve_count(), 3);
}

#[test]
fn oracle_failure_is_fatal() {
    let mut oracle = RecordingOracle::new(2, 1);
    oracle.fail_solve_at = Some(2);
    let mut sampler = Sampler::new(loads_only_config(0.5, 5, 3)).unwrap();
    let mut dataset = Dataset::new();
    let err = sampler.run(&mut oracle, &mut dataset).unwrap_err();
    assert!(matches!(err, VoltsetError::Oracle(_)));
    assert_eq!(dataset.len(), 2);
    for key in oracle.order.clone() {
        assert_eq!(oracle.state[&key], oracle.baseline(&key));
    }
}

#[test]
fn topology_change_is_a_schema_error() {
    let mut oracle = RecordingOracle::new(2, 0);
    oracle.add_bus_after = Some(1);
    let mut sampler = Sampler::new(loads_only_config(0.5, 3, 3)).unwrap();
    let mut dataset = Dataset::new();
    let err = sampler.run(&mut oracle, &mut dataset).unwrap_err();
    assert!(matches!(err, VoltsetError::Schema(_)));
    assert_eq!(dataset.len(), 1);
}

#[test]
fn solve_once_reads_back_features_and_labels() {
    let mut oracle = fixture(None);
    let observation = Sampler::solve_once(&mut oracle).unwrap();
    let schema = Schema::from_observation(&observation).unwrap();
    assert_eq!(schema.features().len(), 12);
    assert_eq!(schema.labels().len(), 2);

    let mut diverging = fixture(Some(1));
    assert!(matches!(
        Sampler::solve_once(&mut diverging),
        Err(VoltsetError::NotConverged)
    ));
}

#[test]
fn zero_width_ranges_reproduce_the_baseline() {
    let mut config = loads_only_config(1.0, 3, 6);
    config.loads.real_power = PercentRange::new(0.0, 0.0);
    config.loads.reactive_power = PercentRange::new(0.0, 0.0);
    config.generators.real_power = PercentRange::new(0.0, 0.0);
    config.generators.reactive_power = PercentRange::new(0.0, 0.0);
    let mut oracle = fixture(None);
    let mut dataset = Dataset::new();
    Sampler::new(config)
        .unwrap()
        .run(&mut oracle, &mut dataset)
        .unwrap();
    let first = dataset.rows()[0].values().to_vec();
    assert!(dataset.rows().iter().all(|row| row.values() == first.as_slice()));
    assert_eq!(&first[..2], &[10.0, 2.0]);
}
