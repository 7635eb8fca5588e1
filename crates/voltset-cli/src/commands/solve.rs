use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::{stdout, Write};
use tabwriter::TabWriter;
use voltset_cli::common::{open_oracle, write_json, write_jsonl, OutputFormat};
use voltset_cli::SolveArgs;
use voltset_core::CircuitOracle;
use voltset_scenarios::{
    run_what_if, CsvSink, DatasetRow, Observation, RowSink, Sampler, Schema, WhatIf, WhatIfReport,
};

#[derive(Serialize)]
struct ColumnValue {
    column: String,
    kind: &'static str,
    value: f64,
}

fn records(schema: &Schema, row: &DatasetRow) -> Vec<ColumnValue> {
    schema
        .columns()
        .iter()
        .zip(row.values())
        .map(|(key, value)| ColumnValue {
            column: key.column_name(),
            kind: if key.is_feature() { "feature" } else { "voltage" },
            value: *value,
        })
        .collect()
}

/// One CSV/JSONL line of a what-if comparison.
#[derive(Serialize)]
struct VoltageRecord<'a> {
    bus: &'a str,
    baseline_pu: Option<f64>,
    modified_pu: Option<f64>,
    delta_pu: Option<f64>,
}

fn voltage_records(report: &WhatIfReport) -> Vec<VoltageRecord<'_>> {
    report
        .voltages
        .iter()
        .map(|v| VoltageRecord {
            bus: &v.bus,
            baseline_pu: v.baseline.map(|pu| pu.value()),
            modified_pu: v.modified.map(|pu| pu.value()),
            delta_pu: v.delta.map(|pu| pu.value()),
        })
        .collect()
}

fn fmt_pu(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |pu| format!("{pu:.6}"))
}

pub fn handle(args: &SolveArgs) -> Result<()> {
    let mut oracle = open_oracle(&args.oracle)?;
    let what_if = WhatIf {
        scales: args.scale.clone(),
        outages: args.outage.clone(),
    };
    if what_if.is_empty() {
        solve_baseline(oracle.as_mut(), args.format)
    } else {
        solve_what_if(oracle.as_mut(), &what_if, args.format)
    }
}

fn solve_baseline(oracle: &mut dyn CircuitOracle, format: OutputFormat) -> Result<()> {
    let observation: Observation = Sampler::solve_once(oracle).context("solving circuit")?;
    let schema = Schema::from_observation(&observation)?;
    let row = DatasetRow::from_observation(&schema, &observation)?;

    match format {
        OutputFormat::Table => {
            let mut writer = TabWriter::new(stdout());
            writeln!(writer, "COLUMN\tKIND\tVALUE")?;
            for record in records(&schema, &row) {
                writeln!(
                    writer,
                    "{}\t{}\t{:.6}",
                    record.column, record.kind, record.value
                )?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => write_json(&records(&schema, &row), &mut stdout(), true)?,
        OutputFormat::Jsonl => write_jsonl(&records(&schema, &row), &mut stdout())?,
        OutputFormat::Csv => {
            let mut sink = CsvSink::new(stdout());
            sink.accept(&schema, &row)?;
            sink.finish()?;
        }
    }
    Ok(())
}

fn solve_what_if(
    oracle: &mut dyn CircuitOracle,
    what_if: &WhatIf,
    format: OutputFormat,
) -> Result<()> {
    let report = run_what_if(oracle, what_if).context("running what-if study")?;

    match format {
        OutputFormat::Table => {
            for change in &report.changes {
                println!(
                    "Scaled {} {} by {:+.1}%: {:.3} kW / {:.3} kvar -> {:.3} kW / {:.3} kvar",
                    change.category,
                    change.name,
                    change.pct,
                    change.baseline.real_power.value(),
                    change.baseline.reactive_power.value(),
                    change.modified.real_power.value(),
                    change.modified.reactive_power.value()
                );
            }
            for outage in &report.outages {
                println!("Out of service: {outage}");
            }
            let mut writer = TabWriter::new(stdout());
            writeln!(writer, "BUS\tBASELINE\tMODIFIED\tDELTA")?;
            for record in voltage_records(&report) {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}",
                    record.bus,
                    fmt_pu(record.baseline_pu),
                    fmt_pu(record.modified_pu),
                    fmt_pu(record.delta_pu)
                )?;
            }
            writer.flush()?;
            if let Some(worst) = report.worst_drop() {
                println!(
                    "Largest drop at {}: {}",
                    worst.bus,
                    fmt_pu(worst.delta.map(|pu| pu.value()))
                );
            }
        }
        OutputFormat::Json => write_json(&report, &mut stdout(), true)?,
        OutputFormat::Jsonl => write_jsonl(&voltage_records(&report), &mut stdout())?,
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(stdout());
            for record in voltage_records(&report) {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
    }

    if !report.converged {
        bail!("modified circuit did not converge");
    }
    Ok(())
}
