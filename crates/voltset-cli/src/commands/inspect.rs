use anyhow::Result;
use serde::Serialize;
use std::io::{stdout, Write};
use tabwriter::TabWriter;
use voltset_cli::common::{open_oracle, write_json, write_jsonl, OutputFormat};
use voltset_cli::OracleArgs;
use voltset_core::{Category, Snapshot};

#[derive(Serialize)]
struct ComponentRecord {
    category: Category,
    name: String,
    kw: f64,
    kvar: f64,
}

pub fn handle(oracle: &OracleArgs, format: OutputFormat) -> Result<()> {
    let mut oracle = open_oracle(oracle)?;
    let snapshot = Snapshot::capture(oracle.as_mut())?;
    let records: Vec<ComponentRecord> = snapshot
        .iter()
        .map(|entry| ComponentRecord {
            category: entry.category,
            name: entry.name.clone(),
            kw: entry.setpoint.real_power.value(),
            kvar: entry.setpoint.reactive_power.value(),
        })
        .collect();

    match format {
        OutputFormat::Table => {
            println!(
                "{} load(s), {} generator(s)",
                snapshot.count(Category::Load),
                snapshot.count(Category::Generator)
            );
            let mut writer = TabWriter::new(stdout());
            writeln!(writer, "CATEGORY\tNAME\tKW\tKVAR")?;
            for record in &records {
                writeln!(
                    writer,
                    "{}\t{}\t{:.3}\t{:.3}",
                    record.category, record.name, record.kw, record.kvar
                )?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => write_json(&records, &mut stdout(), true)?,
        OutputFormat::Jsonl => write_jsonl(&records, &mut stdout())?,
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(stdout());
            for record in &records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
