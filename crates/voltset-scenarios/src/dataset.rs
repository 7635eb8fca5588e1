//! Dataset schema, rows and sinks.
//!
//! A row pairs every load/generator setpoint (features) with every solved bus
//! voltage (labels). The first retained observation of a run fixes the
//! [`Schema`]; all later rows must produce exactly the same columns in the same
//! order, which holds as long as the circuit topology does not change.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use voltset_core::{
    Attribute, BusVoltage, Category, CircuitOracle, PowerSetpoint, SolveOutcome, VoltsetError,
    VoltsetResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Feature {
        category: Category,
        name: String,
        attribute: Attribute,
    },
    Voltage {
        bus: String,
    },
}

impl ColumnKey {
    /// CSV header for this column, e.g. `load_L1_kW` or `bus_B1_Vpu`.
    pub fn column_name(&self) -> String {
        match self {
            ColumnKey::Feature {
                category,
                name,
                attribute,
            } => format!(
                "{}_{}_{}",
                category.column_prefix(),
                name,
                attribute.column_suffix()
            ),
            ColumnKey::Voltage { bus } => format!("bus_{bus}_Vpu"),
        }
    }

    pub fn is_feature(&self) -> bool {
        matches!(self, ColumnKey::Feature { .. })
    }
}

/// Setpoints and voltages read back after one converged solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub setpoints: Vec<(Category, String, PowerSetpoint)>,
    pub voltages: Vec<BusVoltage>,
}

impl Observation {
    /// Read every component currently in the circuit, paired with a solve
    /// outcome's voltages.
    pub fn collect<O: CircuitOracle + ?Sized>(
        oracle: &mut O,
        outcome: SolveOutcome,
    ) -> VoltsetResult<Self> {
        let mut setpoints = Vec::new();
        for category in Category::ALL {
            for name in oracle.component_names(category)? {
                let setpoint = oracle.parameters(category, &name)?;
                setpoints.push((category, name, setpoint));
            }
        }
        Ok(Self {
            setpoints,
            voltages: outcome.voltages,
        })
    }

    fn entries(&self) -> impl Iterator<Item = (ColumnKey, f64)> + '_ {
        let features = self.setpoints.iter().flat_map(|(category, name, setpoint)| {
            Attribute::ALL.into_iter().map(move |attribute| {
                (
                    ColumnKey::Feature {
                        category: *category,
                        name: name.clone(),
                        attribute,
                    },
                    setpoint.get(attribute),
                )
            })
        });
        let labels = self.voltages.iter().map(|voltage| {
            (
                ColumnKey::Voltage {
                    bus: voltage.bus.clone(),
                },
                voltage.vm_pu.value(),
            )
        });
        features.chain(labels)
    }
}

/// Ordered columns: features first, then labels, each in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnKey>,
    feature_count: usize,
}

impl Schema {
    pub fn from_observation(observation: &Observation) -> VoltsetResult<Self> {
        let columns: Vec<ColumnKey> = observation.entries().map(|(key, _)| key).collect();
        let mut names = std::collections::HashSet::new();
        for column in &columns {
            if !names.insert(column.column_name()) {
                return Err(VoltsetError::Schema(format!(
                    "duplicate column '{}'",
                    column.column_name()
                )));
            }
        }
        let feature_count = columns.iter().filter(|key| key.is_feature()).count();
        Ok(Self {
            columns,
            feature_count,
        })
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn features(&self) -> &[ColumnKey] {
        &self.columns[..self.feature_count]
    }

    pub fn labels(&self) -> &[ColumnKey] {
        &self.columns[self.feature_count..]
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(ColumnKey::column_name).collect()
    }

    pub fn position(&self, key: &ColumnKey) -> Option<usize> {
        self.columns.iter().position(|column| column == key)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Values of one retained scenario, aligned with a [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    values: Vec<f64>,
}

impl DatasetRow {
    /// Align an observation with `schema`, failing if its columns differ.
    pub fn from_observation(schema: &Schema, observation: &Observation) -> VoltsetResult<Self> {
        let mut values = Vec::with_capacity(schema.len());
        let mut entries = observation.entries();
        for expected in schema.columns() {
            match entries.next() {
                Some((key, value)) if &key == expected => values.push(value),
                Some((key, _)) => {
                    return Err(VoltsetError::Schema(format!(
                        "expected column '{}' but the circuit produced '{}'",
                        expected.column_name(),
                        key.column_name()
                    )))
                }
                None => {
                    return Err(VoltsetError::Schema(format!(
                        "column '{}' missing from observation",
                        expected.column_name()
                    )))
                }
            }
        }
        if let Some((key, _)) = entries.next() {
            return Err(VoltsetError::Schema(format!(
                "unexpected extra column '{}'",
                key.column_name()
            )));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, schema: &Schema, key: &ColumnKey) -> Option<f64> {
        schema.position(key).map(|idx| self.values[idx])
    }
}

/// Destination for retained rows.
pub trait RowSink {
    fn accept(&mut self, schema: &Schema, row: &DatasetRow) -> VoltsetResult<()>;
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn accept(&mut self, schema: &Schema, row: &DatasetRow) -> VoltsetResult<()> {
        (**self).accept(schema, row)
    }
}

/// In-memory table; append-only.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    schema: Option<Schema>,
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV. An empty dataset writes nothing.
    pub fn write_csv<W: Write>(&self, writer: W) -> VoltsetResult<()> {
        let mut sink = CsvSink::new(writer);
        if let Some(schema) = &self.schema {
            for row in &self.rows {
                sink.accept(schema, row)?;
            }
        }
        sink.finish()?;
        Ok(())
    }
}

impl RowSink for Dataset {
    fn accept(&mut self, schema: &Schema, row: &DatasetRow) -> VoltsetResult<()> {
        match &self.schema {
            Some(existing) if existing != schema => {
                return Err(VoltsetError::Schema(
                    "row schema differs from the dataset schema".to_string(),
                ))
            }
            Some(_) => {}
            None => self.schema = Some(schema.clone()),
        }
        self.rows.push(row.clone());
        Ok(())
    }
}

/// Streams rows to CSV, flushing after each one so the file is a valid table
/// at every scenario boundary.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
    rows: usize,
}

impl CsvSink<File> {
    /// Create (or truncate) `path`, creating parent directories.
    pub fn create(path: &Path) -> VoltsetResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            header_written: false,
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> VoltsetResult<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|err| VoltsetError::Io(io::Error::new(err.error().kind(), err.to_string())))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn accept(&mut self, schema: &Schema, row: &DatasetRow) -> VoltsetResult<()> {
        if !self.header_written {
            self.writer
                .write_record(schema.column_names())
                .map_err(io::Error::from)?;
            self.header_written = true;
        }
        self.writer
            .write_record(row.values().iter().map(|value| value.to_string()))
            .map_err(io::Error::from)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}
