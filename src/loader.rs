use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use serde_json::Value;
use tracing::info;

use crate::dataset::{Column, DatasetSnapshot};

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Null,
    Num(f64),
    Text(String),
}

/// Gathers row-shaped input into columns. Columns first seen on a later row
/// are back-filled with nulls.
#[derive(Debug, Default)]
struct ColumnCollector {
    rows: usize,
    columns: BTreeMap<String, Vec<Cell>>,
}

impl ColumnCollector {
    fn push_row(&mut self, cells: impl IntoIterator<Item = (String, Cell)>) {
        let rows = self.rows;
        for (name, cell) in cells {
            let column = self
                .columns
                .entry(name)
                .or_insert_with(|| vec![Cell::Null; rows]);
            if column.len() == rows {
                column.push(cell);
            }
        }
        self.rows += 1;
        for column in self.columns.values_mut() {
            if column.len() < self.rows {
                column.push(Cell::Null);
            }
        }
    }

    fn finish(self) -> Result<DatasetSnapshot> {
        let mut snapshot = DatasetSnapshot::new();
        for (name, cells) in self.columns {
            let numeric = cells
                .iter()
                .all(|cell| matches!(cell, Cell::Null | Cell::Num(_)));
            let column = if numeric {
                Column::Numeric(
                    cells
                        .into_iter()
                        .map(|cell| match cell {
                            Cell::Num(v) => Some(v),
                            _ => None,
                        })
                        .collect(),
                )
            } else {
                Column::Text(
                    cells
                        .into_iter()
                        .map(|cell| match cell {
                            Cell::Null => None,
                            Cell::Num(v) => Some(v.to_string()),
                            Cell::Text(s) => Some(s),
                        })
                        .collect(),
                )
            };
            snapshot
                .insert_column(&name, column)
                .with_context(|| format!("assemble column {name}"))?;
        }
        Ok(snapshot)
    }
}

pub fn load_snapshot(path: &Path) -> Result<DatasetSnapshot> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let snapshot = match ext.as_str() {
        "parquet" => load_parquet(path)?,
        "json" => load_json(path)?,
        other => bail!("unsupported snapshot format `{other}` for {}", path.display()),
    };
    info!(
        path = %path.display(),
        rows = snapshot.len(),
        "loaded dataset snapshot"
    );
    Ok(snapshot)
}

pub fn load_parquet(path: &Path) -> Result<DatasetSnapshot> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader")?;
    let iter = reader.get_row_iter(None).context("iterate snapshot rows")?;

    let mut collector = ColumnCollector::default();
    for (idx, row) in iter.enumerate() {
        let row = row.with_context(|| format!("decode parquet row {idx}"))?;
        collector.push_row(
            row.get_column_iter()
                .map(|(name, field)| (name.clone(), field_cell(field))),
        );
    }
    collector.finish()
}

fn field_cell(field: &Field) -> Cell {
    match field {
        Field::Null => Cell::Null,
        Field::Byte(v) => Cell::Num(f64::from(*v)),
        Field::Short(v) => Cell::Num(f64::from(*v)),
        Field::Int(v) => Cell::Num(f64::from(*v)),
        Field::Long(v) => Cell::Num(*v as f64),
        Field::UByte(v) => Cell::Num(f64::from(*v)),
        Field::UShort(v) => Cell::Num(f64::from(*v)),
        Field::UInt(v) => Cell::Num(f64::from(*v)),
        Field::ULong(v) => Cell::Num(*v as f64),
        Field::Float(v) => Cell::Num(f64::from(*v)),
        Field::Double(v) => Cell::Num(*v),
        Field::Str(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

pub fn load_json(path: &Path) -> Result<DatasetSnapshot> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    snapshot_from_json(&raw).with_context(|| format!("parse {}", path.display()))
}

pub fn snapshot_from_json(raw: &str) -> Result<DatasetSnapshot> {
    let value: Value = serde_json::from_str(raw).context("invalid json")?;
    let Value::Array(rows) = value else {
        bail!("expected an array of row objects");
    };

    let mut collector = ColumnCollector::default();
    for (idx, row) in rows.into_iter().enumerate() {
        let Value::Object(map) = row else {
            bail!("row {idx} is not an object");
        };
        let cells = map
            .into_iter()
            .map(|(name, value)| {
                let cell = match value {
                    Value::Null => Cell::Null,
                    Value::Number(n) => Cell::Num(
                        n.as_f64()
                            .ok_or_else(|| anyhow!("row {idx}: `{name}` is not representable"))?,
                    ),
                    Value::String(s) => Cell::Text(s),
                    Value::Bool(b) => Cell::Text(b.to_string()),
                    Value::Array(_) | Value::Object(_) => {
                        bail!("row {idx}: `{name}` must be a scalar")
                    }
                };
                Ok((name, cell))
            })
            .collect::<Result<Vec<_>>>()?;
        collector.push_row(cells);
    }
    collector.finish()
}
