//! Read-only client tables loaded once at startup

pub mod attributes;
pub mod column;
pub mod features;

pub use attributes::AttributeTable;
pub use column::ColumnKind;
pub use features::{FeatureColumn, FeatureTable};

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::Read;
use tracing::warn;

/// CSV contents kept column-wise as raw strings, typed later by each table
pub(crate) struct RawColumns {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<String>>,
}

impl RawColumns {
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() {
            bail!("CSV has no columns");
        }

        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (line, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
            if record.len() != headers.len() {
                bail!(
                    "CSV row {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    headers.len()
                );
            }
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        Ok(Self { headers, columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Parse the identifier column and index it; the first occurrence of a duplicated id wins
pub(crate) fn index_ids(name: &str, cells: &[String]) -> Result<(Vec<i64>, HashMap<i64, usize>)> {
    let mut ids = Vec::with_capacity(cells.len());
    let mut index = HashMap::with_capacity(cells.len());

    for (row, cell) in cells.iter().enumerate() {
        let id = parse_id(cell)
            .with_context(|| format!("Invalid {} value {:?} at row {}", name, cell, row + 1))?;
        if index.contains_key(&id) {
            warn!(column = %name, id = id, row = row + 1, "Duplicate client id, keeping first row");
        } else {
            index.insert(id, row);
        }
        ids.push(id);
    }

    Ok((ids, index))
}

fn parse_id(cell: &str) -> Result<i64> {
    let cell = cell.trim();
    if let Ok(id) = cell.parse::<i64>() {
        return Ok(id);
    }
    // ids re-exported through a float column ("100004.0")
    let value: f64 = cell.parse()?;
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        bail!("not an integer")
    }
}
