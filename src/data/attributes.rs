//! Personal-attributes table: descriptive client data returned verbatim

use super::column::ColumnKind;
use super::{index_ids, RawColumns};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Rows of typed JSON values keyed by client id
#[derive(Debug, Clone)]
pub struct AttributeTable {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
    index: HashMap<i64, usize>,
}

impl AttributeTable {
    pub fn from_path<P: AsRef<Path>>(path: P, id_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open personal info table {}", path.display()))?;
        let table = Self::from_reader(file, id_column)
            .with_context(|| format!("Failed to load personal info table {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns.len(),
            "Personal info table loaded"
        );

        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, id_column: &str) -> Result<Self> {
        let raw = RawColumns::read(reader)?;

        let id_position = raw
            .position(id_column)
            .with_context(|| format!("Missing identifier column {id_column}"))?;
        let (_, index) = index_ids(id_column, &raw.columns[id_position])?;

        let kinds: Vec<ColumnKind> = raw
            .columns
            .iter()
            .map(|cells| ColumnKind::infer(cells.iter().map(String::as_str)))
            .collect();

        let rows = (0..raw.row_count())
            .map(|row| {
                raw.headers
                    .iter()
                    .zip(raw.columns.iter())
                    .zip(kinds.iter())
                    .map(|((name, cells), kind)| (name.clone(), kind.to_json(&cells[row])))
                    .collect::<Map<String, Value>>()
            })
            .collect();

        Ok(Self {
            columns: raw.headers,
            rows,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The client's row as a flat key-value mapping, in file column order
    pub fn get(&self, client_id: i64) -> Option<&Map<String, Value>> {
        self.index.get(&client_id).map(|&row| &self.rows[row])
    }
}
