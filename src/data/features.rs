//! Feature table: numeric model inputs per client

use super::column::{float_to_json, ColumnKind};
use super::{index_ids, RawColumns};
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// A single numeric column of the feature table
#[derive(Debug, Clone)]
pub struct FeatureColumn {
    pub name: String,
    /// Values in table order, missing cells are `NaN`, booleans 1/0
    pub values: Vec<f64>,
    /// Cell type, decides how values go back to JSON
    pub kind: ColumnKind,
}

impl FeatureColumn {
    /// JSON value of one cell
    pub fn json_value(&self, row: usize) -> Value {
        let value = self.values[row];
        match self.kind {
            ColumnKind::Integer => Value::from(value as i64),
            ColumnKind::Boolean if !value.is_nan() => Value::Bool(value != 0.0),
            _ => float_to_json(value),
        }
    }

    /// JSON values of the whole column, in table order
    pub fn json_values(&self) -> Vec<Value> {
        (0..self.values.len()).map(|row| self.json_value(row)).collect()
    }
}

/// Numeric dataset keyed by client id, including the label column
#[derive(Debug, Clone)]
pub struct FeatureTable {
    id_column: String,
    ids: Vec<i64>,
    index: HashMap<i64, usize>,
    /// All columns in file order, id and label included
    columns: Vec<FeatureColumn>,
    /// Positions in `columns` fed to the model
    model_columns: Vec<usize>,
}

impl FeatureTable {
    /// Load the feature table from a CSV file
    pub fn from_path<P: AsRef<Path>>(path: P, id_column: &str, target_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open feature table {}", path.display()))?;
        let table = Self::from_reader(file, id_column, target_column)
            .with_context(|| format!("Failed to load feature table {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = table.len(),
            features = table.feature_count(),
            "Feature table loaded"
        );

        Ok(table)
    }

    /// Parse a feature table from CSV. The label column is optional.
    pub fn from_reader<R: Read>(reader: R, id_column: &str, target_column: &str) -> Result<Self> {
        let raw = RawColumns::read(reader)?;

        let id_position = raw
            .position(id_column)
            .with_context(|| format!("Missing identifier column {id_column}"))?;
        let (ids, index) = index_ids(id_column, &raw.columns[id_position])?;

        let mut columns = Vec::with_capacity(raw.headers.len());
        let mut model_columns = Vec::new();

        for (position, (name, cells)) in raw.headers.iter().zip(raw.columns.iter()).enumerate() {
            let kind = ColumnKind::infer(cells.iter().map(String::as_str));
            if !kind.is_model_input() {
                bail!("Feature column {name} is not numeric ({kind:?})");
            }

            let values = cells
                .iter()
                .enumerate()
                .map(|(row, cell)| {
                    kind.to_number(cell).with_context(|| {
                        format!("Invalid value {:?} in column {} at row {}", cell, name, row + 1)
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            if position != id_position && name != target_column {
                model_columns.push(position);
            }

            columns.push(FeatureColumn {
                name: name.clone(),
                values,
                kind,
            });
        }

        Ok(Self {
            id_column: id_column.to_string(),
            ids,
            index,
            columns,
            model_columns,
        })
    }

    /// Number of client rows
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Row of a client, `None` when the id is unknown
    pub fn row_of(&self, client_id: i64) -> Option<usize> {
        self.index.get(&client_id).copied()
    }

    /// Column by name, id and label columns included
    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of model input features
    pub fn feature_count(&self) -> usize {
        self.model_columns.len()
    }

    /// Model input feature names, in model order
    pub fn feature_names(&self) -> Vec<String> {
        self.model_columns
            .iter()
            .map(|&i| self.columns[i].name.clone())
            .collect()
    }

    /// Model input vector of one row
    pub fn feature_row(&self, row: usize) -> Vec<f64> {
        self.model_columns
            .iter()
            .map(|&i| self.columns[i].values[row])
            .collect()
    }
}
