//! Parameter featurization
//!
//! Converts `(algorithm, serialized parameters)` rows into a string table
//! with one column per schema field, and back. Every cell is a category
//! label (see [`ParamValue::to_category`]); fields a row does not set hold
//! the [`MISSING`] sentinel.

use crate::errors::{RecommenderError, Result};
use crate::params::{ParamSet, ParamValue};
use std::collections::{BTreeSet, HashSet};

/// Sentinel for a parameter the row does not define
pub const MISSING: &str = "nan";

/// Column holding the algorithm name
pub const ALGORITHM_COLUMN: &str = "algorithm";

/// How [`to_columns`] chooses its columns
#[derive(Debug, Clone, Copy)]
pub enum SchemaMode<'a> {
    /// Columns are the sorted union of the rows' fields; used once, on the
    /// full catalog, to define the schema
    Establish,
    /// Columns are fixed to an existing schema; unknown fields are errors
    Extend(&'a [String]),
}

/// Rows of category labels under a sorted column list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// One decoded table row
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub algorithm: String,
    pub parameters: ParamSet,
}

impl ParamTable {
    /// Build a table, checking that every row matches the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(RecommenderError::SchemaMismatch {
                context: "parameter table row".into(),
                expected: columns.len(),
                found: row.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Drop repeated rows, keeping the first occurrence of each
    pub fn dedup(self) -> Self {
        let mut seen = HashSet::new();
        let rows = self
            .rows
            .into_iter()
            .filter(|row| seen.insert(row.clone()))
            .collect();
        Self {
            columns: self.columns,
            rows,
        }
    }
}

/// Flatten rows of serialized parameters into a [`ParamTable`]
pub fn to_columns<'r, I>(rows: I, mode: SchemaMode<'_>) -> Result<ParamTable>
where
    I: IntoIterator<Item = (&'r str, &'r str)>,
{
    let parsed = rows
        .into_iter()
        .map(|(algorithm, parameters)| {
            let set = ParamSet::parse(parameters)?;
            flatten(algorithm, parameters, &set)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut columns: Vec<String> = match mode {
        SchemaMode::Establish => {
            let mut names: BTreeSet<String> = BTreeSet::new();
            names.insert(ALGORITHM_COLUMN.to_string());
            for row in &parsed {
                names.extend(row.iter().map(|(name, _)| name.clone()));
            }
            names.into_iter().collect()
        }
        SchemaMode::Extend(schema) => {
            for row in &parsed {
                if let Some((name, _)) = row.iter().find(|(name, _)| !schema.contains(name)) {
                    return Err(RecommenderError::UnknownColumn {
                        column: name.clone(),
                    });
                }
            }
            schema.to_vec()
        }
    };
    columns.sort();

    let table_rows = parsed
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    row.iter()
                        .find(|(name, _)| name == col)
                        .map(|(_, label)| label.clone())
                        .unwrap_or_else(|| MISSING.to_string())
                })
                .collect()
        })
        .collect();

    ParamTable::new(columns, table_rows)
}

/// Field name and category label pairs for one row, algorithm included
fn flatten(algorithm: &str, raw: &str, set: &ParamSet) -> Result<Vec<(String, String)>> {
    let reject = |reason: String| RecommenderError::Parse {
        input: raw.to_string(),
        position: 0,
        reason,
    };

    if set.get(ALGORITHM_COLUMN).is_some() {
        return Err(reject(format!("parameter name {ALGORITHM_COLUMN:?} is reserved")));
    }

    let mut fields = Vec::with_capacity(set.len() + 1);
    fields.push((ALGORITHM_COLUMN.to_string(), algorithm.to_string()));
    for (name, value) in set.iter() {
        let label = value.to_category();
        if label == MISSING {
            return Err(reject(format!(
                "value of {name:?} collides with the missing-value sentinel"
            )));
        }
        fields.push((name.clone(), label));
    }
    Ok(fields)
}

/// Turn table rows back into algorithms and typed parameter sets
///
/// Sentinel cells are dropped and each remaining label is coerced with
/// [`ParamValue::from_category`].
pub fn from_columns(table: &ParamTable) -> Result<Vec<DecodedRow>> {
    let algorithm_idx =
        table
            .column_index(ALGORITHM_COLUMN)
            .ok_or_else(|| RecommenderError::UnknownColumn {
                column: ALGORITHM_COLUMN.to_string(),
            })?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            let parameters = table
                .columns()
                .iter()
                .zip(row)
                .enumerate()
                .filter(|(i, (_, label))| *i != algorithm_idx && label.as_str() != MISSING)
                .map(|(_, (name, label))| (name.clone(), ParamValue::from_category(label)))
                .collect();
            DecodedRow {
                algorithm: row[algorithm_idx].clone(),
                parameters,
            }
        })
        .collect())
}
