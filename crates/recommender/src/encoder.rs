//! Per-column categorical encoding
//!
//! Each column maps its sorted distinct labels to codes `0..n`. The encoder
//! is fitted once on the candidate catalog and owned by it; later tables are
//! encoded against that vocabulary and never extend it.

use crate::errors::{RecommenderError, Result};
use crate::featurizer::ParamTable;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnVocabulary {
    /// Labels in code order
    labels: Vec<String>,
    codes: HashMap<String, u32>,
}

impl ColumnVocabulary {
    fn fit<'a>(values: impl Iterator<Item = &'a String>) -> Self {
        let labels: Vec<String> = values
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let codes = labels
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code as u32))
            .collect();
        Self { labels, codes }
    }
}

/// Fitted label-to-code bijections, one per schema column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalEncoder {
    columns: Vec<String>,
    vocabularies: Vec<ColumnVocabulary>,
}

impl CategoricalEncoder {
    /// Fit every column of `table`, the sentinel included
    pub fn fit(table: &ParamTable) -> Self {
        let vocabularies = (0..table.columns().len())
            .map(|col| ColumnVocabulary::fit(table.rows().iter().map(|row| &row[col])))
            .collect();
        Self {
            columns: table.columns().to_vec(),
            vocabularies,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fitted labels of `column` in code order
    pub fn vocabulary(&self, column: &str) -> Option<&[String]> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(&self.vocabularies[idx].labels)
    }

    /// Encode a table with exactly the fitted columns
    pub fn transform(&self, table: &ParamTable) -> Result<Vec<Vec<u32>>> {
        if table.columns() != self.columns.as_slice() {
            if let Some(unknown) = table.columns().iter().find(|c| !self.columns.contains(*c)) {
                return Err(RecommenderError::UnknownColumn {
                    column: unknown.clone(),
                });
            }
            return Err(RecommenderError::SchemaMismatch {
                context: "categorical encoder columns".into(),
                expected: self.columns.len(),
                found: table.columns().len(),
            });
        }

        table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.vocabularies)
                    .zip(&self.columns)
                    .map(|((label, vocab), column)| {
                        vocab.codes.get(label).copied().ok_or_else(|| {
                            RecommenderError::UnseenCategory {
                                column: column.clone(),
                                value: label.clone(),
                            }
                        })
                    })
                    .collect::<Result<Vec<u32>>>()
            })
            .collect()
    }

    /// Map code rows back to their labels
    pub fn inverse_transform(&self, codes: &[Vec<u32>]) -> Result<ParamTable> {
        let rows = codes
            .iter()
            .map(|row| {
                if row.len() != self.columns.len() {
                    return Err(RecommenderError::SchemaMismatch {
                        context: "encoded row".into(),
                        expected: self.columns.len(),
                        found: row.len(),
                    });
                }
                row.iter()
                    .zip(&self.vocabularies)
                    .zip(&self.columns)
                    .map(|((&code, vocab), column)| {
                        vocab.labels.get(code as usize).cloned().ok_or_else(|| {
                            RecommenderError::CodeOutOfRange {
                                column: column.clone(),
                                code,
                            }
                        })
                    })
                    .collect::<Result<Vec<String>>>()
            })
            .collect::<Result<Vec<Vec<String>>>>()?;

        ParamTable::new(self.columns.clone(), rows)
    }
}
