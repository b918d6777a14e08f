//! Site-local data partitions.
//!
//! A partition never crosses the site boundary; only its shape does.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shape of a partition: row count and column names, no values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionShape {
    /// Number of rows
    pub rows: usize,
    /// Column names in storage order
    pub columns: Vec<String>,
}

impl PartitionShape {
    /// Whether the partition has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Row-major numeric table held by one site.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Partition {
    /// Create a partition, checking every row against the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::Configuration(format!(
                "row {} has {} values, expected {}",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Create a partition from named columns of equal length.
    pub fn from_columns(columns: Vec<(&str, Vec<f64>)>) -> Result<Self> {
        let len = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != len) {
            return Err(Error::Configuration(format!(
                "column '{}' has {} values, expected {}",
                name,
                values.len(),
                len
            )));
        }

        let rows = (0..len)
            .map(|i| columns.iter().map(|(_, values)| values[i]).collect())
            .collect();
        let names = columns.iter().map(|(name, _)| name.to_string()).collect();
        Ok(Self {
            columns: names,
            rows,
        })
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Shape summary that may leave the site.
    pub fn shape(&self) -> PartitionShape {
        PartitionShape {
            rows: self.rows.len(),
            columns: self.columns.clone(),
        }
    }

    /// Split into `parts` contiguous partitions whose sizes differ by at most one row.
    pub fn split_rows(&self, parts: usize) -> Result<Vec<Partition>> {
        if parts == 0 {
            return Err(Error::Configuration(
                "cannot split a partition into zero parts".to_string(),
            ));
        }

        let base = self.rows.len() / parts;
        let extra = self.rows.len() % parts;
        let mut start = 0;
        let mut out = Vec::with_capacity(parts);
        for part in 0..parts {
            let len = base + usize::from(part < extra);
            out.push(Partition {
                columns: self.columns.clone(),
                rows: self.rows[start..start + len].to_vec(),
            });
            start += len;
        }
        Ok(out)
    }
}
