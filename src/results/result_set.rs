use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use super::row::{CustomDbRow, index_columns};
use crate::error::SqlScopeError;
use crate::types::RowValues;

/// Column holding the affected-row count in an execution summary.
pub const AFFECTED_ROWS: &str = "affected_rows";
/// Column holding the last generated identifier in an execution summary.
pub const LAST_INSERT_ID: &str = "last_insert_id";

/// A result set from a database query
///
/// Reads produce one row per matched record. Writes (and bulk writes) produce a single summary
/// row with the columns [`AFFECTED_ROWS`] and [`LAST_INSERT_ID`].
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Rows returned for reads; rows changed for writes.
    pub rows_affected: usize,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
            column_index: None,
        }
    }

    /// The single-row result of a write: affected-row count and last generated identifier.
    #[must_use]
    pub fn execution_summary(affected_rows: u64, last_insert_id: i64) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(1);
        result_set.set_column_names(Arc::new(vec![
            AFFECTED_ROWS.to_string(),
            LAST_INSERT_ID.to_string(),
        ]));
        result_set.add_row_values(vec![
            RowValues::Int(i64::try_from(affected_rows).unwrap_or(i64::MAX)),
            RowValues::Int(last_insert_id),
        ]);
        result_set.rows_affected = usize::try_from(affected_rows).unwrap_or(usize::MAX);
        result_set
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(column_index),
            });
            self.rows_affected += 1;
        }
    }

    /// Add a fully built row to the result set
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when this is the single-row shape produced by a write.
    #[must_use]
    pub fn is_execution_summary(&self) -> bool {
        self.results.len() == 1
            && self
                .column_names
                .as_deref()
                .is_some_and(|cols| cols.len() == 2 && cols[0] == AFFECTED_ROWS && cols[1] == LAST_INSERT_ID)
    }

    /// Affected-row count of a write summary.
    ///
    /// # Errors
    /// Returns [`SqlScopeError::ResultTypeMismatch`] when this result set came from a read.
    pub fn affected_rows(&self) -> Result<i64, SqlScopeError> {
        self.summary_field(AFFECTED_ROWS)
    }

    /// Last generated identifier of a write summary.
    ///
    /// # Errors
    /// Returns [`SqlScopeError::ResultTypeMismatch`] when this result set came from a read.
    pub fn last_insert_id(&self) -> Result<i64, SqlScopeError> {
        self.summary_field(LAST_INSERT_ID)
    }

    fn summary_field(&self, column: &str) -> Result<i64, SqlScopeError> {
        if !self.is_execution_summary() {
            return Err(SqlScopeError::ResultTypeMismatch(format!(
                "'{column}' is only available on a write summary, got {} row(s) of {:?}",
                self.results.len(),
                self.column_names.as_deref().map(Vec::as_slice).unwrap_or_default()
            )));
        }
        self.results[0]
            .get(column)
            .and_then(RowValues::as_int)
            .copied()
            .ok_or_else(|| SqlScopeError::ResultTypeMismatch(format!("'{column}' is not an integer")))
    }
}

/// Serializes as a list of `{column: value}` maps.
impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.results.serialize(serializer)
    }
}
