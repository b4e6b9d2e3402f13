use std::collections::HashMap;
use std::sync::Arc;

use crate::session::RawResponse;
use crate::types::SqlValue;

/// A single row of a read-shaped result.
///
/// Column names are shared across every row of the result set; values are
/// positional and looked up by name through a per-result index cache.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<SqlValue>,
    // Cache of column name -> index, shared across the result set.
    #[doc(hidden)]
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl DbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        // Fall back to linear search
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value by column name, or None if the column does not exist
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.column_index(column_name).and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column index, or None if the index is out of bounds
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }
}

/// The uniform envelope every execution operation returns.
///
/// Exactly one of `rows` / `affected_rows` is meaningful per outcome, chosen by
/// whether the underlying statement produced a column description. Business
/// failures and driver errors both arrive through this type with
/// `success == false` and the error text in `message`; callers never have to
/// distinguish "exception" from "failure".
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Whether the statement executed without error
    pub success: bool,
    /// Result rows; present only for read-shaped statements
    pub rows: Option<Vec<DbRow>>,
    /// Number of rows in `rows` (0 for write-shaped outcomes)
    pub row_count: usize,
    /// Rows affected; present only for write-shaped statements
    pub affected_rows: Option<u64>,
    /// Identifier generated by the last insert, when the driver reports one.
    /// Absent (never 0) for statements that inserted nothing.
    pub last_insert_id: Option<u64>,
    /// Error text on failure; may carry informational text on success
    pub message: Option<String>,
}

impl QueryOutcome {
    /// Successful read-shaped outcome.
    #[must_use]
    pub fn read(rows: Vec<DbRow>) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            rows: Some(rows),
            row_count,
            ..Self::default()
        }
    }

    /// Successful write-shaped outcome. A zero or absent insert id is omitted
    /// rather than reported as 0, so pure updates/deletes never imply an insert.
    #[must_use]
    pub fn write(affected_rows: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            success: true,
            affected_rows: Some(affected_rows),
            last_insert_id: last_insert_id.filter(|id| *id != 0),
            ..Self::default()
        }
    }

    /// Failed outcome carrying the error text.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Normalize a raw driver response into the uniform envelope.
    ///
    /// A response with a column description is read-shaped: column names are
    /// zipped with each row's positional values. Anything else is write-shaped.
    #[must_use]
    pub fn from_raw(raw: RawResponse) -> Self {
        match raw.columns {
            Some(columns) => {
                let header = Arc::new(columns);
                let rows = raw
                    .rows
                    .into_iter()
                    .map(|values| DbRow::new(header.clone(), values))
                    .collect();
                Self::read(rows)
            }
            None => Self::write(raw.affected_rows, raw.last_insert_id),
        }
    }

    /// The error text, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
