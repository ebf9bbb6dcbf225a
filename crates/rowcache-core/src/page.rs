use serde::{Deserialize, Serialize};

use crate::cell::Row;

/// Rows answering a row-range request.
///
/// `last_row` is the total row count when known. An empty page with no total means
/// "not available yet", not "no data".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsPage {
    pub rows: Vec<Row>,
    pub last_row: Option<u64>,
}

impl RowsPage {
    #[must_use]
    pub fn new(rows: Vec<Row>, last_row: Option<u64>) -> Self {
        Self { rows, last_row }
    }

    #[must_use]
    pub fn empty(last_row: Option<u64>) -> Self {
        Self {
            rows: Vec::new(),
            last_row,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
