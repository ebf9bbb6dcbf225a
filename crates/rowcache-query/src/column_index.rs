use std::collections::HashMap;

/// Maps column ids to row positions, with a lower-case alias for each column.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(columns: &[String]) -> Self {
        let mut positions = HashMap::with_capacity(columns.len() * 2);
        for (position, column) in columns.iter().enumerate() {
            positions.insert(column.clone(), position);
            positions.insert(column.to_lowercase(), position);
        }
        Self { positions }
    }

    /// Exact match first, then the lower-cased id.
    pub fn position(&self, col_id: &str) -> Option<usize> {
        self.positions
            .get(col_id)
            .or_else(|| self.positions.get(&col_id.to_lowercase()))
            .copied()
    }
}
