//! Multi-key row ordering.

use std::cmp::Ordering;

use rowcache_core::{CellValue, Row};

use crate::coerce::{cell_date, cell_number};
use crate::column_index::ColumnIndex;
use crate::model::{SortDirection, SortSpec};

/// Orders two non-null cells: numerically, else by date, else case-insensitively as text.
pub fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    if let (Some(x), Some(y)) = (cell_number(a), cell_number(b)) {
        return x.compare(&y);
    }
    if let (Some(x), Some(y)) = (cell_date(a), cell_date(b)) {
        return x.cmp(&y);
    }
    let x = a.as_text().unwrap_or_default().to_lowercase();
    let y = b.as_text().unwrap_or_default().to_lowercase();
    x.cmp(&y)
}

/// Row comparator composed from a sort spec.
///
/// Keys naming unknown columns are skipped. Nulls and missing cells sort last in
/// either direction.
#[derive(Debug, Clone, Default)]
pub struct RowComparator {
    keys: Vec<(usize, SortDirection)>,
}

impl RowComparator {
    pub fn build(sort: &SortSpec, columns: &ColumnIndex) -> Self {
        let keys = sort
            .keys
            .iter()
            .filter_map(|key| columns.position(&key.col_id).map(|pos| (pos, key.direction)))
            .collect();
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &[CellValue], b: &[CellValue]) -> Ordering {
        for (position, direction) in &self.keys {
            let x = a.get(*position).filter(|c| !c.is_null());
            let y = b.get(*position).filter(|c| !c.is_null());

            let ord = match (x, y) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let ord = compare_cells(x, y);
                    match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                }
            };

            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable sort of `rows`.
    ///
    /// Columns mixing numbers, dates and text can make the comparison non-transitive,
    /// which `slice::sort_by` may reject with a panic; this bottom-up merge tolerates it.
    pub fn sort_rows(&self, rows: Vec<Row>) -> Vec<Row> {
        let n = rows.len();
        if self.keys.is_empty() || n < 2 {
            return rows;
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut merged = order.clone();
        let mut width = 1;

        while width < n {
            let mut start = 0;
            while start < n {
                let mid = (start + width).min(n);
                let end = (start + 2 * width).min(n);
                let (mut i, mut j, mut k) = (start, mid, start);

                while i < mid && j < end {
                    // Right side wins only when strictly smaller
                    if self.compare(&rows[order[j]], &rows[order[i]]) == Ordering::Less {
                        merged[k] = order[j];
                        j += 1;
                    } else {
                        merged[k] = order[i];
                        i += 1;
                    }
                    k += 1;
                }
                let rest_left = mid - i;
                merged[k..k + rest_left].copy_from_slice(&order[i..mid]);
                k += rest_left;
                merged[k..k + (end - j)].copy_from_slice(&order[j..end]);

                start = end;
            }
            std::mem::swap(&mut order, &mut merged);
            width *= 2;
        }

        let mut slots: Vec<Option<Row>> = rows.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }
}
