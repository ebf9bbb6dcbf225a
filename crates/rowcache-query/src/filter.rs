//! Row filtering.
//!
//! Evaluation is permissive: an unknown kind or operator, an uncoercible cell or operand,
//! and a column the row doesn't have all let the row through.

use rowcache_core::CellValue;

use crate::coerce::{cell_date, cell_number, parse_date, parse_number};
use crate::column_index::ColumnIndex;
use crate::model::{FilterKind, FilterOperator, FilterSpec, Junction, LeafPredicate, Predicate};

/// True when the row satisfies every column predicate in `filter`.
pub fn matches(row: &[CellValue], filter: &FilterSpec, columns: &ColumnIndex) -> bool {
    filter.iter().all(|(col_id, predicate)| {
        match columns.position(col_id).and_then(|pos| row.get(pos)) {
            Some(cell) => evaluate(cell, predicate),
            None => true,
        }
    })
}

pub fn evaluate(cell: &CellValue, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Compound {
            junction: Junction::And,
            conditions,
        } => conditions.iter().all(|c| evaluate(cell, c)),
        Predicate::Compound {
            junction: Junction::Or,
            conditions,
        } => conditions.is_empty() || conditions.iter().any(|c| evaluate(cell, c)),
        Predicate::Leaf(leaf) => match leaf.kind {
            FilterKind::Text => eval_text(cell, leaf),
            FilterKind::Number => eval_number(cell, leaf),
            FilterKind::Date => eval_date(cell, leaf),
            FilterKind::Other(_) => true,
        },
    }
}

fn eval_text(cell: &CellValue, leaf: &LeafPredicate) -> bool {
    let value = cell.as_text().unwrap_or_default().to_lowercase();
    let operand = leaf.filter.as_deref().unwrap_or_default().to_lowercase();

    match leaf.operator {
        FilterOperator::Contains => value.contains(&operand),
        FilterOperator::NotContains => !value.contains(&operand),
        FilterOperator::Equals => value == operand,
        FilterOperator::NotEquals => value != operand,
        FilterOperator::StartsWith => value.starts_with(&operand),
        FilterOperator::EndsWith => value.ends_with(&operand),
        _ => true,
    }
}

fn eval_number(cell: &CellValue, leaf: &LeafPredicate) -> bool {
    let (Some(value), Some(from)) = (cell_number(cell), leaf.filter.as_deref().and_then(parse_number)) else {
        return true;
    };
    let ord = value.compare(&from);

    match leaf.operator {
        FilterOperator::Equals => ord.is_eq(),
        FilterOperator::NotEquals => ord.is_ne(),
        FilterOperator::GreaterThan => ord.is_gt(),
        FilterOperator::GreaterThanEqual => ord.is_ge(),
        FilterOperator::LessThan => ord.is_lt(),
        FilterOperator::LessThanEqual => ord.is_le(),
        FilterOperator::InRange => match leaf.filter_to.as_deref().and_then(parse_number) {
            Some(to) => ord.is_ge() && value.compare(&to).is_le(),
            None => true,
        },
        _ => true,
    }
}

fn eval_date(cell: &CellValue, leaf: &LeafPredicate) -> bool {
    let operand = leaf.date_from.as_deref().or(leaf.filter.as_deref());
    let (Some(value), Some(from)) = (cell_date(cell), operand.and_then(parse_date)) else {
        return true;
    };

    match leaf.operator {
        FilterOperator::Equals => value == from,
        FilterOperator::NotEquals => value != from,
        FilterOperator::GreaterThan => value > from,
        FilterOperator::GreaterThanEqual => value >= from,
        FilterOperator::LessThan => value < from,
        FilterOperator::LessThanEqual => value <= from,
        FilterOperator::InRange => match leaf.date_to.as_deref().and_then(parse_date) {
            Some(to) => value >= from && value <= to,
            None => true,
        },
        _ => true,
    }
}
