//! Parses client sort/filter payloads into column-restricted models.
//!
//! Parsing never fails: blank, malformed or wrongly shaped payloads yield an empty model.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::model::{FilterDescriptor, FilterSpec, Predicate, SortDirection, SortKey, SortModelEntry, SortSpec};

/// Result of [`parse`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedModels {
    pub sort: SortSpec,
    pub filter: FilterSpec,
    /// Canonical JSON of the kept sort entries.
    pub canonical_sort_json: String,
    /// Canonical JSON of the kept filter entries.
    pub canonical_filter_json: String,
}

impl ParsedModels {
    /// True when neither sorting nor filtering takes effect.
    pub fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.filter.is_empty()
    }
}

/// Parses both payloads.
///
/// When `allowed_columns` is non-empty, sort keys and filter entries naming other columns
/// (compared case-insensitively) are dropped before the canonical JSON is produced.
pub fn parse(sort_json: Option<&str>, filter_json: Option<&str>, allowed_columns: Option<&[String]>) -> ParsedModels {
    let mut sort_entries = parse_sort_entries(sort_json);
    let mut filter_entries = parse_filter_entries(filter_json);

    if let Some(allowed) = allowed_columns.filter(|cols| !cols.is_empty()) {
        let allowed: HashSet<String> = allowed.iter().map(|c| c.to_lowercase()).collect();
        sort_entries.retain(|entry| {
            entry
                .col_id
                .as_ref()
                .is_some_and(|col| allowed.contains(&col.to_lowercase()))
        });
        filter_entries.retain(|col, _| allowed.contains(&col.to_lowercase()));
    }

    let sort = SortSpec {
        keys: sort_entries
            .iter()
            .filter_map(|entry| {
                let col_id = entry.col_id.clone()?;
                let direction = SortDirection::parse(entry.sort.as_deref()?)?;
                Some(SortKey { col_id, direction })
            })
            .collect(),
    };
    let filter: FilterSpec = filter_entries
        .iter()
        .map(|(col, descriptor)| (col.clone(), Predicate::from(descriptor)))
        .collect();

    // Struct fields serialize in declaration order and map keys in sorted order,
    // so these strings are canonical.
    let canonical_sort_json = serde_json::to_string(&sort_entries).unwrap_or_default();
    let canonical_filter_json = serde_json::to_string(&filter_entries).unwrap_or_default();

    ParsedModels {
        sort,
        filter,
        canonical_sort_json,
        canonical_filter_json,
    }
}

/// Sort entries with a column id and an `asc`/`desc` direction, direction lower-cased.
fn parse_sort_entries(json: Option<&str>) -> Vec<SortModelEntry> {
    let Some(text) = json.map(str::trim).filter(|t| !t.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Option<Vec<SortModelEntry>>>(text) {
        Ok(entries) => entries
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let direction = SortDirection::parse(entry.sort.as_deref()?)?;
                entry.col_id.as_ref()?;
                Some(SortModelEntry {
                    col_id: entry.col_id,
                    sort: Some(direction.as_str().to_string()),
                })
            })
            .collect(),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed sort model");
            Vec::new()
        }
    }
}

fn parse_filter_entries(json: Option<&str>) -> BTreeMap<String, FilterDescriptor> {
    let Some(text) = json.map(str::trim).filter(|t| !t.is_empty()) else {
        return BTreeMap::new();
    };

    match serde_json::from_str::<Option<BTreeMap<String, FilterDescriptor>>>(text) {
        Ok(entries) => entries.unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed filter model");
            BTreeMap::new()
        }
    }
}
