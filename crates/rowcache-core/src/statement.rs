use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state reported by the remote statement engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    /// A state name this crate does not know; treated as non-terminal.
    Other(String),
}

impl StatementState {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Closed => "CLOSED",
            Self::Other(s) => s.as_str(),
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Canceled | Self::Closed
        )
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running | Self::Other(_) => 1,
            Self::Succeeded | Self::Failed | Self::Canceled | Self::Closed => 2,
        }
    }

    /// Picks the state to keep when `incoming` is written over `self`.
    ///
    /// States only move forward; once terminal, the stored state is final.
    #[must_use]
    pub fn advance(&self, incoming: &Self) -> Self {
        if self.is_terminal() || incoming.rank() < self.rank() {
            self.clone()
        } else {
            incoming.clone()
        }
    }
}

impl Default for StatementState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StatementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Ok(match normalized.as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "CLOSED" => Self::Closed,
            _ => Self::Other(normalized),
        })
    }
}

impl From<String> for StatementState {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

impl From<StatementState> for String {
    fn from(state: StatementState) -> Self {
        state.as_str().to_string()
    }
}

/// Column description taken from the upstream result schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnMeta {
    #[serde(default)]
    pub name: Option<String>,
    /// Declared position; columns are ordered by it.
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Remaining schema attributes, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stored metadata for one base statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementMeta {
    #[serde(default)]
    pub statement_id: String,
    #[serde(default)]
    pub page_size: usize,
    /// Absent until the engine reports totals.
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub schema: Vec<ColumnMeta>,
    #[serde(default)]
    pub state: StatementState,
}

impl StatementMeta {
    /// Placeholder returned for statements with no stored meta yet.
    #[must_use]
    pub fn pending(statement_id: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            ..Self::default()
        }
    }

    /// Number of stored pages implied by the row count, when known.
    #[must_use]
    pub fn page_count(&self) -> Option<u64> {
        let page_size = self.page_size as u64;
        if page_size == 0 {
            return None;
        }
        self.row_count.map(|rc| rc.div_ceil(page_size))
    }
}

/// Partial meta write; absent fields keep whatever is already stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaUpdate {
    pub page_size: Option<usize>,
    pub row_count: Option<u64>,
    pub columns: Option<Vec<String>>,
    pub schema: Option<Vec<ColumnMeta>>,
    pub state: Option<StatementState>,
}

impl MetaUpdate {
    #[must_use]
    pub fn with_row_count(mut self, row_count: Option<u64>) -> Self {
        self.row_count = row_count;
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: StatementState) -> Self {
        self.state = Some(state);
        self
    }

    /// Merges this update over `existing`.
    ///
    /// The row count never decreases and a terminal state is never replaced.
    #[must_use]
    pub fn apply(self, statement_id: &str, existing: Option<StatementMeta>) -> StatementMeta {
        let mut meta = existing.unwrap_or_else(|| StatementMeta::pending(statement_id));
        meta.statement_id = statement_id.to_string();

        if let Some(page_size) = self.page_size {
            meta.page_size = page_size;
        }
        if let Some(rc) = self.row_count {
            meta.row_count = Some(meta.row_count.map_or(rc, |old| old.max(rc)));
        }
        if let Some(columns) = self.columns {
            meta.columns = columns;
        }
        if let Some(schema) = self.schema {
            meta.schema = schema;
        }
        if let Some(state) = self.state {
            meta.state = meta.state.advance(&state);
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_parsing_is_case_insensitive() {
        assert_eq!("succeeded".parse::<StatementState>().unwrap(), StatementState::Succeeded);
        assert_eq!(
            "QUEUED".parse::<StatementState>().unwrap(),
            StatementState::Other("QUEUED".into())
        );
        assert!(StatementState::Canceled.is_terminal());
        assert!(!StatementState::Other("QUEUED".into()).is_terminal());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let done = StatementState::Failed;
        assert_eq!(done.advance(&StatementState::Running), StatementState::Failed);
        assert_eq!(
            StatementState::Running.advance(&StatementState::Pending),
            StatementState::Running
        );
        assert_eq!(
            StatementState::Pending.advance(&StatementState::Succeeded),
            StatementState::Succeeded
        );
    }

    #[test]
    fn test_partial_update_preserves_fields() {
        let initial = MetaUpdate {
            page_size: Some(500),
            columns: Some(vec!["id".into(), "amount".into()]),
            state: Some(StatementState::Pending),
            ..MetaUpdate::default()
        }
        .apply("s1", None);

        let updated = MetaUpdate::default()
            .with_row_count(Some(1200))
            .apply("s1", Some(initial));

        assert_eq!(updated.page_size, 500);
        assert_eq!(updated.columns, vec!["id".to_string(), "amount".to_string()]);
        assert_eq!(updated.row_count, Some(1200));
        assert_eq!(updated.page_count(), Some(3));

        let lowered = MetaUpdate::default()
            .with_row_count(Some(10))
            .apply("s1", Some(updated));
        assert_eq!(lowered.row_count, Some(1200));
    }

    #[test]
    fn test_meta_json_layout() {
        let meta = MetaUpdate {
            page_size: Some(500),
            row_count: Some(3),
            state: Some(StatementState::Succeeded),
            ..MetaUpdate::default()
        }
        .apply("s1", None);

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["pageSize"], json!(500));
        assert_eq!(value["rowCount"], json!(3));
        assert_eq!(value["state"], json!("SUCCEEDED"));

        let back: StatementMeta = serde_json::from_value(json!({"pageSize": 100})).unwrap();
        assert_eq!(back.row_count, None);
        assert_eq!(back.state, StatementState::Pending);
    }
}
