use serde::{Deserialize, Serialize};

/// Stored metadata for a fully built derived view.
///
/// A view is written pages first and meta last, so its presence means every page is readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMeta {
    /// Always `"view"`.
    #[serde(rename = "type", default = "view_type")]
    pub kind: String,
    pub base_statement_id: String,
    pub sig: String,
    pub page_size: usize,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub chunk_count: usize,
}

fn view_type() -> String {
    "view".to_string()
}

impl ViewMeta {
    #[must_use]
    pub fn new(
        base_statement_id: impl Into<String>,
        sig: impl Into<String>,
        page_size: usize,
        row_count: u64,
        chunk_count: usize,
    ) -> Self {
        Self {
            kind: view_type(),
            base_statement_id: base_statement_id.into(),
            sig: sig.into(),
            page_size,
            row_count: Some(row_count),
            chunk_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_meta_json_layout() {
        let meta = ViewMeta::new("s1", "abc", 500, 42, 1);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "view",
                "baseStatementId": "s1",
                "sig": "abc",
                "pageSize": 500,
                "rowCount": 42,
                "chunkCount": 1
            })
        );
    }
}
