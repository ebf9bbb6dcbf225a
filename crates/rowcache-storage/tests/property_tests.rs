// Property-based tests for the cache storage layer
//
// Properties tested:
// 1. Signature determinism: object key order and whitespace never change a signature
// 2. Signature sensitivity: a different statement id always changes the signature
// 3. Chunk storage: rows read back from the result cache equal the rows written

use proptest::prelude::*;
use rowcache_core::{CacheConfig, CellValue, Row};
use rowcache_storage::{compute_signature, MemoryKvStore, ResultCache};
use std::sync::Arc;

// Renders a filter model with the column keys (and leaf fields) in the given order.
fn render_filter(columns: &[(String, String)], reversed: bool, spacer: &str) -> String {
    let mut entries: Vec<String> = columns
        .iter()
        .map(|(col, operand)| {
            let fields = [
                format!("\"filterType\":{spacer}\"text\""),
                format!("\"type\":{spacer}\"contains\""),
                format!("\"filter\":{spacer}\"{operand}\""),
            ];
            let fields: Vec<String> = if reversed {
                fields.iter().rev().cloned().collect()
            } else {
                fields.to_vec()
            };
            format!("\"{col}\":{spacer}{{{}}}", fields.join(&format!(",{spacer}")))
        })
        .collect();
    if reversed {
        entries.reverse();
    }
    format!("{{{spacer}{}{spacer}}}", entries.join(","))
}

fn cell_strategy() -> impl Strategy<Value = CellValue> {
    prop_oneof![
        Just(CellValue::Null),
        any::<i64>().prop_map(CellValue::Int),
        (-1.0e9f64..1.0e9).prop_map(CellValue::Float),
        "[a-zA-Z0-9 ,\"\\-]{0,12}".prop_map(CellValue::Text),
    ]
}

proptest! {
    #[test]
    fn prop_signature_ignores_key_order_and_whitespace(
        columns in prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,6}", 1..5),
        spacer in prop::sample::select(vec!["", " ", "\n  "]),
    ) {
        let columns: Vec<(String, String)> = columns.into_iter().collect();
        let sort = r#"[{"colId":"amount","sort":"desc"}]"#;

        let forward = render_filter(&columns, false, "");
        let shuffled = render_filter(&columns, true, spacer);

        prop_assert_eq!(
            compute_signature("stmt-1", Some(sort), Some(&forward)),
            compute_signature("stmt-1", Some(sort), Some(&shuffled))
        );
    }

    #[test]
    fn prop_signature_depends_on_statement(
        a in "[a-z0-9-]{1,16}",
        b in "[a-z0-9-]{1,16}",
    ) {
        prop_assume!(a != b);
        let filter = r#"{"amount":{"filterType":"number","type":"greaterThan","filter":"100"}}"#;
        prop_assert_ne!(
            compute_signature(&a, None, Some(filter)),
            compute_signature(&b, None, Some(filter))
        );
    }

    #[test]
    fn prop_stored_chunk_reads_back_unchanged(
        rows in prop::collection::vec(prop::collection::vec(cell_strategy(), 0..6), 0..40),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result: Result<(), TestCaseError> = runtime.block_on(async {
            let cache = ResultCache::new(Arc::new(MemoryKvStore::new(100)), &CacheConfig::default());

            cache.put_chunk("u1", "s1", 0, &rows).await.unwrap();
            let read: Option<Vec<Row>> = cache.get_chunk("u1", "s1", 0).await.unwrap();

            prop_assert_eq!(read, Some(rows.clone()));
            Ok(())
        });
        result?;
    }
}
