//! Cache key layout.
//!
//! ```text
//! {scope}:{statement}:meta
//! {scope}:{statement}:chunk:{index}
//! {scope}:{statement}:view:{sig}:meta
//! {scope}:{statement}:view:{sig}:chunk:{index}
//! ```

pub fn meta_key(scope: &str, statement_id: &str) -> String {
    format!("{scope}:{statement_id}:meta")
}

pub fn chunk_key(scope: &str, statement_id: &str, index: usize) -> String {
    format!("{scope}:{statement_id}:chunk:{index}")
}

pub fn view_meta_key(scope: &str, statement_id: &str, sig: &str) -> String {
    format!("{scope}:{statement_id}:view:{sig}:meta")
}

pub fn view_chunk_key(scope: &str, statement_id: &str, sig: &str, index: usize) -> String {
    format!("{scope}:{statement_id}:view:{sig}:chunk:{index}")
}
