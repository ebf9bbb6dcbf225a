//! Cache storage for statement results and derived views.

mod chunk_store;
pub mod codec;
pub mod compression;
pub mod keys;
pub mod kv;
pub mod lookup_cache;
pub mod memory;
pub mod result_cache;
pub mod signature;
pub mod view_cache;

pub use compression::CompressionConfig;
pub use kv::KvStore;
pub use lookup_cache::LookupCache;
pub use memory::MemoryKvStore;
pub use result_cache::ResultCache;
pub use signature::compute_signature;
pub use view_cache::ViewCache;
