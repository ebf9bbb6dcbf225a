//! Client for the remote asynchronous SQL statement engine.

pub mod api;
pub mod client;
pub mod decode;
pub mod error;
pub mod mock;
pub mod supervisor;
pub mod upstream;
pub mod wire;

pub use api::StatementApi;
pub use client::WarehouseClient;
pub use error::{UpstreamError, UpstreamResult};
pub use supervisor::StreamSupervisor;
pub use upstream::{ChunkEvent, ChunkListener, SchemaInfo, UpstreamClient};
