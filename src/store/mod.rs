//! Document store integration: HTTP client, content chunking, and the
//! retrying page writer (spec §4.8).

pub mod chunk;
pub mod client;
pub mod writer;

pub use chunk::chunk_content;
pub use client::{DocumentStoreClient, HttpStoreClient};
pub use writer::{StoreConfig, StoreWriter};
