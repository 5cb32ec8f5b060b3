//! Retrieval adapters implementing the [`RetrievalClient`] port.
//!
//! [`RetrievalClient`]: crate::domain::ports::RetrievalClient

pub mod chroma_http;
pub mod mock;

pub use chroma_http::{ChromaHttpClient, ChromaHttpConfig};
