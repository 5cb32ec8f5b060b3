//! Adapters binding the domain ports to concrete backends.

pub mod llm;
pub mod retrieval;
pub mod tools;
