//! Conversational routing pipeline.
//!
//! A user turn flows through a fixed sequence of stages: topic resolution,
//! retrieval collection against one or more vector-store collections,
//! conditional intent classification, rule matching over the assembled
//! profile, and response generation with an optional bounded tool-calling
//! loop. Collection never branches on what it collects; all routing
//! decisions live in the ordered rule list.
//!
//! The crate is laid out hexagonally: `domain` holds the models, ports and
//! errors; `application` the pipeline stages; `adapters` the HTTP and mock
//! implementations of the ports; `infrastructure` configuration and logging;
//! `cli` the binary surface.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub use application::{Pipeline, TurnRequest, TurnResponse};
pub use domain::errors::{DomainError, DomainResult};
