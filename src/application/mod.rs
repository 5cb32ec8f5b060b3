//! Use-case layer: the per-request pipeline and its stages.

pub mod generator;
pub mod intent;
pub mod pipeline;
pub mod retrieval;
pub mod rules;
pub mod tool_loop;
pub mod topic;

pub use pipeline::{Pipeline, TurnRequest, TurnResponse};
