//! Language-model adapters implementing the [`LanguageModel`] port.
//!
//! [`LanguageModel`]: crate::domain::ports::LanguageModel

pub mod mock;
pub mod openai_api;
pub mod registry;

pub use registry::{ModelHandle, ModelRegistry};
