//! Ports: trait boundaries to external collaborators.

pub mod language_model;
pub mod retrieval;
pub mod tool_handler;

pub use language_model::LanguageModel;
pub use retrieval::{CollectionInfo, RetrievalClient, RetrievalResponse, ScoredDocument};
pub use tool_handler::ToolHandler;
