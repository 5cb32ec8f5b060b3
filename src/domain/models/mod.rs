//! Domain models: pure data, no I/O.

pub mod config;
pub mod message;
pub mod profile;
pub mod rule;
pub mod tool;

pub use config::{
    CollectionConfig, CollectorMode, Config, IntentClassifierConfig, IntentConfig, LoggingConfig,
    ModelConfig, RetrievalConfig, ToolConfig, ToolsSectionConfig, TopicConfig,
};
pub use message::{
    ChatMessage, Completion, CompletionRequest, FinishReason, Role, ToolCallRequest, ToolSpec,
};
pub use profile::{
    Classification, CollectionRef, Profile, RagResult, RetrievalEntry, RetrievedDocument,
    TopicStatus,
};
pub use rule::{MatchCriteria, RagResultCriterion, ReasoningConfig, ResponseRule, ToolsConfig};
pub use tool::{ToolCallRecord, ToolDefinition, ToolKind, ToolOutcome};
