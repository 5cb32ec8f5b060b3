//! Topic resolution: derives the running conversation topic and decides
//! whether the turn starts a new topic or continues the prior one.
//!
//! The resolved topic text is the query basis for retrieval on continuation
//! turns, which carries subject context into the embedding query and resolves
//! pronoun references ("does it support X?").

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::models::{ChatMessage, CompletionRequest, TopicConfig, TopicStatus};
use crate::domain::ports::LanguageModel;

/// Output of topic resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResolution {
    pub topic: String,
    pub status: TopicStatus,
}

/// Resolves the running topic for a turn.
pub struct TopicResolver {
    llm: Arc<dyn LanguageModel>,
    config: TopicConfig,
    model_id: String,
}

impl TopicResolver {
    pub fn new(llm: Arc<dyn LanguageModel>, config: TopicConfig, model_id: String) -> Self {
        Self {
            llm,
            config,
            model_id,
        }
    }

    /// Resolve the topic for `user_message` given the prior topic.
    ///
    /// An empty or whitespace prior topic short-circuits to a new topic with
    /// the raw message as topic text. Otherwise a single classification call
    /// decides between continuation (merged topic) and a fresh topic. Any
    /// failure of that call degrades to continuation with the prior topic;
    /// topic detection never fails the request.
    pub async fn resolve(&self, user_message: &str, prior_topic: &str) -> TopicResolution {
        if prior_topic.trim().is_empty() {
            debug!("No prior topic, starting new topic from message");
            return TopicResolution {
                topic: user_message.to_string(),
                status: TopicStatus::NewTopic,
            };
        }

        let prompt = build_classification_prompt(prior_topic, user_message);
        let request = CompletionRequest::new(
            self.model_id.clone(),
            vec![ChatMessage::user(prompt)],
            self.config.max_tokens,
        )
        .with_temperature(0.0);

        match self.llm.complete(request).await {
            Ok(completion) => match parse_classification(&completion.content) {
                Some(resolution) => {
                    debug!(
                        status = ?resolution.status,
                        topic = %resolution.topic,
                        "Topic classified"
                    );
                    resolution
                }
                None => {
                    warn!(
                        raw = %completion.content,
                        "Unparseable topic classification, keeping prior topic"
                    );
                    TopicResolution {
                        topic: prior_topic.to_string(),
                        status: TopicStatus::Continuation,
                    }
                }
            },
            Err(err) => {
                warn!(error = %err, "Topic classification failed, keeping prior topic");
                TopicResolution {
                    topic: prior_topic.to_string(),
                    status: TopicStatus::Continuation,
                }
            }
        }
    }
}

fn build_classification_prompt(prior_topic: &str, user_message: &str) -> String {
    format!(
        "You track the topic of a conversation.\n\
         Current topic: {prior_topic}\n\
         New user message: {user_message}\n\n\
         If the message continues the current topic, reply with exactly one line:\n\
         CONTINUATION|<topic merging the current topic and the new message>\n\
         If the message starts a different topic, reply with exactly one line:\n\
         NEW|<topic of the new message>\n\
         Reply with that single line and nothing else."
    )
}

/// Parse the strict `STATUS|topic` line; `None` degrades upstream.
fn parse_classification(raw: &str) -> Option<TopicResolution> {
    let line = raw.trim().lines().next()?.trim();
    let (status, topic) = line.split_once('|')?;
    let topic = topic.trim();
    if topic.is_empty() {
        return None;
    }
    let status = match status.trim() {
        "NEW" => TopicStatus::NewTopic,
        "CONTINUATION" => TopicStatus::Continuation,
        _ => return None,
    };
    Some(TopicResolution {
        topic: topic.to_string(),
        status,
    })
}
