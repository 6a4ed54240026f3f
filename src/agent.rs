//! LLM agent module for outline generation.
//!
//! Uses rstructor's Gemini client for the model call. The conversation lives
//! in a [`ChatSession`] owned by the caller, one per request.

use crate::config::Config;
use crate::extract::{extract_outline, ExtractionError};
use crate::prompt::outline_prompt;
use crate::slide::Outline;
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("failed to parse response: {0}")]
    ParseError(#[from] ExtractionError),
    #[error("configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// A language model that answers a conversation with text.
#[async_trait]
pub trait SlideModel: Send + Sync {
    /// Reply to the conversation; the last turn is the user's new message.
    async fn complete(&self, persona: &str, turns: &[Turn]) -> Result<String, AgentError>;
}

/// Multi-turn conversation state.
///
/// Each outline request creates its own session, so history never leaks
/// between unrelated callers. Outline generation sends one message per
/// session; later turns, such as a slide rewrite once `/rewrite` is wired,
/// are sent with the earlier exchange replayed ahead of them.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    persona: String,
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            history: Vec::new(),
        }
    }

    /// Send a message and record both it and the reply.
    ///
    /// A failed call leaves the history untouched.
    pub async fn send(&mut self, model: &dyn SlideModel, message: &str) -> Result<String, AgentError> {
        self.history.push(Turn {
            role: Role::User,
            text: message.to_string(),
        });

        match model.complete(&self.persona, &self.history).await {
            Ok(reply) => {
                self.history.push(Turn {
                    role: Role::Model,
                    text: reply.clone(),
                });
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[Turn] {
        &self.history
    }
}

/// Gemini-backed [`SlideModel`]
pub struct GeminiAgent {
    api_key: String,
    model: String,
}

impl GeminiAgent {
    pub fn new(api_key: impl Into<String>, model: &str) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        Ok(Self::new(config.api_key()?, &config.agent.model))
    }
}

#[async_trait]
impl SlideModel for GeminiAgent {
    async fn complete(&self, persona: &str, turns: &[Turn]) -> Result<String, AgentError> {
        let client = GeminiClient::new(self.api_key.as_str())
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(&self.model));

        let prompt = render_transcript(persona, turns);
        tracing::debug!(chars = prompt.len(), "sending prompt to gemini");

        let result = client
            .generate_with_metadata(&prompt)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        tracing::trace!(response = %result.text, "raw LLM response");
        Ok(result.text)
    }
}

/// Flatten a conversation into a single prompt.
///
/// A one-message session is sent as the persona plus that message. Longer
/// sessions replay earlier turns as a labelled transcript ahead of the newest
/// user message; nothing sends a second turn until `/rewrite` has a contract.
fn render_transcript(persona: &str, turns: &[Turn]) -> String {
    let mut prompt = String::new();
    if !persona.trim().is_empty() {
        prompt.push_str(persona.trim());
        prompt.push_str("\n\n");
    }

    let Some((latest, earlier)) = turns.split_last() else {
        return prompt;
    };

    if !earlier.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in earlier {
            let label = match turn.role {
                Role::User => "User",
                Role::Model => "Model",
            };
            prompt.push_str(&format!("{label}: {}\n", turn.text.trim()));
        }
        prompt.push_str("\n---\n\n");
    }

    prompt.push_str(&latest.text);
    prompt
}

/// Ask the model for an outline and parse it.
///
/// Image URLs are not resolved here; see [`crate::images`].
pub async fn generate_outline(
    model: &dyn SlideModel,
    session: &mut ChatSession,
    topic: &str,
    num_slides: &str,
    instructions: &str,
) -> Result<Outline, AgentError> {
    let prompt = outline_prompt(topic, num_slides, instructions);
    let reply = session.send(model, &prompt).await?;
    let outline = extract_outline(&reply)?;
    tracing::info!(topic, slides = outline.len(), "outline generated");
    Ok(outline)
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        other => {
            tracing::warn!(model = other, "unknown model, falling back to gemini-2.0-flash");
            GeminiModel::Gemini20Flash
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replies with canned text and records every conversation it sees.
    pub(crate) struct CannedModel {
        reply: Result<String, String>,
        pub(crate) seen: Mutex<Vec<Vec<Turn>>>,
    }

    impl CannedModel {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SlideModel for CannedModel {
        async fn complete(&self, _persona: &str, turns: &[Turn]) -> Result<String, AgentError> {
            self.seen.lock().unwrap().push(turns.to_vec());
            self.reply.clone().map_err(AgentError::RequestFailed)
        }
    }

    const REPLY: &str = "```json\n[{\"id\": 1, \"title\": \"Tides\", \"points\": [\"Moon\"], \"image_keywords\": [\"tide\"]}]\n```";

    #[tokio::test]
    async fn generates_outline_from_fenced_reply() {
        let model = CannedModel::replying(REPLY);
        let mut session = ChatSession::new("persona");

        let outline = generate_outline(&model, &mut session, "Intro to Oceans", "1", "")
            .await
            .unwrap();

        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].title, "Tides");
        assert_eq!(outline[0].image_url, None);

        let seen = model.seen.lock().unwrap();
        assert!(seen[0][0].text.contains("Intro to Oceans"));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].role, Role::Model);
    }

    #[tokio::test]
    async fn extraction_failure_is_reported() {
        let model = CannedModel::replying("No slides today.");
        let mut session = ChatSession::default();

        let err = generate_outline(&model, &mut session, "Oceans", "2", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ParseError(ExtractionError::NoJson)));
    }

    #[tokio::test]
    async fn failed_call_leaves_history_untouched() {
        let model = CannedModel::failing("quota exceeded");
        let mut session = ChatSession::default();

        let err = session.send(&model, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::RequestFailed(_)));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn sessions_do_not_share_history() {
        let model = CannedModel::replying(REPLY);
        let mut first = ChatSession::default();
        let mut second = ChatSession::default();

        first.send(&model, "one").await.unwrap();
        first.send(&model, "two").await.unwrap();
        second.send(&model, "three").await.unwrap();

        assert_eq!(first.history().len(), 4);
        assert_eq!(second.history().len(), 2);
        assert_eq!(model.seen.lock().unwrap()[2].len(), 1);
    }

    #[test]
    fn transcript_replays_earlier_turns() {
        let turns = vec![
            Turn { role: Role::User, text: "first".into() },
            Turn { role: Role::Model, text: "reply".into() },
            Turn { role: Role::User, text: "second".into() },
        ];
        let prompt = render_transcript("Be brief.", &turns);
        assert!(prompt.starts_with("Be brief.\n\n"));
        assert!(prompt.contains("User: first\nModel: reply\n"));
        assert!(prompt.ends_with("second"));
    }

    #[test]
    fn single_turn_is_sent_as_is() {
        let turns = vec![Turn { role: Role::User, text: "only".into() }];
        assert_eq!(render_transcript("", &turns), "only");
    }
}
