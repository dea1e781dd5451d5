//! AI collaborators.
//!
//! Two trait seams keep the session engine independent of any provider:
//! [`VisionAnalyzer`] turns a room photo into a structured analysis and
//! [`ChatAssistant`] answers follow-up questions about it. [`GroqClient`]
//! implements both against an OpenAI-compatible chat completions API.

mod groq;
pub mod image;

pub use groq::GroqClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checklist::{Checklist, VisionAnalysis};
use crate::error::AiError;

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// System message that grounds the advisory chat in a room analysis.
    pub fn analysis_context(checklist: &Checklist) -> Self {
        Self::system(format!(
            "This is an analysis of a room that needs cleaning: {} The cleaning tasks are: {}",
            checklist.summary,
            checklist.titles().join(", ")
        ))
    }
}

/// Decomposes a photographed room into cleaning steps.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// `image_ref` is a `data:` URL, an http(s) URL or a local file path.
    async fn analyze(&self, image_ref: &str) -> Result<VisionAnalysis, AiError>;
}

/// Answers follow-up questions in an ongoing transcript.
#[async_trait]
pub trait ChatAssistant: Send + Sync {
    /// Returns the next assistant message for `messages`.
    async fn follow_up(&self, messages: &[ChatMessage]) -> Result<String, AiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::ChecklistStep;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn analysis_context_lists_step_titles() {
        let checklist = Checklist::new(
            "Clothes on the floor.",
            vec![ChecklistStep::new("Pick up clothes", 1), ChecklistStep::new("Vacuum", 2)],
        );
        let message = ChatMessage::analysis_context(&checklist);
        assert_eq!(message.role, ChatRole::System);
        assert_eq!(
            message.content,
            "This is an analysis of a room that needs cleaning: Clothes on the floor. \
             The cleaning tasks are: Pick up clothes, Vacuum"
        );
    }
}
