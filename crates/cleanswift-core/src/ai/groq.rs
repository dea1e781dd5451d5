//! OpenAI-compatible chat completions client (Groq by default).

use async_trait::async_trait;
use indoc::indoc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::image;
use super::{ChatAssistant, ChatMessage, ChatRole, VisionAnalyzer};
use crate::checklist::VisionAnalysis;
use crate::error::AiError;
use crate::storage::AiConfig;

const VISION_PROMPT: &str = indoc! {"
    Analyze this image of a room that needs cleaning. Identify up to 5 specific \
    cleaning tasks that need to be done, list them in priority order (1 being \
    highest priority), and provide a brief description for each. Format your \
    response as a JSON object with 'tasks' array (each with 'title', 'priority', \
    and 'description') and a brief 'summary' of the overall state of the room.
"};

/// Content part for multimodal messages.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: ChatRole,
    content: MessageContent,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: MessageContent::Text(message.content.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client implementing both AI collaborators.
#[derive(Clone)]
pub struct GroqClient {
    http: Client,
    api_key: Option<String>,
    config: AiConfig,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("endpoint", &self.endpoint())
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl GroqClient {
    /// Build from configuration, reading the key from `config.api_key_env`.
    /// A missing key is reported per request, not here.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key(),
            config: config.clone(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::MissingApiKey(self.config.api_key_env.clone()))?;

        tracing::debug!(model = request.model, "sending chat completion");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::MalformedResponse(format!("{e}: {body}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::MalformedResponse("response has no message content".into()))
    }
}

/// Parse the model's JSON answer, tolerating a markdown code fence.
fn parse_analysis(content: &str) -> Result<VisionAnalysis, AiError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value = serde_json::from_str(unfenced)
        .map_err(|_| AiError::NoStructuredResult(truncate(unfenced)))?;
    if value.get("tasks").or_else(|| value.get("steps")).is_none() {
        return Err(AiError::NoStructuredResult(truncate(unfenced)));
    }
    serde_json::from_value(value).map_err(|e| AiError::NoStructuredResult(e.to_string()))
}

fn truncate(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() > MAX {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    } else {
        text.to_string()
    }
}

#[async_trait]
impl VisionAnalyzer for GroqClient {
    async fn analyze(&self, image_ref: &str) -> Result<VisionAnalysis, AiError> {
        let image = image::resolve(&self.http, image_ref).await?;
        let request = CompletionRequest {
            model: &self.config.vision_model,
            messages: vec![WireMessage {
                role: ChatRole::User,
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: VISION_PROMPT.trim().to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                        },
                    },
                ]),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.vision_temperature,
            top_p: None,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let content = self.complete(&request).await?;
        parse_analysis(&content)
    }
}

#[async_trait]
impl ChatAssistant for GroqClient {
    async fn follow_up(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let request = CompletionRequest {
            model: &self.config.chat_model,
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.chat_temperature,
            top_p: Some(self.config.chat_top_p),
            response_format: None,
        };
        self.complete(&request).await
    }
}
