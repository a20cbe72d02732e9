//! OpenAI-compatible request and response types
//!
//! Validation is enforced during deserialization - invalid instances cannot exist.

use crate::models::ModelRecord;
use crate::shared::completion::CompletionResult;
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// OpenAI API Object Type Constants
// =============================================================================

/// Object type for non-streaming chat completion responses
pub const OBJECT_CHAT_COMPLETION: &str = "chat.completion";
/// Object type for streaming chat completion chunks
pub const OBJECT_CHAT_COMPLETION_CHUNK: &str = "chat.completion.chunk";
/// Object type for list responses (e.g., model list)
pub const OBJECT_LIST: &str = "list";
/// Object type for individual model entries
pub const OBJECT_MODEL: &str = "model";

// =============================================================================
// Shared Validation Logic
// =============================================================================

/// Validate ChatCompletionRequest fields
///
/// Shared by the builder and the serde deserializer. Sampling parameters are
/// range-checked even though the upstream has no knobs for them, so clients
/// get the same rejections they would from OpenAI.
fn validate_request_fields(
    model: &str,
    messages: &[ChatMessage],
    temperature: Option<f64>,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
) -> Result<(), String> {
    if model.trim().is_empty() {
        return Err("model cannot be empty".to_string());
    }

    if messages.is_empty() {
        return Err("messages array cannot be empty".to_string());
    }

    if let Some(temp) = temperature {
        if !temp.is_finite() {
            return Err("temperature must be a finite number".to_string());
        }
        if !(0.0..=2.0).contains(&temp) {
            return Err("temperature must be between 0.0 and 2.0".to_string());
        }
    }

    if let Some(top_p) = top_p {
        if !top_p.is_finite() {
            return Err("top_p must be a finite number".to_string());
        }
        if top_p <= 0.0 || top_p > 1.0 {
            return Err("top_p must be between 0.0 (exclusive) and 1.0 (inclusive)".to_string());
        }
    }

    if let Some(max) = max_tokens
        && max == 0
    {
        return Err("max_tokens must be greater than 0".to_string());
    }

    Ok(())
}

// =============================================================================
// Message Types
// =============================================================================

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message in the conversation
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    role: MessageRole,
    content: String,
}

impl ChatMessage {
    /// Create a new message with validation
    ///
    /// # Errors
    /// Returns an error if content is empty or whitespace-only for User or
    /// System roles. Assistant messages may be empty.
    pub fn try_new(role: MessageRole, content: impl Into<String>) -> Result<Self, &'static str> {
        let content = content.into();
        if content.trim().is_empty() && role != MessageRole::Assistant {
            return Err("content cannot be empty for user/system messages");
        }
        Ok(Self { role, content })
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl<'de> Deserialize<'de> for ChatMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawMessage {
            role: MessageRole,
            content: String,
        }

        let raw = RawMessage::deserialize(deserializer)?;

        if raw.content.trim().is_empty() && raw.role != MessageRole::Assistant {
            return Err(serde::de::Error::custom(format!(
                "{:?} message content cannot be empty",
                raw.role
            )));
        }

        Ok(ChatMessage {
            role: raw.role,
            content: raw.content,
        })
    }
}

// =============================================================================
// Chat Completion Request
// =============================================================================

/// OpenAI-compatible chat completion request
///
/// `temperature`, `top_p`, `max_tokens` and `user` are accepted for client
/// compatibility but not forwarded; Retool agents carry their own settings.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(default)]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

/// Builder for constructing [`ChatCompletionRequest`] programmatically
///
/// Performs the same validation as JSON deserialization.
///
/// # Examples
///
/// ```
/// use rever::handlers::openai::types::ChatCompletionRequest;
///
/// let request = ChatCompletionRequest::builder()
///     .model("claude-sonnet-4")
///     .system_message("You are helpful.")
///     .user_message("Hello!")
///     .build()
///     .expect("valid request");
/// assert_eq!(request.model(), "claude-sonnet-4");
/// ```
#[derive(Debug, Default)]
pub struct ChatCompletionRequestBuilder {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    top_p: Option<f64>,
}

impl ChatCompletionRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Add a system message
    ///
    /// # Panics
    /// Panics if content is empty (use `message()` for error handling)
    pub fn system_message(self, content: impl Into<String>) -> Self {
        let msg = ChatMessage::try_new(MessageRole::System, content)
            .expect("system message content must not be empty");
        self.message(msg)
    }

    /// Add a user message
    ///
    /// # Panics
    /// Panics if content is empty (use `message()` for error handling)
    pub fn user_message(self, content: impl Into<String>) -> Self {
        let msg = ChatMessage::try_new(MessageRole::User, content)
            .expect("user message content must not be empty");
        self.message(msg)
    }

    pub fn assistant_message(self, content: impl Into<String>) -> Self {
        let msg = ChatMessage::try_new(MessageRole::Assistant, content)
            .expect("assistant message creation should not fail");
        self.message(msg)
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Build the request, performing all validation
    ///
    /// # Errors
    /// Returns an error string if validation fails (same rules as JSON deserialization)
    pub fn build(self) -> Result<ChatCompletionRequest, String> {
        validate_request_fields(
            &self.model,
            &self.messages,
            self.temperature,
            self.top_p,
            self.max_tokens,
        )?;

        Ok(ChatCompletionRequest {
            model: self.model,
            messages: self.messages,
            stream: self.stream,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            user: None,
        })
    }
}

impl ChatCompletionRequest {
    pub fn builder() -> ChatCompletionRequestBuilder {
        ChatCompletionRequestBuilder::new()
    }

    /// Requested logical model id
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn stream(&self) -> bool {
        self.stream
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    /// Render the conversation as a single Human/Assistant transcript
    pub fn to_prompt_string(&self) -> String {
        crate::shared::prompt::format_conversation(&self.messages)
    }
}

impl<'de> Deserialize<'de> for ChatCompletionRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawRequest {
            model: String,
            messages: Vec<ChatMessage>,
            #[serde(default)]
            stream: bool,
            temperature: Option<f64>,
            max_tokens: Option<u32>,
            top_p: Option<f64>,
            user: Option<String>,
        }

        let raw = RawRequest::deserialize(deserializer)?;

        validate_request_fields(
            &raw.model,
            &raw.messages,
            raw.temperature,
            raw.top_p,
            raw.max_tokens,
        )
        .map_err(serde::de::Error::custom)?;

        Ok(ChatCompletionRequest {
            model: raw.model,
            messages: raw.messages,
            stream: raw.stream,
            temperature: raw.temperature,
            max_tokens: raw.max_tokens,
            top_p: raw.top_p,
            user: raw.user,
        })
    }
}

// =============================================================================
// Chat Completion Response (Non-Streaming)
// =============================================================================

/// Finish reason for a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
}

/// Usage statistics for a chat completion response
///
/// Retool does not report token counts, so responses carry zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }
}

/// Assistant message in response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: MessageRole,
    pub content: String,
}

impl AssistantMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single choice in the response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl From<CompletionResult> for ChatCompletion {
    fn from(result: CompletionResult) -> Self {
        Self {
            id: result.id,
            object: OBJECT_CHAT_COMPLETION.to_string(),
            created: result.created,
            model: result.model,
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage::new(result.content),
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::default(),
        }
    }
}

// =============================================================================
// Chat Completion Chunk (Streaming)
// =============================================================================

/// Delta content in a streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A single choice in a streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<FinishReason>,
}

/// OpenAI-compatible streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    fn with_choice(id: &str, model: &str, created: i64, choice: ChunkChoice) -> Self {
        Self {
            id: id.to_string(),
            object: OBJECT_CHAT_COMPLETION_CHUNK.to_string(),
            created,
            model: model.to_string(),
            choices: vec![choice],
        }
    }

    /// Create an initial chunk with role announcement
    pub fn initial(id: &str, model: &str, created: i64) -> Self {
        Self::with_choice(
            id,
            model,
            created,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    role: Some("assistant".to_string()),
                    content: None,
                },
                finish_reason: None,
            },
        )
    }

    /// Create a content chunk
    pub fn content(id: &str, model: &str, created: i64, content: &str) -> Self {
        Self::with_choice(
            id,
            model,
            created,
            ChunkChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: Some(content.to_string()),
                },
                finish_reason: None,
            },
        )
    }

    /// Create a final chunk with finish reason
    pub fn finish(id: &str, model: &str, created: i64) -> Self {
        Self::with_choice(
            id,
            model,
            created,
            ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(FinishReason::Stop),
            },
        )
    }
}

// =============================================================================
// Models List Response
// =============================================================================

/// A model object for the models list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
    pub name: String,
}

impl ModelObject {
    pub fn from_record(record: &ModelRecord, created: i64) -> Self {
        Self {
            id: record.id.clone(),
            object: OBJECT_MODEL.to_string(),
            created,
            owned_by: record.owned_by.to_string(),
            name: record.display_name(),
        }
    }
}

/// Response for GET /v1/models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsListResponse {
    pub object: String,
    pub data: Vec<ModelObject>,
}

impl ModelsListResponse {
    pub fn new(models: Vec<ModelObject>) -> Self {
        Self {
            object: OBJECT_LIST.to_string(),
            data: models,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
