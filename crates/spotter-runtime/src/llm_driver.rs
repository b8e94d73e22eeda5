//! [`LlmDriver`] – OpenAI-compatible LLM interface.
//!
//! Talks to any server exposing `/v1/chat/completions`: OpenAI itself, or a
//! local [Ollama](https://ollama.com) instance (`http://localhost:11434`).
//! Calls block; the interaction routine is single-threaded.
//!
//! # Example
//!
//! ```rust,no_run
//! use spotter_runtime::llm_driver::{LlmDriver, ChatMessage, Role};
//!
//! let driver = LlmDriver::new("http://localhost:11434", "llama3");
//!
//! let messages = vec![
//!     ChatMessage { role: Role::System, content: "You are a friendly robot.".into() },
//!     ChatMessage { role: Role::User, content: "Where are my keys?".into() },
//! ];
//!
//! // Requires a running model server – skipped in unit tests.
//! // let reply = driver.complete(&messages).unwrap();
//! ```

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use spotter_types::SpotterError;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from LLM driver operations.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the model server could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

impl From<LlmError> for SpotterError {
    fn from(err: LlmError) -> Self {
        SpotterError::LlmInferenceFailed(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
}

/// `response_format` field that enforces structured JSON Schema output.
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// `response_format` asking the model for JSON matching `T`'s schema.
fn schema_format<T: JsonSchema>(name: &str) -> ResponseFormat {
    let schema = serde_json::to_value(schema_for!(T)).unwrap_or(serde_json::Value::Null);
    ResponseFormat {
        kind: "json_schema",
        json_schema: JsonSchemaFormat {
            name: name.to_string(),
            schema,
        },
    }
}

fn first_choice(response: ChatResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| LlmError::BadResponse("empty choices array".into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

/// A blocking client for an OpenAI-compatible chat-completions endpoint.
///
/// Construct once and reuse for every question.
pub struct LlmDriver {
    base_url: String,
    model: String,
    api_key: Option<Zeroizing<String>>,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for LlmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDriver")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .finish()
    }
}

impl LlmDriver {
    /// Create a new driver pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// and using `model` (e.g. `"llama3"`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.  An empty key
    /// is ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then(|| Zeroizing::new(key));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the request fails, or
    /// [`LlmError::BadResponse`] if the response shape is unexpected.
    pub fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.send(messages, None)
    }

    /// Like [`complete`][Self::complete], but asks the server to constrain
    /// the reply to the JSON Schema of `T`.
    ///
    /// # Errors
    ///
    /// Same as [`complete`][Self::complete].
    pub fn complete_structured<T: JsonSchema>(
        &self,
        schema_name: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        self.send(messages, Some(schema_format::<T>(schema_name)))
    }

    fn send(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            response_format,
        };
        debug!(%url, model = %self.model, messages = messages.len(), "chat completion");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.as_str());
        }
        let response: ChatResponse = request.send()?.error_for_status()?.json()?;
        first_choice(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Probe {
        answer: String,
    }

    #[test]
    fn chat_message_serializes_role() {
        let msg = ChatMessage::system("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"system\""));
    }

    #[test]
    fn chat_message_roundtrip() {
        let msg = ChatMessage::user("Where is my cup?");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::User);
        assert_eq!(back.content, "Where is my cup?");
    }

    #[test]
    fn plain_request_omits_response_format() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
            response_format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["model"], "llama3");
    }

    #[test]
    fn structured_request_carries_schema() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            stream: false,
            response_format: Some(schema_format::<Probe>("probe")),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], "probe");
        assert!(json["response_format"]["json_schema"]["schema"]
            .to_string()
            .contains("answer"));
    }

    #[test]
    fn first_choice_rejects_empty_response() {
        let err = first_choice(ChatResponse { choices: vec![] }).unwrap_err();
        assert!(matches!(err, LlmError::BadResponse(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let driver = LlmDriver::new("https://api.openai.com/", "gpt-4o").with_api_key("sk-secret");
        let debug = format!("{driver:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("https://api.openai.com\""));
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let driver = LlmDriver::new("http://localhost:11434", "llama3").with_api_key("");
        assert!(format!("{driver:?}").contains("<not set>"));
    }

    #[test]
    fn llm_error_maps_to_spotter_error() {
        let err: SpotterError = LlmError::BadResponse("nope".into()).into();
        assert!(matches!(err, SpotterError::LlmInferenceFailed(_)));
    }
}
