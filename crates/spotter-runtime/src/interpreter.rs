//! Turning a spoken question into an answer and, optionally, an object to
//! look for.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use spotter_types::SpotterError;
use tracing::{debug, warn};

use crate::llm_driver::{ChatMessage, LlmDriver, LlmError};

/// Spoken when the model never produced a usable reply.
pub const FALLBACK_ANSWER: &str = "Sorry, I did not understand that. Could you ask me again?";

/// Structured reply to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssistantReply {
    /// What the robot says back.
    pub answer: String,
    /// Object class the person asked the robot to find, if any.
    #[serde(default)]
    pub object_class_to_find: Option<String>,
}

impl AssistantReply {
    pub fn fallback() -> Self {
        Self {
            answer: FALLBACK_ANSWER.to_string(),
            object_class_to_find: None,
        }
    }
}

/// Something that can answer questions.
pub trait Assistant {
    /// # Errors
    ///
    /// Returns [`SpotterError::LlmInferenceFailed`] when the model server
    /// cannot be reached.
    fn interpret(&mut self, question: &str) -> Result<AssistantReply, SpotterError>;
}

/// [`Assistant`] backed by an [`LlmDriver`], restricted to a fixed list of
/// findable object classes.
#[derive(Debug)]
pub struct QuestionInterpreter {
    driver: LlmDriver,
    classes: Vec<String>,
    attempts: u32,
}

impl QuestionInterpreter {
    pub fn new(driver: LlmDriver, classes: Vec<String>) -> Self {
        Self {
            driver,
            classes,
            attempts: 2,
        }
    }

    /// How many times to ask before falling back (at least once).
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    fn messages(&self, question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(system_prompt(&self.classes)),
            ChatMessage::user(question),
        ]
    }
}

impl Assistant for QuestionInterpreter {
    fn interpret(&mut self, question: &str) -> Result<AssistantReply, SpotterError> {
        let messages = self.messages(question);
        for attempt in 1..=self.attempts {
            let raw = self
                .driver
                .complete_structured::<AssistantReply>("assistant_reply", &messages)?;
            match parse_reply(&raw, &self.classes) {
                Ok(reply) => {
                    debug!(attempt, object = ?reply.object_class_to_find, "question interpreted");
                    return Ok(reply);
                }
                Err(e) => warn!(attempt, error = %e, "unusable model reply"),
            }
        }
        Ok(AssistantReply::fallback())
    }
}

fn system_prompt(classes: &[String]) -> String {
    format!(
        "You are a friendly four-legged robot talking to a person.\n\
         Answer the question briefly in one or two spoken sentences.\n\
         If the person wants you to find or bring an object, set \
         \"object_class_to_find\" to exactly one of: {}. Otherwise set it to null.\n\
         Reply with a JSON object with the keys \"answer\" and \"object_class_to_find\".",
        classes.join(", ")
    )
}

/// Parse a model reply, tolerating a Markdown code fence around the JSON.
///
/// The object class is matched case-insensitively against `classes` and
/// normalised to the listed spelling; an empty or unknown class becomes
/// `None`.
pub fn parse_reply(raw: &str, classes: &[String]) -> Result<AssistantReply, LlmError> {
    let body = strip_fence(raw);
    let mut reply: AssistantReply =
        serde_json::from_str(body).map_err(|e| LlmError::BadResponse(e.to_string()))?;
    if reply.answer.trim().is_empty() {
        return Err(LlmError::BadResponse("empty answer".into()));
    }
    reply.object_class_to_find = reply.object_class_to_find.and_then(|wanted| {
        let wanted = wanted.trim();
        if wanted.is_empty() {
            return None;
        }
        let known = classes.iter().find(|c| c.eq_ignore_ascii_case(wanted)).cloned();
        if known.is_none() {
            warn!(class = wanted, "model asked for an unknown object class");
        }
        known
    });
    Ok(reply)
}

fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}
