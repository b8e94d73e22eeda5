//! `spotter-runtime` – the interaction routine and the collaborators it talks
//! through.
//!
//! # Modules
//!
//! - [`routine`] – [`InteractionRoutine`][routine::InteractionRoutine]: boot,
//!   greet, scan for a person, answer questions, fetch objects.
//! - [`detector`] – [`Detector`][detector::Detector] implementations used as
//!   scan samplers: camera + classifier, external recogniser, scripted.
//! - [`interpreter`] – [`QuestionInterpreter`][interpreter::QuestionInterpreter]:
//!   question → `{answer, object_class_to_find}` via the LLM.
//! - [`llm_driver`] – [`LlmDriver`][llm_driver::LlmDriver]: blocking
//!   OpenAI-compatible chat-completions client.
//! - [`listener`] – console and microphone question sources.
//! - [`speech`] – external TTS program or log-only speaker.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber with optional OTLP export.

pub mod detector;
pub mod interpreter;
pub mod listener;
pub mod llm_driver;
pub mod routine;
pub mod speech;
pub mod telemetry;

pub use detector::{CommandDetector, Detector, FrameClassifier, FrameDetector, ScriptedDetector};
pub use interpreter::{Assistant, AssistantReply, QuestionInterpreter};
pub use listener::{ConsoleListener, Listener, RecordingListener, Transcriber};
pub use llm_driver::{ChatMessage, LlmDriver, LlmError, Role};
pub use routine::{InteractionRoutine, Robot, RoutineConfig, RoutineOutcome};
pub use speech::{CommandSpeaker, LogSpeaker, Speaker};
pub use telemetry::{TracerProviderGuard, init_tracing};
