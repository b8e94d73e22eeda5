//! Listening for a question.
//!
//! [`ConsoleListener`] reads typed lines, which is what the simulator uses.
//! [`RecordingListener`] records a short clip with `arecord` and sends it to
//! an OpenAI-compatible transcription endpoint.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use spotter_types::SpotterError;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Source of spoken or typed questions.
pub trait Listener {
    /// Wait for the next question.
    ///
    /// Returns `Ok(None)` once the input is closed; no further questions
    /// will arrive.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the input device fails, or
    /// [`SpotterError::LlmInferenceFailed`] if transcription fails.
    fn listen(&mut self) -> Result<Option<String>, SpotterError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Console
// ─────────────────────────────────────────────────────────────────────────────

/// Reads one question per line from any buffered reader (stdin in the CLI).
#[derive(Debug)]
pub struct ConsoleListener<R> {
    reader: R,
}

impl<R: BufRead> ConsoleListener<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Listener for ConsoleListener<R> {
    fn listen(&mut self) -> Result<Option<String>, SpotterError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| SpotterError::hardware("console", e.to_string()))?;
        if read == 0 {
            debug!("console input closed");
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Microphone + transcription
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Transcription {
    text: String,
}

/// Blocking client for `/v1/audio/transcriptions`.
pub struct Transcriber {
    base_url: String,
    model: String,
    api_key: Option<Zeroizing<String>>,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcriber")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .finish()
    }
}

impl Transcriber {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// An empty key is ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then(|| Zeroizing::new(key));
        self
    }

    /// Upload the audio file at `path` and return its transcript.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the clip cannot be read and
    /// [`SpotterError::LlmInferenceFailed`] if the request fails.
    pub fn transcribe(&self, path: &Path) -> Result<String, SpotterError> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        let form = reqwest::blocking::multipart::Form::new()
            .text("model", self.model.clone())
            .file("file", path)
            .map_err(|e| SpotterError::hardware("microphone", format!("{}: {e}", path.display())))?;
        debug!(%url, model = %self.model, "transcribing clip");

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.as_str());
        }
        let transcription: Transcription = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| SpotterError::LlmInferenceFailed(format!("transcription: {e}")))?;
        Ok(transcription.text.trim().to_string())
    }
}

/// Records a fixed-length mono clip with `arecord`, then transcribes it.
#[derive(Debug)]
pub struct RecordingListener {
    recorder: String,
    device: Option<String>,
    seconds: u32,
    clip: PathBuf,
    transcriber: Transcriber,
}

impl RecordingListener {
    pub fn new(transcriber: Transcriber, seconds: u32) -> Self {
        Self {
            recorder: "arecord".to_string(),
            device: None,
            seconds: seconds.max(1),
            clip: std::env::temp_dir().join("spotter-question.wav"),
            transcriber,
        }
    }

    /// ALSA capture device, e.g. `"plughw:1,0"`.
    pub fn device(mut self, device: impl Into<String>) -> Self {
        let device = device.into();
        self.device = (!device.is_empty()).then_some(device);
        self
    }

    pub fn clip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.clip = path.into();
        self
    }

    fn recorder_args(&self) -> Vec<String> {
        let mut args = vec!["-vv".to_string(), "--format=cd".to_string()];
        if let Some(device) = &self.device {
            args.push(format!("--device={device}"));
        }
        args.extend([
            "-r".to_string(),
            "48000".to_string(),
            format!("--duration={}", self.seconds),
            "-c".to_string(),
            "1".to_string(),
            self.clip.display().to_string(),
        ]);
        args
    }

    fn record(&self) -> Result<(), SpotterError> {
        info!(seconds = self.seconds, "recording question");
        let status = Command::new(&self.recorder)
            .args(self.recorder_args())
            .status()
            .map_err(|e| SpotterError::hardware("microphone", format!("{}: {e}", self.recorder)))?;
        if !status.success() {
            return Err(SpotterError::hardware(
                "microphone",
                format!("{} exited with {status}", self.recorder),
            ));
        }
        Ok(())
    }
}

impl Listener for RecordingListener {
    fn listen(&mut self) -> Result<Option<String>, SpotterError> {
        self.record()?;
        let text = self.transcriber.transcribe(&self.clip)?;
        info!(%text, "heard");
        Ok(Some(text))
    }
}
