//! Configuration – reads/writes `~/.spotter/config.toml`.
//!
//! Resolution order: file (missing file ⇒ defaults), then `SPOTTER_*`
//! environment overrides, then [`Config::validate`].  Done once at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spotter_hal::{BaseBackend, RosbridgeSettings};
use spotter_runtime::RoutineConfig;
use spotter_scan::RotationController;
use spotter_types::{RotationRequest, SpotterError};
use zeroize::Zeroize;

/// Persisted configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base: BaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub routine: RoutineSettings,
    #[serde(default)]
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseConfig {
    #[serde(default)]
    pub backend: BaseBackend,
    #[serde(default)]
    pub rosbridge: RosbridgeSettings,
}

/// Chat model used to interpret questions, and its server.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` when empty.  Stored as plain text;
    /// the file is written owner-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Object classes a question may ask the robot to find.
    #[serde(default = "default_object_classes")]
    pub object_classes: Vec<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("attempts", &self.attempts)
            .field("object_classes", &self.object_classes)
            .finish()
    }
}

impl Drop for LlmConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            model: default_model(),
            api_key: String::new(),
            attempts: default_attempts(),
            object_classes: default_object_classes(),
        }
    }
}

/// External text-to-speech program; empty logs the text instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Type questions on stdin instead of recording them.
    #[serde(default = "default_true")]
    pub console: bool,
    /// ALSA capture device; empty uses the system default.
    #[serde(default)]
    pub device: String,
    #[serde(default = "default_record_seconds")]
    pub record_seconds: u32,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            console: true,
            device: String::new(),
            record_seconds: default_record_seconds(),
            transcription_model: default_transcription_model(),
        }
    }
}

/// External recogniser; empty uses the scripted simulator, which finds a
/// face on its `sim_face_after`-th check and any object on its
/// `sim_object_after`-th.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_sim_face_after")]
    pub sim_face_after: u32,
    #[serde(default = "default_sim_object_after")]
    pub sim_object_after: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            sim_face_after: default_sim_face_after(),
            sim_object_after: default_sim_object_after(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineSettings {
    #[serde(default = "default_face_rate")]
    pub face_rate: f64,
    #[serde(default = "default_turns")]
    pub face_turns: f64,
    #[serde(default = "default_object_rate")]
    pub object_rate: f64,
    #[serde(default = "default_turns")]
    pub object_turns: f64,
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,
    #[serde(default = "default_question_window_s")]
    pub question_window_s: u64,
    #[serde(default = "default_approach_x")]
    pub approach_x: f64,
    #[serde(default)]
    pub approach_y: f64,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for RoutineSettings {
    fn default() -> Self {
        Self {
            face_rate: default_face_rate(),
            face_turns: default_turns(),
            object_rate: default_object_rate(),
            object_turns: default_turns(),
            sampling_interval_ms: default_sampling_interval_ms(),
            question_window_s: default_question_window_s(),
            approach_x: default_approach_x(),
            approach_y: 0.0,
            pause_ms: default_pause_ms(),
        }
    }
}

impl RoutineSettings {
    pub fn routine_config(&self) -> RoutineConfig {
        RoutineConfig {
            face_scan: RotationRequest::new(
                self.face_rate,
                self.face_turns,
                self.sampling_interval_ms,
            ),
            object_scan: RotationRequest::new(
                self.object_rate,
                self.object_turns,
                self.sampling_interval_ms,
            ),
            question_window: Duration::from_secs(self.question_window_s),
            approach_x: self.approach_x,
            approach_y: self.approach_y,
            pause: Duration::from_millis(self.pause_ms),
        }
    }
}

/// Timings of the rotation controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Lifetime of each re-issued rotation command.
    #[serde(default = "default_command_ttl_ms")]
    pub command_ttl_ms: u64,
    #[serde(default = "default_stop_ttl_ms")]
    pub stop_ttl_ms: u64,
    /// Longest yield between re-issues; 0 spins without pausing.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            command_ttl_ms: default_command_ttl_ms(),
            stop_ttl_ms: default_stop_ttl_ms(),
            pace_ms: default_pace_ms(),
        }
    }
}

impl ScanSettings {
    pub fn controller(&self) -> RotationController {
        RotationController::new()
            .command_ttl(Duration::from_millis(self.command_ttl_ms))
            .stop_ttl(self.stop_ttl())
            .pace(Duration::from_millis(self.pace_ms))
    }

    pub fn stop_ttl(&self) -> Duration {
        Duration::from_millis(self.stop_ttl_ms)
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_attempts() -> u32 {
    2
}
fn default_object_classes() -> Vec<String> {
    ["cup", "bottle", "bowl", "book", "cell phone", "remote", "scissors", "teddy bear"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}
fn default_true() -> bool {
    true
}
fn default_record_seconds() -> u32 {
    7
}
fn default_transcription_model() -> String {
    "whisper-1".to_string()
}
fn default_sim_face_after() -> u32 {
    5
}
fn default_sim_object_after() -> u32 {
    8
}
fn default_face_rate() -> f64 {
    -0.5
}
fn default_object_rate() -> f64 {
    0.15
}
fn default_turns() -> f64 {
    2.0
}
fn default_sampling_interval_ms() -> u64 {
    200
}
fn default_question_window_s() -> u64 {
    60
}
fn default_approach_x() -> f64 {
    0.25
}
fn default_pause_ms() -> u64 {
    1000
}
fn default_command_ttl_ms() -> u64 {
    2000
}
fn default_stop_ttl_ms() -> u64 {
    100
}
fn default_pace_ms() -> u64 {
    20
}

impl Config {
    /// # Errors
    ///
    /// Returns [`SpotterError::InvalidParameter`] for scan parameters the
    /// controller would reject, or a pace that lets rotation commands expire
    /// between re-issues.
    pub fn validate(&self) -> Result<(), SpotterError> {
        self.routine.routine_config().validate()?;
        if self.scan.command_ttl_ms == 0 || self.scan.stop_ttl_ms == 0 {
            return Err(SpotterError::InvalidParameter(
                "scan command and stop TTLs must be positive".to_string(),
            ));
        }
        if self.scan.pace_ms >= self.scan.command_ttl_ms {
            return Err(SpotterError::InvalidParameter(format!(
                "scan pace ({} ms) must be shorter than the command TTL ({} ms)",
                self.scan.pace_ms, self.scan.command_ttl_ms
            )));
        }
        // rosbridge blocks on and then terminates any command shorter than
        // the watchdog, so a shorter keep-alive would stutter the scan.
        let watchdog_ms = self.base.rosbridge.cmd_vel_timeout_s * 1000.0;
        if self.base.backend == BaseBackend::Rosbridge
            && (self.scan.command_ttl_ms as f64) < watchdog_ms
        {
            return Err(SpotterError::InvalidParameter(format!(
                "scan command TTL ({} ms) must be at least the rosbridge cmd_vel timeout ({} ms)",
                self.scan.command_ttl_ms, watchdog_ms
            )));
        }
        if self.llm.object_classes.is_empty() {
            return Err(SpotterError::InvalidParameter(
                "llm.object_classes must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the path to `~/.spotter/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".spotter").join("config.toml")
}

/// Load, override and validate the configuration at [`config_path`].
pub fn load() -> Result<Config, SpotterError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Config, SpotterError> {
    let mut cfg = read_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Parse the file at `path`.  Returns `None` if it does not exist.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, SpotterError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SpotterError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| SpotterError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply environment overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SPOTTER_BACKEND` | `base.backend` (`sim` or `rosbridge`) |
/// | `SPOTTER_ROSBRIDGE_URL` | `base.rosbridge.url` |
/// | `SPOTTER_LLM_URL` | `llm.base_url` |
/// | `SPOTTER_MODEL` | `llm.model` |
/// | `OPENAI_API_KEY` | `llm.api_key`, only when the file leaves it empty |
/// | `SPOTTER_SPEECH_COMMAND` | `speech.command` |
/// | `SPOTTER_AUDIO_DEVICE` | `audio.device` |
/// | `SPOTTER_PACE_MS` | `scan.pace_ms` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SPOTTER_BACKEND") {
        match v.to_ascii_lowercase().as_str() {
            "sim" => cfg.base.backend = BaseBackend::Sim,
            "rosbridge" => cfg.base.backend = BaseBackend::Rosbridge,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("SPOTTER_ROSBRIDGE_URL") {
        cfg.base.rosbridge.url = v;
    }
    if let Ok(v) = std::env::var("SPOTTER_LLM_URL") {
        cfg.llm.base_url = v;
    }
    if let Ok(v) = std::env::var("SPOTTER_MODEL") {
        cfg.llm.model = v;
    }
    if cfg.llm.api_key.is_empty()
        && let Ok(v) = std::env::var("OPENAI_API_KEY")
    {
        cfg.llm.api_key = v;
    }
    if let Ok(v) = std::env::var("SPOTTER_SPEECH_COMMAND") {
        cfg.speech.command = v;
    }
    if let Ok(v) = std::env::var("SPOTTER_AUDIO_DEVICE") {
        cfg.audio.device = v;
    }
    if let Ok(v) = std::env::var("SPOTTER_PACE_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.scan.pace_ms = ms;
    }
}

/// Save the config to disk, creating `~/.spotter/` if necessary.
pub fn save(cfg: &Config) -> Result<(), SpotterError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), SpotterError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SpotterError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                SpotterError::Config(format!("failed to restrict {}: {e}", parent.display()))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SpotterError::Serialization(e.to_string()))?;
    let write_err = |e: std::io::Error| {
        SpotterError::Config(format!("failed to write {}: {e}", path.display()))
    };
    // Owner-only file (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
