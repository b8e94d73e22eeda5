//! Spoken output.

use std::process::Command;

use spotter_types::SpotterError;
use tracing::{debug, info};

/// Anything that can say a sentence out loud.
pub trait Speaker {
    /// Speak `text`, returning once it has been handed off.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::Speech`] if the text could not be spoken.
    fn say(&mut self, text: &str) -> Result<(), SpotterError>;
}

/// Runs an external text-to-speech program with the text as its final
/// argument, e.g. `espeak -a 200 "<text>"`.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line such as
    /// `"espeak -a 200"`.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::Config`] for an empty command line.
    pub fn from_command_line(line: &str) -> Result<Self, SpotterError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SpotterError::Config("speech command is empty".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(text);
        cmd
    }
}

impl Speaker for CommandSpeaker {
    fn say(&mut self, text: &str) -> Result<(), SpotterError> {
        info!(%text, "speaking");
        let status = self
            .command(text)
            .status()
            .map_err(|e| SpotterError::Speech(format!("{}: {e}", self.program)))?;
        if !status.success() {
            return Err(SpotterError::Speech(format!(
                "{} exited with {status}",
                self.program
            )));
        }
        Ok(())
    }
}

/// Logs instead of speaking and keeps every line for later inspection.
#[derive(Debug, Default)]
pub struct LogSpeaker {
    lines: Vec<String>,
}

impl LogSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Speaker for LogSpeaker {
    fn say(&mut self, text: &str) -> Result<(), SpotterError> {
        info!(%text, "robot says");
        debug!(line = self.lines.len(), "speech logged");
        self.lines.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_is_split_and_text_appended() {
        let speaker = CommandSpeaker::from_command_line("espeak -a 200").unwrap();
        let cmd = speaker.command("Hello there");
        assert_eq!(cmd.get_program(), "espeak");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-a", "200", "Hello there"]);
    }

    #[test]
    fn empty_command_line_is_rejected() {
        let err = CommandSpeaker::from_command_line("   ").unwrap_err();
        assert!(matches!(err, SpotterError::Config(_)));
    }

    #[test]
    fn missing_program_is_a_speech_error() {
        let mut speaker = CommandSpeaker::new("definitely-not-a-tts-binary-8c1f", vec![]);
        let err = speaker.say("hi").unwrap_err();
        assert!(matches!(err, SpotterError::Speech(_)));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_speech_error() {
        let mut speaker = CommandSpeaker::new("false", vec![]);
        assert!(matches!(speaker.say("hi"), Err(SpotterError::Speech(_))));
        let mut speaker = CommandSpeaker::new("true", vec![]);
        assert!(speaker.say("hi").is_ok());
    }

    #[test]
    fn log_speaker_keeps_lines_in_order() {
        let mut speaker = LogSpeaker::new();
        speaker.say("one").unwrap();
        speaker.say("two").unwrap();
        assert_eq!(speaker.lines(), ["one", "two"]);
    }
}
