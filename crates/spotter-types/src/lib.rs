use std::f64::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters of one rotational scan: spin at `rotation_rate` for
/// `turn_count` full turns, sampling every `sampling_interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationRequest {
    /// Signed angular velocity in rad/s (positive = counter-clockwise).
    pub rotation_rate: f64,
    /// Number of full turns the scan is budgeted for.
    pub turn_count: f64,
    /// Cadence at which the sampler is invoked.
    pub sampling_interval_ms: u64,
}

impl RotationRequest {
    pub fn new(rotation_rate: f64, turn_count: f64, sampling_interval_ms: u64) -> Self {
        Self {
            rotation_rate,
            turn_count,
            sampling_interval_ms,
        }
    }

    /// Check the request before anything is sent to the base.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::InvalidParameter`] for a zero or non-finite
    /// rate, a non-positive turn count, a zero sampling interval, or a
    /// scan too long to express as a [`Duration`].
    pub fn validate(&self) -> Result<(), SpotterError> {
        if !self.rotation_rate.is_finite() || self.rotation_rate == 0.0 {
            return Err(SpotterError::InvalidParameter(format!(
                "rotation_rate must be finite and non-zero, got {}",
                self.rotation_rate
            )));
        }
        if !self.turn_count.is_finite() || self.turn_count <= 0.0 {
            return Err(SpotterError::InvalidParameter(format!(
                "turn_count must be positive, got {}",
                self.turn_count
            )));
        }
        if self.sampling_interval_ms == 0 {
            return Err(SpotterError::InvalidParameter(
                "sampling_interval_ms must be positive".to_string(),
            ));
        }
        self.try_duration().map_err(|_| {
            SpotterError::InvalidParameter(format!(
                "{} turns at {} rad/s is too long a scan",
                self.turn_count, self.rotation_rate
            ))
        })?;
        Ok(())
    }

    /// Total scan time: `turn_count * 2π / |rotation_rate|`.
    ///
    /// Saturates at [`Duration::MAX`] for a request that failed
    /// [`validate`][Self::validate].
    pub fn duration(&self) -> Duration {
        self.try_duration().unwrap_or(Duration::MAX)
    }

    fn try_duration(&self) -> Result<Duration, std::time::TryFromFloatSecsError> {
        Duration::try_from_secs_f64(self.turn_count * TAU / self.rotation_rate.abs())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }
}

/// What a scan reports back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// `true` when the sampler asked to stop before the time budget ran out.
    pub stopped_early: bool,
    /// Time the base kept turning while the triggering sample was evaluated.
    pub overshoot_seconds: f64,
}

impl ScanResult {
    /// The counter-rotation that cancels the overshoot of a scan run at
    /// `rotation_rate`, or `None` when there is nothing to undo.
    pub fn corrective_command(&self, rotation_rate: f64) -> Option<VelocityCommand> {
        if !self.stopped_early || self.overshoot_seconds <= 0.0 {
            return None;
        }
        Some(VelocityCommand::rotate(-rotation_rate, self.overshoot_seconds))
    }
}

/// A timed body-velocity command.  The base only honours it for
/// `duration_s`; sustained motion requires re-issuing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub v_x: f64,
    pub v_y: f64,
    pub v_rot: f64,
    pub duration_s: f64,
}

impl VelocityCommand {
    /// Turn in place at `v_rot` rad/s.
    pub fn rotate(v_rot: f64, duration_s: f64) -> Self {
        Self {
            v_x: 0.0,
            v_y: 0.0,
            v_rot,
            duration_s,
        }
    }

    /// Zero-velocity command.
    pub fn stop(duration_s: f64) -> Self {
        Self::rotate(0.0, duration_s)
    }

    pub fn is_stop(&self) -> bool {
        self.v_x == 0.0 && self.v_y == 0.0 && self.v_rot == 0.0
    }
}

/// A sequence of head orientations (radians) visited in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaws: Vec<f64>,
    pub pitches: Vec<f64>,
    pub rolls: Vec<f64>,
    /// Pause after each point has been reached.
    pub settle_s: f64,
}

impl HeadPose {
    /// Two-point pose that tilts the head to `pitch` and back to level.
    pub fn pitch_and_back(pitch: f64) -> Self {
        Self {
            yaws: vec![0.0, 0.0],
            pitches: vec![pitch, 0.0],
            rolls: vec![0.0, 0.0],
            settle_s: 0.0,
        }
    }

    /// Level head.
    pub fn neutral() -> Self {
        Self::pitch_and_back(0.0)
    }

    pub fn len(&self) -> usize {
        self.yaws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.yaws.is_empty()
    }

    /// Iterate the `(yaw, pitch, roll)` points.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.yaws
            .iter()
            .zip(&self.pitches)
            .zip(&self.rolls)
            .map(|((y, p), r)| (*y, *p, *r))
    }

    /// # Errors
    ///
    /// Returns [`SpotterError::InvalidParameter`] when the three point lists
    /// differ in length or are empty.
    pub fn validate(&self) -> Result<(), SpotterError> {
        if self.yaws.is_empty() {
            return Err(SpotterError::InvalidParameter(
                "head pose needs at least one point".to_string(),
            ));
        }
        if self.yaws.len() != self.pitches.len() || self.yaws.len() != self.rolls.len() {
            return Err(SpotterError::InvalidParameter(format!(
                "head pose lists differ in length: yaws={} pitches={} rolls={}",
                self.yaws.len(),
                self.pitches.len(),
                self.rolls.len()
            )));
        }
        Ok(())
    }
}

/// One command as it was handed to a mobile base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum BaseCommand {
    Velocity(VelocityCommand),
    Goal { x: f64, y: f64 },
    Head(HeadPose),
}

/// Workspace-wide error type covering parameter checks, sampler and hardware
/// failures, and the orchestration collaborators.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum SpotterError {
    #[error("Invalid Parameter: {0}")]
    InvalidParameter(String),

    #[error("Sampler Failure: {0}")]
    SamplerFailure(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("LLM Driver Error: {0}")]
    LlmInferenceFailed(String),

    #[error("Speech Error: {0}")]
    Speech(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl SpotterError {
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        SpotterError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_matches_turns_over_rate() {
        let req = RotationRequest::new(-0.5, 2.0, 200);
        let expected = 2.0 * TAU / 0.5;
        assert!((req.duration().as_secs_f64() - expected).abs() < 1e-9);
        assert!((req.duration().as_secs_f64() - 25.1327).abs() < 1e-3);
    }

    #[test]
    fn duration_ignores_rotation_direction() {
        let cw = RotationRequest::new(-0.15, 1.5, 100);
        let ccw = RotationRequest::new(0.15, 1.5, 100);
        assert_eq!(cw.duration(), ccw.duration());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let err = RotationRequest::new(0.0, 2.0, 200).validate().unwrap_err();
        assert!(matches!(err, SpotterError::InvalidParameter(_)));
    }

    #[test]
    fn overlong_scan_is_rejected() {
        for req in [
            RotationRequest::new(1e-300, 1.0, 200),
            RotationRequest::new(0.5, 1e300, 200),
        ] {
            let err = req.validate().unwrap_err();
            assert!(matches!(err, SpotterError::InvalidParameter(_)), "{req:?}");
            assert_eq!(req.duration(), Duration::MAX);
        }
    }

    #[test]
    fn non_finite_rate_is_rejected() {
        assert!(RotationRequest::new(f64::NAN, 2.0, 200).validate().is_err());
        assert!(RotationRequest::new(f64::INFINITY, 2.0, 200).validate().is_err());
    }

    #[test]
    fn non_positive_turns_are_rejected() {
        assert!(RotationRequest::new(0.5, 0.0, 200).validate().is_err());
        assert!(RotationRequest::new(0.5, -1.0, 200).validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(RotationRequest::new(0.5, 1.0, 0).validate().is_err());
    }

    #[test]
    fn corrective_command_reverses_rate() {
        let result = ScanResult {
            stopped_early: true,
            overshoot_seconds: 0.05,
        };
        let cmd = result.corrective_command(0.15).unwrap();
        assert!((cmd.v_rot + 0.15).abs() < f64::EPSILON);
        assert!((cmd.duration_s - 0.05).abs() < f64::EPSILON);
        assert_eq!(cmd.v_x, 0.0);
    }

    #[test]
    fn no_correction_without_early_stop() {
        assert!(ScanResult::default().corrective_command(0.5).is_none());
        let zero = ScanResult {
            stopped_early: true,
            overshoot_seconds: 0.0,
        };
        assert!(zero.corrective_command(0.5).is_none());
    }

    #[test]
    fn head_pose_validation() {
        assert!(HeadPose::pitch_and_back(0.18).validate().is_ok());
        let ragged = HeadPose {
            yaws: vec![0.0],
            pitches: vec![0.0, 0.1],
            rolls: vec![0.0],
            settle_s: 0.0,
        };
        assert!(ragged.validate().is_err());
    }

    #[test]
    fn base_command_serializes_tagged() {
        let cmd = BaseCommand::Goal { x: 0.25, y: 0.0 };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"kind\":\"Goal\""));
        let back: BaseCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn spotter_error_display() {
        let err = SpotterError::hardware("spot", "lease lost");
        assert!(err.to_string().contains("spot"));
        assert!(err.to_string().contains("lease lost"));
    }
}
