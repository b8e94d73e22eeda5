//! "Is the thing I am looking for in view right now?"
//!
//! A [`Detector`] answers that question for a named target (`"face"` or an
//! object class).  During a scan the routine wraps it in a closure and hands
//! it to the rotation controller as its sampler, so a detector's running time
//! is exactly the overshoot the controller measures.
//!
//! The `spotter` binary picks a [`CommandDetector`] when a recogniser
//! command is configured and a [`ScriptedDetector`] otherwise.
//! [`FrameDetector`] is the seam for embedding programs that bring their own
//! [`Camera`] and an in-process classifier:
//!
//! ```rust
//! use spotter_hal::{CameraFrame, SimCamera};
//! use spotter_runtime::detector::{Detector, FrameDetector, FACE};
//! use spotter_types::SpotterError;
//!
//! let classifier = |frame: &CameraFrame, target: &str| -> Result<bool, SpotterError> {
//!     Ok(target == FACE && !frame.data.is_empty())
//! };
//! let mut detector = FrameDetector::new(SimCamera::new("webcam0"), classifier);
//! let detector: &mut dyn Detector = &mut detector;
//! assert!(detector.detect(FACE).unwrap());
//! assert!(!detector.detect("cup").unwrap());
//! ```

use std::collections::HashMap;
use std::process::Command;

use spotter_hal::{Camera, CameraFrame};
use spotter_types::SpotterError;
use tracing::debug;

/// Target name used when looking for a person.
pub const FACE: &str = "face";

/// Recognises targets in the robot's current view.
pub trait Detector {
    /// # Errors
    ///
    /// Returns [`SpotterError::SamplerFailure`] or
    /// [`SpotterError::HardwareFault`] when no verdict could be reached.
    fn detect(&mut self, target: &str) -> Result<bool, SpotterError>;
}

/// Decides whether a single frame shows `target`.
pub trait FrameClassifier {
    fn classify(&mut self, frame: &CameraFrame, target: &str) -> Result<bool, SpotterError>;
}

impl<F> FrameClassifier for F
where
    F: FnMut(&CameraFrame, &str) -> Result<bool, SpotterError>,
{
    fn classify(&mut self, frame: &CameraFrame, target: &str) -> Result<bool, SpotterError> {
        self(frame, target)
    }
}

/// [`Detector`] that pulls frames from a [`Camera`] and classifies the
/// freshest one.
///
/// Capture devices queue frames, so the detector reads several and keeps
/// only the last.  One read is enough for faces; objects are checked after
/// flushing ten.
pub struct FrameDetector<C, F> {
    camera: C,
    classifier: F,
    face_reads: usize,
    object_reads: usize,
}

impl<C: Camera, F: FrameClassifier> FrameDetector<C, F> {
    pub fn new(camera: C, classifier: F) -> Self {
        Self {
            camera,
            classifier,
            face_reads: 1,
            object_reads: 10,
        }
    }

    /// Frames read per face check and per object check (each at least one).
    pub fn reads(mut self, face: usize, object: usize) -> Self {
        self.face_reads = face.max(1);
        self.object_reads = object.max(1);
        self
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    fn freshest_frame(&mut self, reads: usize) -> Result<CameraFrame, SpotterError> {
        let mut frame = self.camera.capture()?;
        for _ in 1..reads {
            frame = self.camera.capture()?;
        }
        Ok(frame)
    }
}

impl<C: Camera, F: FrameClassifier> Detector for FrameDetector<C, F> {
    fn detect(&mut self, target: &str) -> Result<bool, SpotterError> {
        let reads = if target == FACE {
            self.face_reads
        } else {
            self.object_reads
        };
        let frame = self.freshest_frame(reads)?;
        let found = self.classifier.classify(&frame, target)?;
        debug!(camera = self.camera.id(), target, found, "frame classified");
        Ok(found)
    }
}

/// [`Detector`] that delegates to an external recogniser program.
///
/// Every `{target}` in the argument list is replaced by the target name.
/// Exit status 0 means found, 1 means not found; anything else is a
/// failure.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// # Errors
    ///
    /// Returns [`SpotterError::Config`] for an empty command line.
    pub fn from_command_line(line: &str) -> Result<Self, SpotterError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SpotterError::Config("detector command is empty".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn args_for(&self, target: &str) -> Vec<String> {
        self.args.iter().map(|a| a.replace("{target}", target)).collect()
    }
}

impl Detector for CommandDetector {
    fn detect(&mut self, target: &str) -> Result<bool, SpotterError> {
        let status = Command::new(&self.program)
            .args(self.args_for(target))
            .status()
            .map_err(|e| SpotterError::SamplerFailure(format!("{}: {e}", self.program)))?;
        match status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(SpotterError::SamplerFailure(format!(
                "{} exited with {status}",
                self.program
            ))),
        }
    }
}

/// Simulated detector: each target reports found on its N-th check.
/// Targets without a script are never found.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    fire_after: HashMap<String, u32>,
    checks: HashMap<String, u32>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `target` as found from its `checks`-th detection onwards.
    pub fn fire_after(mut self, target: impl Into<String>, checks: u32) -> Self {
        self.fire_after.insert(target.into(), checks.max(1));
        self
    }

    /// How often `target` has been checked.
    pub fn checks(&self, target: &str) -> u32 {
        self.checks.get(target).copied().unwrap_or(0)
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, target: &str) -> Result<bool, SpotterError> {
        let count = self.checks.entry(target.to_string()).or_insert(0);
        *count += 1;
        Ok(self.fire_after.get(target).is_some_and(|n| *count >= *n))
    }
}
