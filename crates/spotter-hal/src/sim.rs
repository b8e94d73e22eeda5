//! In-process simulation drivers for running without a robot.
//!
//! [`SimBase`] accepts every command, logs it at `debug` level and appends it
//! to a shared [`CommandLog`].  [`SimCamera`] returns blank frames.  This lets
//! the whole routine run on a laptop or in CI.
//!
//! # Example
//!
//! ```rust
//! use spotter_hal::{MobileBase, SimBase};
//! use spotter_types::{BaseCommand, VelocityCommand};
//!
//! let mut base = SimBase::new();
//! let log = base.log();
//!
//! base.send_velocity(VelocityCommand::rotate(0.5, 2.0)).unwrap();
//! base.move_to_goal(0.25, 0.0).unwrap();
//!
//! assert_eq!(log.len(), 2);
//! assert!(matches!(log.last(), Some(BaseCommand::Goal { .. })));
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use spotter_types::{BaseCommand, HeadPose, SpotterError, VelocityCommand};
use tracing::debug;

use crate::camera::{Camera, CameraFrame};
use crate::mobile_base::MobileBase;

// ────────────────────────────────────────────────────────────────────────────
// Command log
// ────────────────────────────────────────────────────────────────────────────

/// Shared, cloneable record of the commands a [`SimBase`] received.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: Arc<Mutex<Vec<BaseCommand>>>,
}

impl CommandLog {
    fn lock(&self) -> MutexGuard<'_, Vec<BaseCommand>> {
        // A poisoned log only means a test panicked mid-push; the data is
        // still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, command: BaseCommand) {
        self.lock().push(command);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every recorded command, oldest first.
    pub fn snapshot(&self) -> Vec<BaseCommand> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<BaseCommand> {
        self.lock().last().cloned()
    }

    /// Only the velocity commands, oldest first.
    pub fn velocities(&self) -> Vec<VelocityCommand> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                BaseCommand::Velocity(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Number of zero-velocity commands recorded.
    pub fn stop_count(&self) -> usize {
        self.velocities().iter().filter(|v| v.is_stop()).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated base
// ────────────────────────────────────────────────────────────────────────────

/// A no-op mobile base.  Every call succeeds and is recorded.
#[derive(Debug, Default)]
pub struct SimBase {
    log: CommandLog,
}

impl SimBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the command log; stays valid after the base is boxed.
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl MobileBase for SimBase {
    fn id(&self) -> &str {
        "sim"
    }

    fn send_velocity(&mut self, command: VelocityCommand) -> Result<(), SpotterError> {
        debug!(
            v_x = command.v_x,
            v_y = command.v_y,
            v_rot = command.v_rot,
            duration_s = command.duration_s,
            "sim base: velocity"
        );
        self.log.push(BaseCommand::Velocity(command));
        Ok(())
    }

    fn move_to_goal(&mut self, x: f64, y: f64) -> Result<(), SpotterError> {
        debug!(x, y, "sim base: goal");
        self.log.push(BaseCommand::Goal { x, y });
        Ok(())
    }

    fn move_head(&mut self, pose: &HeadPose) -> Result<(), SpotterError> {
        pose.validate()?;
        debug!(points = pose.len(), "sim base: head pose");
        self.log.push(BaseCommand::Head(pose.clone()));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera that returns a blank (all-zero) 4×4 greyscale frame.
/// Always succeeds.
#[derive(Debug)]
pub struct SimCamera {
    id: String,
    captured: u64,
}

impl SimCamera {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            captured: 0,
        }
    }

    /// Number of frames handed out so far.
    pub fn captured(&self) -> u64 {
        self.captured
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, SpotterError> {
        self.captured += 1;
        Ok(CameraFrame {
            width: 4,
            height: 4,
            data: vec![0u8; 16],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_base_records_commands_in_order() {
        let mut base = SimBase::new();
        let log = base.log();

        base.send_velocity(VelocityCommand::rotate(-0.5, 2.0)).unwrap();
        base.send_velocity(VelocityCommand::stop(0.1)).unwrap();
        base.move_head(&HeadPose::pitch_and_back(0.18)).unwrap();

        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0], BaseCommand::Velocity(v) if v.v_rot == -0.5));
        assert!(matches!(entries[2], BaseCommand::Head(_)));
        assert_eq!(log.stop_count(), 1);
    }

    #[test]
    fn sim_base_log_survives_boxing() {
        let base = SimBase::new();
        let log = base.log();
        let mut boxed: Box<dyn MobileBase> = Box::new(base);
        boxed.move_to_goal(1.0, 2.0).unwrap();
        assert_eq!(log.last(), Some(BaseCommand::Goal { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn sim_base_rejects_malformed_pose() {
        let mut base = SimBase::new();
        let pose = HeadPose {
            yaws: vec![0.0, 0.0],
            pitches: vec![0.1],
            rolls: vec![0.0, 0.0],
            settle_s: 0.0,
        };
        assert!(base.move_head(&pose).is_err());
        assert!(base.log().is_empty());
    }

    #[test]
    fn log_clear_empties_entries() {
        let mut base = SimBase::new();
        let log = base.log();
        base.send_velocity(VelocityCommand::stop(0.1)).unwrap();
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn sim_camera_counts_captures() {
        let mut cam = SimCamera::new("webcam0");
        let frame = cam.capture().unwrap();
        cam.capture().unwrap();
        assert_eq!(frame.data.len(), 16);
        assert_eq!(cam.captured(), 2);
    }
}
