//! Generic `MobileBase` trait for the robot body.
//!
//! The scan controller and the interaction routine only ever hold a
//! `&mut dyn MobileBase`, so a simulated base and a live one are
//! interchangeable.

use spotter_types::{HeadPose, SpotterError, VelocityCommand};

/// The command surface of a mobile robot base.
///
/// All commands are fire-and-forget.  A [`VelocityCommand`] is only valid for
/// its own `duration_s`; callers that want sustained motion must re-issue it
/// before it lapses.
pub trait MobileBase: Send {
    /// Stable identifier for this base, e.g. `"spot"` or `"sim"`.
    fn id(&self) -> &str;

    /// Command a body velocity for a bounded time.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the base rejects the
    /// command or the link to it is down.
    fn send_velocity(&mut self, command: VelocityCommand) -> Result<(), SpotterError>;

    /// Walk to `(x, y)` metres in the body frame.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the goal cannot be sent.
    fn move_to_goal(&mut self, x: f64, y: f64) -> Result<(), SpotterError>;

    /// Move the head (body orientation) through the points of `pose`.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::InvalidParameter`] for a malformed pose and
    /// [`SpotterError::HardwareFault`] if a point cannot be sent.
    fn move_head(&mut self, pose: &HeadPose) -> Result<(), SpotterError>;
}

impl<B: MobileBase + ?Sized> MobileBase for Box<B> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn send_velocity(&mut self, command: VelocityCommand) -> Result<(), SpotterError> {
        (**self).send_velocity(command)
    }

    fn move_to_goal(&mut self, x: f64, y: f64) -> Result<(), SpotterError> {
        (**self).move_to_goal(x, y)
    }

    fn move_head(&mut self, pose: &HeadPose) -> Result<(), SpotterError> {
        (**self).move_head(pose)
    }
}
