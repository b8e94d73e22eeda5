//! `spotter-hal` – hardware abstraction for the robot body.
//!
//! # Modules
//!
//! - [`mobile_base`] – [`MobileBase`][mobile_base::MobileBase]: the
//!   capability set of the legged base (timed velocity commands, positioning
//!   goals, head poses).  Everything above this crate talks to the trait only.
//! - [`camera`] – [`Camera`][camera::Camera] and
//!   [`CameraFrame`][camera::CameraFrame].
//! - [`sim`] – [`SimBase`][sim::SimBase] and [`SimCamera`][sim::SimCamera]:
//!   no-op stand-ins that record what they were asked to do.
//! - [`rosbridge`] – [`RosbridgeBase`][rosbridge::RosbridgeBase]: drives a
//!   physical robot by publishing ROS 2 messages over a rosbridge WebSocket.
//! - [`backend`] – [`open_base`][backend::open_base]: picks one of the above
//!   once at startup.

pub mod backend;
pub mod camera;
pub mod mobile_base;
pub mod rosbridge;
pub mod sim;

pub use backend::{BaseBackend, RosbridgeSettings, open_base};
pub use camera::{Camera, CameraFrame};
pub use mobile_base::MobileBase;
pub use rosbridge::RosbridgeBase;
pub use sim::{CommandLog, SimBase, SimCamera};
