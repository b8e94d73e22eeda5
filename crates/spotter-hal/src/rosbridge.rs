//! Live mobile base driven over a rosbridge WebSocket.
//!
//! Commands are translated into ROS 2 messages and published as rosbridge
//! JSON frames:
//!
//! * velocity – `geometry_msgs/msg/Twist` on the `/cmd_vel` topic,
//! * positioning goal – `geometry_msgs/msg/PoseStamped`,
//! * head pose – one `geometry_msgs/msg/Pose` per point on the body-pose
//!   topic.
//!
//! The robot driver stops on its own when `/cmd_vel` goes quiet for
//! `cmd_vel_timeout_s`; commands shorter than that are terminated here with
//! an explicit zero twist.

use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use spotter_types::{HeadPose, SpotterError, VelocityCommand};
use tracing::{debug, info};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::backend::RosbridgeSettings;
use crate::mobile_base::MobileBase;

const TWIST_TYPE: &str = "geometry_msgs/msg/Twist";
const POSE_STAMPED_TYPE: &str = "geometry_msgs/msg/PoseStamped";
const POSE_TYPE: &str = "geometry_msgs/msg/Pose";

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound side of a rosbridge connection.
pub trait FrameSink: Send {
    /// Send one serialized rosbridge frame.
    fn send_frame(&mut self, frame: String) -> Result<(), SpotterError>;
}

/// [`FrameSink`] over a blocking tungstenite WebSocket.
pub struct WebSocketSink {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl FrameSink for WebSocketSink {
    fn send_frame(&mut self, frame: String) -> Result<(), SpotterError> {
        self.socket
            .send(Message::text(frame))
            .map_err(|e| SpotterError::hardware("rosbridge", e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame builders
// ─────────────────────────────────────────────────────────────────────────────

fn advertise_frame(topic: &str, msg_type: &str) -> Value {
    json!({ "op": "advertise", "topic": topic, "type": msg_type })
}

fn publish_frame(topic: &str, msg: Value) -> Value {
    json!({ "op": "publish", "topic": topic, "msg": msg })
}

fn twist_msg(command: &VelocityCommand) -> Value {
    json!({
        "linear":  { "x": command.v_x, "y": command.v_y, "z": 0.0 },
        "angular": { "x": 0.0, "y": 0.0, "z": command.v_rot }
    })
}

fn goal_msg(frame_id: &str, x: f64, y: f64) -> Value {
    json!({
        "header": { "frame_id": frame_id },
        "pose": {
            "position": { "x": x, "y": y, "z": 0.0 },
            "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
        }
    })
}

/// Quaternion `(x, y, z, w)` for a ZYX (yaw, pitch, roll) rotation.
fn quaternion(yaw: f64, pitch: f64, roll: f64) -> (f64, f64, f64, f64) {
    let (sy, cy) = (yaw * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sr, cr) = (roll * 0.5).sin_cos();
    (
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    )
}

fn body_pose_msg(yaw: f64, pitch: f64, roll: f64) -> Value {
    let (x, y, z, w) = quaternion(yaw, pitch, roll);
    json!({
        "position": { "x": 0.0, "y": 0.0, "z": 0.0 },
        "orientation": { "x": x, "y": y, "z": z, "w": w }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// RosbridgeBase
// ─────────────────────────────────────────────────────────────────────────────

/// A physical robot reached through rosbridge.
pub struct RosbridgeBase<S: FrameSink = WebSocketSink> {
    sink: S,
    settings: RosbridgeSettings,
}

impl RosbridgeBase<WebSocketSink> {
    /// Open the WebSocket at `settings.url` and advertise the command topics.
    ///
    /// # Errors
    ///
    /// Returns [`SpotterError::HardwareFault`] if the handshake fails.
    pub fn connect(settings: RosbridgeSettings) -> Result<Self, SpotterError> {
        let (socket, _response) = tungstenite::connect(settings.url.as_str())
            .map_err(|e| SpotterError::hardware("rosbridge", format!("{}: {e}", settings.url)))?;
        info!(url = %settings.url, "connected to rosbridge");
        Self::with_sink(WebSocketSink { socket }, settings)
    }
}

impl<S: FrameSink> RosbridgeBase<S> {
    /// Wrap an already-open sink and advertise the command topics on it.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the sink.
    pub fn with_sink(mut sink: S, settings: RosbridgeSettings) -> Result<Self, SpotterError> {
        for (topic, msg_type) in [
            (&settings.cmd_vel_topic, TWIST_TYPE),
            (&settings.goal_topic, POSE_STAMPED_TYPE),
            (&settings.body_pose_topic, POSE_TYPE),
        ] {
            sink.send_frame(advertise_frame(topic, msg_type).to_string())?;
        }
        Ok(Self { sink, settings })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn publish(&mut self, topic: &str, msg: Value) -> Result<(), SpotterError> {
        let frame = publish_frame(topic, msg).to_string();
        debug!(topic, bytes = frame.len(), "rosbridge publish");
        self.sink.send_frame(frame)
    }
}

fn pause(seconds: f64) {
    if seconds > 0.0 {
        thread::sleep(Duration::from_secs_f64(seconds));
    }
}

impl<S: FrameSink> MobileBase for RosbridgeBase<S> {
    fn id(&self) -> &str {
        &self.settings.url
    }

    fn send_velocity(&mut self, command: VelocityCommand) -> Result<(), SpotterError> {
        let topic = self.settings.cmd_vel_topic.clone();
        self.publish(&topic, twist_msg(&command))?;
        if !command.is_stop() && command.duration_s < self.settings.cmd_vel_timeout_s {
            pause(command.duration_s);
            self.publish(&topic, twist_msg(&VelocityCommand::stop(0.0)))?;
        }
        Ok(())
    }

    fn move_to_goal(&mut self, x: f64, y: f64) -> Result<(), SpotterError> {
        let topic = self.settings.goal_topic.clone();
        let msg = goal_msg(&self.settings.goal_frame, x, y);
        self.publish(&topic, msg)
    }

    fn move_head(&mut self, pose: &HeadPose) -> Result<(), SpotterError> {
        pose.validate()?;
        let topic = self.settings.body_pose_topic.clone();
        for (yaw, pitch, roll) in pose.points() {
            self.publish(&topic, body_pose_msg(yaw, pitch, roll))?;
            pause(self.settings.point_dwell_s + pose.settle_s);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CapturingSink {
        frames: Vec<Value>,
    }

    impl FrameSink for CapturingSink {
        fn send_frame(&mut self, frame: String) -> Result<(), SpotterError> {
            self.frames.push(serde_json::from_str(&frame).unwrap());
            Ok(())
        }
    }

    struct BrokenSink;

    impl FrameSink for BrokenSink {
        fn send_frame(&mut self, _frame: String) -> Result<(), SpotterError> {
            Err(SpotterError::hardware("rosbridge", "connection reset"))
        }
    }

    fn test_settings() -> RosbridgeSettings {
        RosbridgeSettings {
            point_dwell_s: 0.0,
            ..RosbridgeSettings::default()
        }
    }

    fn base() -> RosbridgeBase<CapturingSink> {
        RosbridgeBase::with_sink(CapturingSink::default(), test_settings()).unwrap()
    }

    #[test]
    fn connect_advertises_all_topics() {
        let base = base();
        let frames = &base.sink().frames;
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f["op"] == "advertise"));
        assert_eq!(frames[0]["type"], TWIST_TYPE);
    }

    #[test]
    fn long_velocity_command_publishes_single_twist() {
        let mut base = base();
        base.send_velocity(VelocityCommand::rotate(-0.5, 2.0)).unwrap();
        let frames = &base.sink().frames[3..];
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["topic"], "/spot/cmd_vel");
        assert_eq!(frames[0]["msg"]["angular"]["z"], -0.5);
    }

    #[test]
    fn short_velocity_command_is_terminated() {
        let mut base = base();
        base.send_velocity(VelocityCommand::rotate(0.15, 0.01)).unwrap();
        let frames = &base.sink().frames[3..];
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1]["msg"]["angular"]["z"], 0.0);
    }

    #[test]
    fn stop_command_is_not_followed_by_another_stop() {
        let mut base = base();
        base.send_velocity(VelocityCommand::stop(0.1)).unwrap();
        assert_eq!(base.sink().frames.len(), 4);
    }

    #[test]
    fn goal_is_published_in_body_frame() {
        let mut base = base();
        base.move_to_goal(0.25, 0.0).unwrap();
        let frame = base.sink().frames.last().unwrap().clone();
        assert_eq!(frame["msg"]["header"]["frame_id"], "body");
        assert_eq!(frame["msg"]["pose"]["position"]["x"], 0.25);
    }

    #[test]
    fn head_pose_publishes_one_frame_per_point() {
        let mut base = base();
        base.move_head(&HeadPose::pitch_and_back(0.18)).unwrap();
        let frames = &base.sink().frames[3..];
        assert_eq!(frames.len(), 2);
        let y = frames[0]["msg"]["orientation"]["y"].as_f64().unwrap();
        assert!((y - (0.09f64).sin()).abs() < 1e-9);
        assert_eq!(frames[1]["msg"]["orientation"]["w"], 1.0);
    }

    #[test]
    fn identity_quaternion_for_zero_angles() {
        let (x, y, z, w) = quaternion(0.0, 0.0, 0.0);
        assert_eq!((x, y, z, w), (0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn sink_failure_surfaces_as_hardware_fault() {
        let result = RosbridgeBase::with_sink(BrokenSink, test_settings());
        assert!(matches!(result, Err(SpotterError::HardwareFault { .. })));
    }
}
