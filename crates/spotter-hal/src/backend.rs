//! Startup-time selection of the mobile base.

use serde::{Deserialize, Serialize};
use spotter_types::SpotterError;
use tracing::info;

use crate::mobile_base::MobileBase;
use crate::rosbridge::RosbridgeBase;
use crate::sim::SimBase;

/// Which [`MobileBase`] implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseBackend {
    /// No hardware: [`SimBase`] logs and records every command.
    #[default]
    Sim,
    /// A physical robot behind a rosbridge WebSocket.
    Rosbridge,
}

impl std::fmt::Display for BaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaseBackend::Sim => write!(f, "sim"),
            BaseBackend::Rosbridge => write!(f, "rosbridge"),
        }
    }
}

/// Connection and topic layout of a rosbridge-driven robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosbridgeSettings {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel_topic: String,
    #[serde(default = "default_goal_topic")]
    pub goal_topic: String,
    #[serde(default = "default_body_pose_topic")]
    pub body_pose_topic: String,
    /// Frame the positioning goal is expressed in.
    #[serde(default = "default_goal_frame")]
    pub goal_frame: String,
    /// Robot-side `/cmd_vel` watchdog.  Shorter velocity commands are ended
    /// by an explicit zero twist after their duration.
    #[serde(default = "default_cmd_vel_timeout_s")]
    pub cmd_vel_timeout_s: f64,
    /// Time given to the body to reach each head point.
    #[serde(default = "default_point_dwell_s")]
    pub point_dwell_s: f64,
}

fn default_url() -> String {
    "ws://10.0.0.3:9090".to_string()
}
fn default_cmd_vel_topic() -> String {
    "/spot/cmd_vel".to_string()
}
fn default_goal_topic() -> String {
    "/spot/go_to_pose".to_string()
}
fn default_body_pose_topic() -> String {
    "/spot/body_pose".to_string()
}
fn default_goal_frame() -> String {
    "body".to_string()
}
fn default_cmd_vel_timeout_s() -> f64 {
    0.5
}
fn default_point_dwell_s() -> f64 {
    0.4
}

impl Default for RosbridgeSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            cmd_vel_topic: default_cmd_vel_topic(),
            goal_topic: default_goal_topic(),
            body_pose_topic: default_body_pose_topic(),
            goal_frame: default_goal_frame(),
            cmd_vel_timeout_s: default_cmd_vel_timeout_s(),
            point_dwell_s: default_point_dwell_s(),
        }
    }
}

/// Construct the base selected by `backend`.
///
/// # Errors
///
/// Returns [`SpotterError::HardwareFault`] when the rosbridge connection
/// cannot be established.
pub fn open_base(
    backend: BaseBackend,
    settings: &RosbridgeSettings,
) -> Result<Box<dyn MobileBase>, SpotterError> {
    info!(%backend, "opening mobile base");
    match backend {
        BaseBackend::Sim => Ok(Box::new(SimBase::new())),
        BaseBackend::Rosbridge => Ok(Box::new(RosbridgeBase::connect(settings.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_backend_opens_without_network() {
        let base = open_base(BaseBackend::Sim, &RosbridgeSettings::default()).unwrap();
        assert_eq!(base.id(), "sim");
    }

    #[test]
    fn rosbridge_backend_reports_unreachable_host() {
        let settings = RosbridgeSettings {
            url: "ws://127.0.0.1:1".to_string(),
            ..RosbridgeSettings::default()
        };
        let result = open_base(BaseBackend::Rosbridge, &settings);
        assert!(matches!(result, Err(SpotterError::HardwareFault { .. })));
    }

    #[test]
    fn backend_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: BaseBackend,
        }
        let w: Wrapper = serde_json::from_str(r#"{"backend":"rosbridge"}"#).unwrap();
        assert_eq!(w.backend, BaseBackend::Rosbridge);
        assert_eq!(BaseBackend::Sim.to_string(), "sim");
    }
}
