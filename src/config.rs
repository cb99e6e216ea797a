// Rates, frame names, topics and wheel geometry
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

// Control loop frequency
pub const DEFAULT_RATE_HZ: f64 = 20.0;

// How long a tick may wait on the frame buffer before skipping actuation
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(4);

// Zenoh topics
pub const TOPIC_CMD_VEL: &str = "carbot/cmd_vel"; // velocity commands
pub const TOPIC_TF: &str = "carbot/tf"; // frame transforms
pub const TOPIC_JOINT_STATES: &str = "carbot/joint_states"; // actuation
pub const TOPIC_SPIN_CENTER: &str = "carbot/state/spin_center";
pub const TOPIC_ODOM: &str = "carbot/state/odom";
pub const TOPIC_HEALTH: &str = "carbot/state/health"; // health status

/// Command line arguments for the runtime binary
#[derive(Debug, Clone, Parser)]
#[command(name = "carbot-steer-runtime", about = "Velocity command to steer/wheel joint runtime")]
pub struct Args {
    /// Control loop rate in Hz
    #[arg(long, default_value_t = DEFAULT_RATE_HZ)]
    pub rate: f64,

    /// Link whose position defines the steer angle
    #[arg(long, default_value = "lead_steer")]
    pub steer_link: String,

    #[arg(long, default_value = "lead_steer_joint")]
    pub steer_joint: String,

    #[arg(long, default_value = "wheel_lead_axle")]
    pub wheel_joint: String,

    /// Drive wheel radius in meters
    #[arg(long, default_value_t = 0.15)]
    pub wheel_radius: f64,

    /// Non-steering axle; the spin center always lies on its y axis
    #[arg(long, default_value = "back_axle")]
    pub fixed_axle_link: String,

    /// Frame the dead-reckoned fixed axle pose is expressed in
    #[arg(long, default_value = "odom")]
    pub odom_frame: String,

    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64)]
    pub lookup_timeout_ms: u64,

    /// Reject turns needing a larger steer angle (radians)
    #[arg(long)]
    pub max_steer_angle: Option<f64>,

    #[arg(long, default_value = TOPIC_CMD_VEL)]
    pub cmd_topic: String,

    #[arg(long, default_value = TOPIC_TF)]
    pub tf_topic: String,

    #[arg(long, default_value = TOPIC_JOINT_STATES)]
    pub joint_topic: String,

    /// Zenoh session config file (defaults to peer mode)
    #[arg(long)]
    pub zenoh_config: Option<PathBuf>,
}

impl Args {
    /// Validate into the immutable runtime configuration
    pub fn into_config(self) -> Result<SteerConfig, ConfigError> {
        let period = ControlPeriod::from_rate(self.rate)?;
        let wheel = WheelLinkGeometry::new(
            self.steer_link,
            self.steer_joint,
            self.wheel_joint,
            self.wheel_radius,
        )?;

        if self.fixed_axle_link.is_empty() {
            return Err(ConfigError::EmptyName("fixed_axle_link"));
        }
        if self.odom_frame.is_empty() {
            return Err(ConfigError::EmptyName("odom_frame"));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::ZeroLookupTimeout);
        }
        if let Some(limit) = self.max_steer_angle {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(ConfigError::InvalidSteerLimit(limit));
            }
        }

        Ok(SteerConfig {
            period,
            wheel,
            fixed_axle_link: self.fixed_axle_link,
            odom_frame: self.odom_frame,
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
            max_steer_angle: self.max_steer_angle,
            topics: Topics {
                cmd_vel: self.cmd_topic,
                tf: self.tf_topic,
                joint_states: self.joint_topic,
                spin_center: TOPIC_SPIN_CENTER.to_string(),
                odom: TOPIC_ODOM.to_string(),
                health: TOPIC_HEALTH.to_string(),
            },
            zenoh_config: self.zenoh_config,
        })
    }
}

/// Key expressions used by the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Topics {
    pub cmd_vel: String,
    pub tf: String,
    pub joint_states: String,
    pub spin_center: String,
    pub odom: String,
    pub health: String,
}

/// Validated runtime configuration, fixed for the life of the process
#[derive(Debug, Clone, PartialEq)]
pub struct SteerConfig {
    pub period: ControlPeriod,
    pub wheel: WheelLinkGeometry,
    pub fixed_axle_link: String,
    pub odom_frame: String,
    pub lookup_timeout: Duration,
    pub max_steer_angle: Option<f64>,
    pub topics: Topics,
    pub zenoh_config: Option<PathBuf>,
}

impl SteerConfig {
    /// Configuration with every default applied
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Args::parse_from(["carbot-steer-runtime"]).into_config()
    }
}

/// Fixed tick interval derived from the configured rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPeriod {
    secs: f64,
}

impl ControlPeriod {
    pub fn from_rate(rate_hz: f64) -> Result<Self, ConfigError> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(ConfigError::InvalidRate(rate_hz));
        }
        Ok(Self { secs: 1.0 / rate_hz })
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.secs)
    }
}

/// The steered and driven wheel: which link and joints it maps to, and its radius
#[derive(Debug, Clone, PartialEq)]
pub struct WheelLinkGeometry {
    link: String,
    steer_joint: String,
    wheel_joint: String,
    radius: f64,
}

impl WheelLinkGeometry {
    pub fn new(
        link: impl Into<String>,
        steer_joint: impl Into<String>,
        wheel_joint: impl Into<String>,
        radius: f64,
    ) -> Result<Self, ConfigError> {
        let (link, steer_joint, wheel_joint) = (link.into(), steer_joint.into(), wheel_joint.into());

        if link.is_empty() {
            return Err(ConfigError::EmptyName("steer_link"));
        }
        if steer_joint.is_empty() {
            return Err(ConfigError::EmptyName("steer_joint"));
        }
        if wheel_joint.is_empty() {
            return Err(ConfigError::EmptyName("wheel_joint"));
        }
        if steer_joint == wheel_joint {
            return Err(ConfigError::DuplicateJoint(steer_joint));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConfigError::InvalidWheelRadius(radius));
        }

        Ok(Self {
            link,
            steer_joint,
            wheel_joint,
            radius,
        })
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn steer_joint(&self) -> &str {
        &self.steer_joint
    }

    pub fn wheel_joint(&self) -> &str {
        &self.wheel_joint
    }

    /// Wheel radius in meters, always > 0
    pub fn radius(&self) -> f64 {
        self.radius
    }
}
