// Error types for the steering runtime
//
// Three failure families:
// - FrameLookupError: geometry not available this tick (recoverable)
// - UnsolvableCommandError: command has no joint mapping (operator visible)
// - ConfigError: bad static parameter (fatal at startup)

use std::time::Duration;

/// A transform between two frames could not be resolved within the lookup timeout
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("no transform from '{source_frame}' to '{target_frame}' after {timeout:?}")]
pub struct FrameLookupError {
    pub target_frame: String,
    pub source_frame: String,
    pub timeout: Duration,
}

/// The velocity command has no valid steer/wheel mapping under the single spin center model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnsolvableCommandError {
    #[error("pure lateral command (lateral_speed = {lateral_speed}) has no spin center")]
    PureLateral { lateral_speed: f64 },

    #[error("steer link '{link}' lies on the fixed axle line, steering cannot move the spin center")]
    SteerLinkOnAxle { link: String },

    #[error("spin center coincides with steer link '{link}'")]
    SpinCenterAtLink { link: String },

    #[error("steer angle {angle:.4} rad exceeds limit of {limit:.4} rad")]
    SteerLimit { angle: f64, limit: f64 },

    #[error("reconstructed ratio {reconstructed} does not match commanded ratio {commanded}")]
    RatioMismatch { commanded: f64, reconstructed: f64 },

    #[error("command ({forward_speed}, {lateral_speed}) produced a non-finite solution")]
    NonFinite { forward_speed: f64, lateral_speed: f64 },
}

/// Invalid static configuration, reported once at startup
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("control rate must be positive and finite, got {0}")]
    InvalidRate(f64),

    #[error("wheel radius must be positive and finite, got {0}")]
    InvalidWheelRadius(f64),

    #[error("max steer angle must be positive and finite, got {0}")]
    InvalidSteerLimit(f64),

    #[error("lookup timeout must be non-zero")]
    ZeroLookupTimeout,

    #[error("'{0}' must not be empty")]
    EmptyName(&'static str),

    #[error("steer joint and wheel joint are both named '{0}'")]
    DuplicateJoint(String),
}

/// Reasons a control tick produced no actuation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("frame lookup failed: {0}")]
    FrameLookup(#[from] FrameLookupError),

    #[error("unsolvable command: {0}")]
    Unsolvable(#[from] UnsolvableCommandError),
}
