// Define message types for the runtime

use serde::{Deserialize, Serialize};

// Command from teleop/planners -> runtime
// Only the planar linear components are used; anything else in the payload is ignored
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    #[serde(alias = "x_vel")]
    pub forward_speed: f64,
    #[serde(alias = "y_vel", default)]
    pub lateral_speed: f64,
}

impl VelocityCommand {
    pub fn new(forward_speed: f64, lateral_speed: f64) -> Self {
        Self {
            forward_speed,
            lateral_speed,
        }
    }
}

/// Frame transform published by a robot description or localisation node
///
/// `stamp` is absent for static transforms. `rotation` is a unit quaternion in
/// `[x, y, z, w]` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformMessage {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub stamp: Option<f64>,
    pub translation: [f64; 3],
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

fn identity_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// Joint positions and velocities, runtime -> joint controllers
///
/// The three arrays always have the same length and index `i` of each refers to
/// the same joint. Only the integrator builds these, so fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    stamp: f64,
    name: Vec<String>,
    position: Vec<f64>,
    velocity: Vec<f64>,
}

impl JointState {
    /// One entry per joint, all starting at rest
    pub fn at_rest(names: &[&str]) -> Self {
        Self {
            stamp: 0.0,
            name: names.iter().map(|n| n.to_string()).collect(),
            position: vec![0.0; names.len()],
            velocity: vec![0.0; names.len()],
        }
    }

    pub fn stamp(&self) -> f64 {
        self.stamp
    }

    pub fn names(&self) -> &[String] {
        &self.name
    }

    pub fn positions(&self) -> &[f64] {
        &self.position
    }

    pub fn velocities(&self) -> &[f64] {
        &self.velocity
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// (position, velocity) of a named joint
    pub fn get(&self, joint: &str) -> Option<(f64, f64)> {
        let idx = self.name.iter().position(|n| n == joint)?;
        Some((self.position[idx], self.velocity[idx]))
    }

    pub(crate) fn set_stamp(&mut self, stamp: f64) {
        self.stamp = stamp;
    }

    // Index based so the three arrays can never drift apart
    pub(crate) fn set(&mut self, idx: usize, position: f64, velocity: f64) {
        self.position[idx] = position;
        self.velocity[idx] = velocity;
    }
}

/// Instantaneous center of rotation, published while turning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinCenterMessage {
    pub stamp: f64,
    pub frame_id: String,
    pub x: f64,
    pub y: f64,
}

/// Dead-reckoned planar pose of the fixed axle in the odometry frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometryMessage {
    pub stamp: f64,
    pub frame_id: String,
    pub child_frame_id: String,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Idle,
    Ok,
    GeometryUnavailable,
    UnsolvableCommand,
}
