// Open loop odometry from commanded motion (no encoder feedback)

use std::f64::consts::PI;

use super::solver::BodyMotion;
use crate::messages::OdometryMessage;

/// Planar pose of the fixed axle in the odometry frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Odometry {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Odometry {
    /// Apply one period of body motion
    pub fn advance(&mut self, motion: &BodyMotion) {
        let (sin_h, cos_h) = self.heading.sin_cos();
        self.x += cos_h * motion.dx - sin_h * motion.dy;
        self.y += sin_h * motion.dx + cos_h * motion.dy;
        self.heading = normalize_angle(self.heading + motion.rotation);
    }

    pub fn to_message(&self, stamp: f64, frame_id: &str, child_frame_id: &str) -> OdometryMessage {
        OdometryMessage {
            stamp,
            frame_id: frame_id.to_string(),
            child_frame_id: child_frame_id.to_string(),
            x: self.x,
            y: self.y,
            heading: self.heading,
        }
    }
}

// Wrap to (-pi, pi]
fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI { PI } else { wrapped }
}
