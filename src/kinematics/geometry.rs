// Where a link sits relative to the spin center

use std::time::Duration;

use crate::error::FrameLookupError;
use crate::frames::{FrameLookup, LookupTime};

/// Instantaneous center of rotation, expressed in the fixed axle frame
#[derive(Debug, Clone, PartialEq)]
pub struct SpinCenter {
    pub frame_id: String,
    pub x: f64,
    pub y: f64,
}

impl SpinCenter {
    /// A spin center on the y axis of `frame_id`
    pub fn on_axle(frame_id: impl Into<String>, y: f64) -> Self {
        Self {
            frame_id: frame_id.into(),
            x: 0.0,
            y,
        }
    }
}

/// Angle from the vehicle's longitudinal axis to the spin center -> link line,
/// and the link's turning radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkAngle {
    pub angle: f64,
    pub radius: f64,
}

/// Angle and radius of a point (in the spin center's frame)
///
/// The angle is `atan2(dx, |dy|)`, so it lies in [-pi/2, pi/2] whichever side the
/// spin center is on; a negative `steer_angle` mirrors it for right hand turns.
pub fn angle_to_point(spin_center: &SpinCenter, x: f64, y: f64, steer_angle: f64) -> LinkAngle {
    let dx = x - spin_center.x;
    let dy = y - spin_center.y;

    let mut angle = dx.atan2(dy.abs());
    if steer_angle < 0.0 {
        angle = -angle;
    }

    LinkAngle {
        angle,
        radius: dx.hypot(dy),
    }
}

/// Look up `link` in the spin center's frame and compute its angle and radius
pub async fn resolve_angle<L: FrameLookup>(
    lookup: &L,
    spin_center: &SpinCenter,
    link: &str,
    steer_angle: f64,
    time: LookupTime,
    timeout: Duration,
) -> Result<LinkAngle, FrameLookupError> {
    let transform = lookup
        .lookup(&spin_center.frame_id, link, time, timeout)
        .await?;
    let position = transform.translation();

    Ok(angle_to_point(spin_center, position.x, position.y, steer_angle))
}
