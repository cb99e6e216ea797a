// Steer and wheel joint state, carried across ticks

use crate::config::{ControlPeriod, WheelLinkGeometry};
use crate::messages::JointState;

const STEER: usize = 0;
const WHEEL: usize = 1;

/// Owns the published joint state for the steer joint and the wheel joint
///
/// The steer joint is set absolutely every update. The wheel joint's position is
/// integrated with forward Euler over the fixed control period and never wrapped.
#[derive(Debug, Clone)]
pub struct JointStateIntegrator {
    state: JointState,
}

impl JointStateIntegrator {
    pub fn new(wheel: &WheelLinkGeometry) -> Self {
        Self {
            state: JointState::at_rest(&[wheel.steer_joint(), wheel.wheel_joint()]),
        }
    }

    pub fn update(
        &mut self,
        steer_angle: f64,
        wheel_angular_velocity: f64,
        period: ControlPeriod,
    ) -> &JointState {
        let wheel_position =
            self.state.positions()[WHEEL] + wheel_angular_velocity * period.as_secs_f64();

        self.state.set(STEER, steer_angle, 0.0);
        self.state.set(WHEEL, wheel_position, wheel_angular_velocity);
        &self.state
    }

    pub fn set_stamp(&mut self, stamp: f64) {
        self.state.set_stamp(stamp);
    }

    pub fn state(&self) -> &JointState {
        &self.state
    }

    pub fn wheel_position(&self) -> f64 {
        self.state.positions()[WHEEL]
    }
}
