// Velocity command -> steer angle and wheel angular velocity
//
// The command is the motion of the fixed axle origin over one control period,
// in the vehicle frame at the start of the period.
//
// Straight (lateral == 0): no steering, wheel spins at forward / wheel_radius.
//
// Turning: the body yaws by `rotation` about a spin center on the fixed axle's
// y axis. For any point on the body the chord travelled over the period makes
// an angle of rotation / 2 with its starting tangent, so matching the commanded
// lateral / forward ratio gives
//
//   rotation = 2 * atan(lateral / forward)
//   spin_y   = forward * period / sin(rotation)
//
// The steer wheel then points perpendicular to the spin center -> steer link line
// and covers radius * |rotation| of arc per period.

use std::time::Duration;

use tracing::debug;

use super::geometry::{SpinCenter, resolve_angle};
use crate::config::{ControlPeriod, SteerConfig, WheelLinkGeometry};
use crate::error::{ControlError, UnsolvableCommandError};
use crate::frames::{FrameLookup, LookupTime};
use crate::messages::VelocityCommand;

/// Relative tolerance on the reconstructed lateral / forward ratio
const RATIO_TOLERANCE: f64 = 1e-6;

/// Steer links closer than this to the fixed axle line cannot move the spin center (m)
const MIN_AXLE_OFFSET: f64 = 1e-6;

/// Planar motion of the fixed axle origin over one period, in the starting vehicle frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyMotion {
    pub dx: f64,
    pub dy: f64,
    pub rotation: f64,
}

/// Joint targets for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub steer_angle: f64,
    pub wheel_angular_velocity: f64,
    pub motion: BodyMotion,
    /// Only set while turning
    pub spin_center: Option<SpinCenter>,
}

/// Stateless solver; holds only the static wheel geometry and limits
#[derive(Debug, Clone)]
pub struct KinematicSolver {
    wheel: WheelLinkGeometry,
    fixed_axle_frame: String,
    period: ControlPeriod,
    max_steer_angle: Option<f64>,
    lookup_timeout: Duration,
}

impl KinematicSolver {
    pub fn new(
        wheel: WheelLinkGeometry,
        fixed_axle_frame: impl Into<String>,
        period: ControlPeriod,
    ) -> Self {
        Self {
            wheel,
            fixed_axle_frame: fixed_axle_frame.into(),
            period,
            max_steer_angle: None,
            lookup_timeout: crate::config::DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn from_config(config: &SteerConfig) -> Self {
        Self {
            max_steer_angle: config.max_steer_angle,
            lookup_timeout: config.lookup_timeout,
            ..Self::new(config.wheel.clone(), config.fixed_axle_link.clone(), config.period)
        }
    }

    pub fn with_max_steer_angle(mut self, limit: f64) -> Self {
        self.max_steer_angle = Some(limit);
        self
    }

    /// Solve one command against the current frame geometry
    pub async fn solve<L: FrameLookup>(
        &self,
        lookup: &L,
        command: &VelocityCommand,
        time: LookupTime,
    ) -> Result<Solution, ControlError> {
        if command.lateral_speed == 0.0 {
            let solution = solve_straight(command, self.wheel.radius(), self.period);
            // Overflow here would poison the integrated wheel position for good
            if !(solution.wheel_angular_velocity.is_finite() && solution.motion.dx.is_finite()) {
                return Err(non_finite(command).into());
            }
            return Ok(solution);
        }

        let (spin_center, rotation) =
            turn_geometry(command, self.period, &self.fixed_axle_frame)?;

        let link = resolve_angle(
            lookup,
            &spin_center,
            self.wheel.link(),
            spin_center.y,
            time,
            self.lookup_timeout,
        )
        .await?;

        if link.radius < MIN_AXLE_OFFSET {
            return Err(UnsolvableCommandError::SpinCenterAtLink {
                link: self.wheel.link().to_string(),
            }
            .into());
        }
        if (link.radius * link.angle.sin()).abs() < MIN_AXLE_OFFSET {
            return Err(UnsolvableCommandError::SteerLinkOnAxle {
                link: self.wheel.link().to_string(),
            }
            .into());
        }
        if let Some(limit) = self.max_steer_angle {
            if link.angle.abs() > limit {
                return Err(UnsolvableCommandError::SteerLimit {
                    angle: link.angle,
                    limit,
                }
                .into());
            }
        }

        let period = self.period.as_secs_f64();
        let wheel_angular_velocity = command.forward_speed.signum() * link.radius * rotation.abs()
            / (self.wheel.radius() * period);

        check_reconstruction(
            command,
            self.wheel.radius(),
            wheel_angular_velocity,
            link.radius,
            period,
        )?;

        if !(link.angle.is_finite() && wheel_angular_velocity.is_finite()) {
            return Err(non_finite(command).into());
        }

        debug!(
            "Turn: spin center y={:.3}, steer={:.4} rad, wheel={:.3} rad/s",
            spin_center.y, link.angle, wheel_angular_velocity
        );

        Ok(Solution {
            steer_angle: link.angle,
            wheel_angular_velocity,
            motion: BodyMotion {
                dx: command.forward_speed * period,
                dy: command.lateral_speed * period,
                rotation,
            },
            spin_center: Some(spin_center),
        })
    }
}

/// Pure forward motion, exact
pub fn solve_straight(
    command: &VelocityCommand,
    wheel_radius: f64,
    period: ControlPeriod,
) -> Solution {
    Solution {
        steer_angle: 0.0,
        wheel_angular_velocity: command.forward_speed / wheel_radius,
        motion: BodyMotion {
            dx: command.forward_speed * period.as_secs_f64(),
            dy: 0.0,
            rotation: 0.0,
        },
        spin_center: None,
    }
}

/// Spin center and yaw change per period for a turning command
pub fn turn_geometry(
    command: &VelocityCommand,
    period: ControlPeriod,
    fixed_axle_frame: &str,
) -> Result<(SpinCenter, f64), UnsolvableCommandError> {
    if command.forward_speed == 0.0 {
        return Err(UnsolvableCommandError::PureLateral {
            lateral_speed: command.lateral_speed,
        });
    }

    let rotation = 2.0 * (command.lateral_speed / command.forward_speed).atan();
    let spin_y = command.forward_speed * period.as_secs_f64() / rotation.sin();

    if !(rotation.is_finite() && spin_y.is_finite()) || rotation == 0.0 {
        return Err(non_finite(command));
    }

    Ok((SpinCenter::on_axle(fixed_axle_frame, spin_y), rotation))
}

// Replay the wheel's arc over one period and compare its chord ratio to the command
fn check_reconstruction(
    command: &VelocityCommand,
    wheel_radius: f64,
    wheel_angular_velocity: f64,
    radius: f64,
    period: f64,
) -> Result<(), UnsolvableCommandError> {
    let angle_traveled = wheel_radius * wheel_angular_velocity * period / radius;
    let dx_traveled = radius * angle_traveled.sin();
    let dy_traveled = radius * (1.0 - angle_traveled.cos());

    let commanded = (command.lateral_speed / command.forward_speed).abs();
    let reconstructed = (dy_traveled / dx_traveled).abs();

    if !reconstructed.is_finite() {
        return Err(non_finite(command));
    }
    if (reconstructed - commanded).abs() > RATIO_TOLERANCE * commanded.max(1.0) {
        return Err(UnsolvableCommandError::RatioMismatch {
            commanded,
            reconstructed,
        });
    }
    Ok(())
}

fn non_finite(command: &VelocityCommand) -> UnsolvableCommandError {
    UnsolvableCommandError::NonFinite {
        forward_speed: command.forward_speed,
        lateral_speed: command.lateral_speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::TransformBuffer;
    use crate::messages::TransformMessage;

    const WHEEL_RADIUS: f64 = 0.15;

    fn period() -> ControlPeriod {
        ControlPeriod::from_rate(20.0).unwrap()
    }

    fn solver() -> KinematicSolver {
        let wheel =
            WheelLinkGeometry::new("lead_steer", "lead_steer_joint", "wheel_lead_axle", WHEEL_RADIUS)
                .unwrap();
        KinematicSolver::new(wheel, "back_axle", period())
    }

    // Lead steer link 1m ahead of the back axle
    fn carbot(steer_x: f64) -> TransformBuffer {
        let buffer = TransformBuffer::new();
        buffer.insert(&TransformMessage {
            parent: "back_axle".into(),
            child: "lead_steer".into(),
            stamp: None,
            translation: [steer_x, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        });
        buffer
    }

    #[test]
    fn test_straight_is_exact() {
        let solution = solve_straight(&VelocityCommand::new(1.0, 0.0), WHEEL_RADIUS, period());
        assert_eq!(solution.steer_angle, 0.0);
        assert_eq!(solution.wheel_angular_velocity, 1.0 / 0.15);
        assert!((solution.wheel_angular_velocity - 6.666_666_666_666_667).abs() < 1e-12);

        for &speed in &[-2.0, -0.3, 0.01, 0.7, 4.0] {
            let solution =
                solve_straight(&VelocityCommand::new(speed, 0.0), WHEEL_RADIUS, period());
            assert_eq!(solution.steer_angle, 0.0);
            assert_eq!(solution.wheel_angular_velocity, speed / WHEEL_RADIUS);
            assert_eq!(solution.spin_center, None);
        }
    }

    #[tokio::test]
    async fn test_straight_overflow_is_rejected() {
        let buffer = carbot(1.0);
        let command = VelocityCommand::new(1e308, 0.0);
        let err = solver()
            .solve(&buffer, &command, LookupTime::Latest)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::Unsolvable(UnsolvableCommandError::NonFinite {
                forward_speed: 1e308,
                lateral_speed: 0.0,
            })
        );
    }

    #[tokio::test]
    async fn test_vanishing_turn_is_non_finite() {
        // lateral / forward underflows to zero, so there is no spin center
        let buffer = carbot(1.0);
        let err = solver()
            .solve(&buffer, &VelocityCommand::new(1e300, 1e-300), LookupTime::Latest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Unsolvable(UnsolvableCommandError::NonFinite { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_straight_needs_no_geometry() {
        // empty buffer: a lookup would time out
        let buffer = TransformBuffer::new();
        let solution = solver()
            .solve(&buffer, &VelocityCommand::new(1.0, 0.0), LookupTime::Latest)
            .await
            .expect("straight line never looks up frames");
        assert_eq!(solution.wheel_angular_velocity, 1.0 / WHEEL_RADIUS);
    }

    #[tokio::test]
    async fn test_pure_lateral_is_unsolvable() {
        let buffer = carbot(1.0);
        let err = solver()
            .solve(&buffer, &VelocityCommand::new(0.0, 5.0), LookupTime::Latest)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::Unsolvable(UnsolvableCommandError::PureLateral { lateral_speed: 5.0 })
        );
    }

    #[test]
    fn test_turn_geometry_reproduces_command() {
        let command = VelocityCommand::new(1.0, 0.02);
        let (center, rotation) = turn_geometry(&command, period(), "back_axle").unwrap();
        assert_eq!(center.x, 0.0);
        assert!(center.y > 0.0, "left lateral puts the spin center on the left");

        // the fixed axle origin, rotated about the spin center, lands on the command
        let r = center.y;
        let dx = r * rotation.sin();
        let dy = r * (1.0 - rotation.cos());
        assert!((dx - 0.05).abs() < 1e-12, "dx = {}", dx);
        assert!((dy - 0.001).abs() < 1e-12, "dy = {}", dy);
    }

    #[tokio::test]
    async fn test_left_turn() {
        let buffer = carbot(1.0);
        let command = VelocityCommand::new(1.0, 0.02);
        let solution = solver()
            .solve(&buffer, &command, LookupTime::Latest)
            .await
            .expect("left turn is solvable");

        let center = solution.spin_center.clone().unwrap();
        // Ackermann: tan(steer) = wheelbase / turn radius
        let expected = (1.0 / center.y).atan();
        assert!((solution.steer_angle - expected).abs() < 1e-12);
        assert!(solution.steer_angle > 0.0);
        assert!(solution.wheel_angular_velocity > 0.0);

        // the steer wheel is further from the spin center than the axle, so it spins faster
        let straight = 1.0 / WHEEL_RADIUS;
        assert!(solution.wheel_angular_velocity > straight);

        // chord ratio of the steer wheel's own arc matches the command
        let radius = center.y.hypot(1.0);
        let traveled = WHEEL_RADIUS * solution.wheel_angular_velocity * 0.05 / radius;
        let ratio = (1.0 - traveled.cos()) / traveled.sin();
        assert!((ratio - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mirror_turns() {
        let buffer = carbot(1.0);
        let left = solver()
            .solve(&buffer, &VelocityCommand::new(0.5, 0.1), LookupTime::Latest)
            .await
            .unwrap();
        let right = solver()
            .solve(&buffer, &VelocityCommand::new(0.5, -0.1), LookupTime::Latest)
            .await
            .unwrap();
        assert!((left.steer_angle + right.steer_angle).abs() < 1e-12);
        assert!((left.wheel_angular_velocity - right.wheel_angular_velocity).abs() < 1e-9);
        assert!((left.motion.rotation + right.motion.rotation).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_reversing_keeps_steer_side() {
        let buffer = carbot(1.0);
        let reverse = solver()
            .solve(&buffer, &VelocityCommand::new(-0.5, 0.1), LookupTime::Latest)
            .await
            .unwrap();
        assert!(reverse.spin_center.unwrap().y > 0.0);
        assert!(reverse.steer_angle > 0.0);
        assert!(reverse.wheel_angular_velocity < 0.0);
        assert!(reverse.motion.rotation < 0.0);
    }

    #[tokio::test]
    async fn test_repeated_command_is_deterministic() {
        let buffer = carbot(1.0);
        let solver = solver();
        let command = VelocityCommand::new(0.8, -0.15);
        let first = solver.solve(&buffer, &command, LookupTime::Latest).await.unwrap();
        for _ in 0..5 {
            let again = solver.solve(&buffer, &command, LookupTime::Latest).await.unwrap();
            assert_eq!(again, first);
        }
    }

    #[tokio::test]
    async fn test_steer_limit_rejects_instead_of_clamping() {
        let buffer = carbot(1.0);
        let limited = solver().with_max_steer_angle(0.2);

        // tight turn needs more than 0.2 rad of steering
        let err = limited
            .solve(&buffer, &VelocityCommand::new(0.2, 0.2), LookupTime::Latest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Unsolvable(UnsolvableCommandError::SteerLimit { .. })
        ));

        // gentle turn still goes through
        assert!(
            limited
                .solve(&buffer, &VelocityCommand::new(1.0, 0.001), LookupTime::Latest)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_spin_center_on_steer_link_is_unsolvable() {
        let command = VelocityCommand::new(1.0, 0.02);
        let (center, _) = turn_geometry(&command, period(), "back_axle").unwrap();

        let buffer = TransformBuffer::new();
        buffer.insert(&TransformMessage {
            parent: "back_axle".into(),
            child: "lead_steer".into(),
            stamp: None,
            translation: [0.0, center.y, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        });

        let err = solver()
            .solve(&buffer, &command, LookupTime::Latest)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::Unsolvable(UnsolvableCommandError::SpinCenterAtLink {
                link: "lead_steer".to_string(),
            })
        );
    }

    #[test]
    fn test_reconstruction_rejects_wrong_wheel_speed() {
        let command = VelocityCommand::new(1.0, 0.1);
        let (center, rotation) = turn_geometry(&command, period(), "back_axle").unwrap();
        let radius = center.y.hypot(1.0);
        let omega = radius * rotation.abs() / (WHEEL_RADIUS * 0.05);

        assert!(check_reconstruction(&command, WHEEL_RADIUS, omega, radius, 0.05).is_ok());

        let err = check_reconstruction(&command, WHEEL_RADIUS, omega * 1.5, radius, 0.05)
            .unwrap_err();
        assert!(matches!(err, UnsolvableCommandError::RatioMismatch { .. }));
    }

    #[tokio::test]
    async fn test_steer_link_on_axle_is_unsolvable() {
        let buffer = carbot(0.0);
        let err = solver()
            .solve(&buffer, &VelocityCommand::new(1.0, 0.1), LookupTime::Latest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Unsolvable(UnsolvableCommandError::SteerLinkOnAxle { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_without_geometry_fails_lookup() {
        let buffer = TransformBuffer::new();
        let err = solver()
            .solve(&buffer, &VelocityCommand::new(1.0, 0.1), LookupTime::Latest)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::FrameLookup(_)));
    }
}
