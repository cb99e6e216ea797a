// Steering kinematics for a single steered, driven wheel
//
// Provides:
// - Angle/radius of a link as seen from the spin center
// - Velocity command -> steer angle and wheel angular velocity
// - Joint state integration for the steer and wheel joints
// - Open loop odometry of the fixed axle

pub mod geometry;
mod joints;
mod odometry;
pub mod solver;

pub use geometry::{LinkAngle, SpinCenter, resolve_angle};
pub use joints::JointStateIntegrator;
pub use odometry::Odometry;
pub use solver::{BodyMotion, KinematicSolver, Solution};
