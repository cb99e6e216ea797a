// Velocity command -> steer/wheel joint runtime for a single steered wheel vehicle

pub mod config;
pub mod error;
pub mod frames;
pub mod kinematics;
pub mod messages;
pub mod runtime;
