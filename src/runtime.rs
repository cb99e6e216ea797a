// Fixed rate control loop
//
// A listener task keeps the latest velocity command in a single slot watch channel,
// another feeds the frame buffer. Each tick takes one snapshot of the command,
// resolves the steer geometry, solves and integrates the joints, then publishes.
// Ticks that cannot resolve geometry or solve the command publish nothing and keep
// the previous joint state.

use std::error::Error;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::SteerConfig;
use crate::error::ControlError;
use crate::frames::{FrameLookup, LookupTime, TransformBuffer};
use crate::kinematics::{JointStateIntegrator, KinematicSolver, Odometry};
use crate::messages::{
    JointState, OdometryMessage, RuntimeHealth, SpinCenterMessage, TransformMessage,
    VelocityCommand,
};

/// Idle until the first command arrives, then Active for good
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Active,
}

/// Everything published after a successful tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub joint_state: JointState,
    pub spin_center: Option<SpinCenterMessage>,
    pub odometry: OdometryMessage,
}

pub struct Runtime<L> {
    config: SteerConfig,
    solver: KinematicSolver,
    lookup: L,
    joints: JointStateIntegrator,
    odometry: Odometry,
    state: ControlState,
    health: RuntimeHealth,
}

impl<L: FrameLookup> Runtime<L> {
    pub fn new(config: SteerConfig, lookup: L) -> Self {
        Self {
            solver: KinematicSolver::from_config(&config),
            joints: JointStateIntegrator::new(&config.wheel),
            odometry: Odometry::default(),
            state: ControlState::Idle,
            health: RuntimeHealth::Idle,
            config,
            lookup,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Last joint state produced (initial rest state before the first successful tick)
    pub fn joint_state(&self) -> &JointState {
        self.joints.state()
    }

    pub fn odometry(&self) -> &Odometry {
        &self.odometry
    }

    /// Run one control tick against the latest command snapshot
    ///
    /// Returns `None` while Idle or when this tick had to skip actuation.
    pub async fn tick(&mut self, latest: Option<VelocityCommand>) -> Option<TickOutput> {
        let command = latest?;

        if self.state == ControlState::Idle {
            info!("First command received ({:?}), controller active", command);
            self.state = ControlState::Active;
        }

        match self.step(&command).await {
            Ok(output) => {
                if self.health != RuntimeHealth::Ok {
                    info!("Actuating joints");
                }
                self.health = RuntimeHealth::Ok;
                Some(output)
            }
            Err(ControlError::FrameLookup(e)) => {
                if self.health != RuntimeHealth::GeometryUnavailable {
                    warn!("Skipping actuation, geometry unavailable: {}", e);
                }
                self.health = RuntimeHealth::GeometryUnavailable;
                None
            }
            Err(ControlError::Unsolvable(e)) => {
                if self.health != RuntimeHealth::UnsolvableCommand {
                    warn!("Holding joint state, command {:?} rejected: {}", command, e);
                } else {
                    debug!("Command still unsolvable: {}", e);
                }
                self.health = RuntimeHealth::UnsolvableCommand;
                None
            }
        }
    }

    async fn step(&mut self, command: &VelocityCommand) -> Result<TickOutput, ControlError> {
        let fixed_axle = self.config.fixed_axle_link.as_str();

        // Current steer geometry; its stamp pins every later lookup in this tick
        let steer_tf = self
            .lookup
            .lookup(
                fixed_axle,
                self.config.wheel.link(),
                LookupTime::Latest,
                self.config.lookup_timeout,
            )
            .await?;
        let stamp = steer_tf.stamp.unwrap_or_else(now_secs);

        let solution = self
            .solver
            .solve(&self.lookup, command, LookupTime::At(stamp))
            .await?;

        self.joints.set_stamp(stamp);
        let joint_state = self
            .joints
            .update(
                solution.steer_angle,
                solution.wheel_angular_velocity,
                self.config.period,
            )
            .clone();
        self.odometry.advance(&solution.motion);

        debug!(
            "steer={:.4} rad, wheel={:.3} rad/s, wheel position={:.3} rad",
            solution.steer_angle,
            solution.wheel_angular_velocity,
            self.joints.wheel_position()
        );

        Ok(TickOutput {
            joint_state,
            spin_center: solution.spin_center.map(|c| SpinCenterMessage {
                stamp,
                frame_id: c.frame_id,
                x: c.x,
                y: c.y,
            }),
            odometry: self
                .odometry
                .to_message(stamp, &self.config.odom_frame, fixed_axle),
        })
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Parse a JSON payload, logging and dropping it on failure
fn decode<T: DeserializeOwned>(payload: &[u8], what: &str) -> Option<T> {
    match serde_json::from_slice::<T>(payload) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("Failed to parse {}: {}", what, e);
            None
        }
    }
}

pub async fn run(config: SteerConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let zenoh_config = match &config.zenoh_config {
        Some(path) => zenoh::Config::from_file(path)?,
        None => zenoh::Config::default(),
    };
    let session = zenoh::open(zenoh_config).await?;

    info!("Setting up publishers and subscribers...");
    let topics = config.topics.clone();
    let sub_cmd = session.declare_subscriber(topics.cmd_vel.clone()).await?;
    let sub_tf = session.declare_subscriber(topics.tf.clone()).await?;
    let pub_joints = session.declare_publisher(topics.joint_states.clone()).await?;
    let pub_spin_center = session.declare_publisher(topics.spin_center.clone()).await?;
    let pub_odom = session.declare_publisher(topics.odom.clone()).await?;
    let pub_health = session.declare_publisher(topics.health.clone()).await?;

    // Single slot, last write wins; the tick only ever sees whole commands
    let (cmd_tx, cmd_rx) = watch::channel::<Option<VelocityCommand>>(None);
    tokio::spawn(async move {
        while let Ok(sample) = sub_cmd.recv_async().await {
            let payload = sample.payload().to_bytes();
            if let Some(cmd) = decode::<VelocityCommand>(&payload, "velocity command") {
                debug!("Received command: {:?}", cmd);
                cmd_tx.send_replace(Some(cmd));
            }
        }
        warn!("Command subscriber closed");
    });

    let buffer = Arc::new(TransformBuffer::new());
    let frames = buffer.clone();
    tokio::spawn(async move {
        while let Ok(sample) = sub_tf.recv_async().await {
            let payload = sample.payload().to_bytes();
            if let Some(tf) = decode::<TransformMessage>(&payload, "transform") {
                frames.insert(&tf);
            }
        }
        warn!("Transform subscriber closed");
    });

    let period = config.period;
    info!(
        "Runtime started: {}Hz loop, {}ms lookup timeout, steering '{}' about '{}'",
        1.0 / period.as_secs_f64(),
        config.lookup_timeout.as_millis(),
        config.wheel.link(),
        config.fixed_axle_link
    );
    info!("Subscribed to: {}, {}", topics.cmd_vel, topics.tf);
    info!("Publishing to: {}, {}", topics.joint_states, topics.health);

    let mut runtime = Runtime::new(config, buffer);
    let mut tick = interval(period.as_duration());
    // A long frame lookup must not cause a burst of catch-up ticks
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        // 1. Snapshot the latest command (copied out, borrow released immediately)
        let latest = *cmd_rx.borrow();

        // 2. Solve and integrate
        if let Some(output) = runtime.tick(latest).await {
            // 3. Publish actuation
            pub_joints
                .put(serde_json::to_string(&output.joint_state)?)
                .await?;
            if let Some(spin_center) = &output.spin_center {
                pub_spin_center
                    .put(serde_json::to_string(spin_center)?)
                    .await?;
            }
            pub_odom.put(serde_json::to_string(&output.odometry)?).await?;
        }

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }

    Ok(())
}
