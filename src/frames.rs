// Coordinate frame buffer
//
// Holds the latest parent -> child transform for every frame heard on the tf topic
// and answers "where is frame A in frame B" queries by composing edges through the
// common ancestor. Lookups wait for missing data up to a caller supplied timeout.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::FrameLookupError;
use crate::messages::TransformMessage;

/// Which data a lookup is allowed to use
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupTime {
    /// Whatever is newest
    Latest,
    /// Every dynamic edge on the path must be at least this fresh (seconds)
    At(f64),
}

/// Pose of a source frame expressed in a target frame
#[derive(Debug, Clone, PartialEq)]
pub struct RigidTransform {
    /// Oldest dynamic stamp that went into this transform, `None` if fully static
    pub stamp: Option<f64>,
    pub isometry: Isometry3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            stamp: None,
            isometry: Isometry3::identity(),
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }
}

/// Source of frame geometry for the kinematics
///
/// `lookup(target, source, ..)` returns the pose of `source` in `target`, waiting at
/// most `timeout` for the data to become available.
pub trait FrameLookup {
    fn lookup(
        &self,
        target: &str,
        source: &str,
        time: LookupTime,
        timeout: Duration,
    ) -> impl Future<Output = Result<RigidTransform, FrameLookupError>> + Send;
}

#[derive(Debug, Clone)]
struct Edge {
    parent: String,
    transform: RigidTransform,
}

/// In-memory frame tree fed by transform messages
#[derive(Debug, Default)]
pub struct TransformBuffer {
    // child frame -> edge to its parent
    edges: RwLock<HashMap<String, Edge>>,
    updated: Notify,
}

impl TransformBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the edge for `msg.child`
    ///
    /// Returns false when the message was rejected (bad rotation, self loop, cycle,
    /// or older than the edge already held).
    pub fn insert(&self, msg: &TransformMessage) -> bool {
        let [qx, qy, qz, qw] = msg.rotation;
        let quat = Quaternion::new(qw, qx, qy, qz);
        let finite = msg.translation.iter().chain(msg.rotation.iter()).all(|v| v.is_finite());
        if !finite || quat.norm() < 1e-9 {
            warn!("Dropping transform {} -> {}: invalid pose", msg.parent, msg.child);
            return false;
        }
        if msg.parent == msg.child {
            warn!("Dropping transform {} -> {}: self loop", msg.parent, msg.child);
            return false;
        }

        let [x, y, z] = msg.translation;
        let isometry = Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_quaternion(quat),
        );

        {
            let mut edges = self.edges.write();

            // The new parent must not already hang below the child
            if Self::ancestors(&edges, &msg.parent).iter().any(|f| f == &msg.child) {
                warn!("Dropping transform {} -> {}: would create a cycle", msg.parent, msg.child);
                return false;
            }

            if let Some(existing) = edges.get(&msg.child) {
                if let (Some(old), Some(new)) = (existing.transform.stamp, msg.stamp) {
                    if new < old {
                        debug!("Ignoring out of order transform for {}", msg.child);
                        return false;
                    }
                }
                if existing.parent != msg.parent {
                    warn!(
                        "Frame {} reparented from {} to {}",
                        msg.child, existing.parent, msg.parent
                    );
                }
            }

            edges.insert(
                msg.child.clone(),
                Edge {
                    parent: msg.parent.clone(),
                    transform: RigidTransform {
                        stamp: msg.stamp,
                        isometry,
                    },
                },
            );
        }

        self.updated.notify_waiters();
        true
    }

    /// Resolve without waiting; `None` if the frames are not connected or data is too old
    pub fn resolve(&self, target: &str, source: &str, time: LookupTime) -> Option<RigidTransform> {
        if target == source {
            return Some(RigidTransform::identity());
        }

        let edges = self.edges.read();
        let source_chain = Self::ancestors(&edges, source);
        let target_chain = Self::ancestors(&edges, target);

        let in_target: HashSet<&str> = target_chain.iter().map(String::as_str).collect();
        let common = source_chain.iter().find(|f| in_target.contains(f.as_str()))?;

        let (in_common_from_source, source_stamp) =
            Self::compose_to(&edges, &source_chain, common, time)?;
        let (in_common_from_target, target_stamp) =
            Self::compose_to(&edges, &target_chain, common, time)?;

        let stamp = match (source_stamp, target_stamp) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Some(RigidTransform {
            stamp,
            isometry: in_common_from_target.inverse() * in_common_from_source,
        })
    }

    // Frame followed by its parents up to the root
    fn ancestors(edges: &HashMap<String, Edge>, frame: &str) -> Vec<String> {
        let mut chain = vec![frame.to_string()];
        let mut current = frame;
        while let Some(edge) = edges.get(current) {
            // insert() refuses cycles, the length guard is for safety only
            if chain.len() > edges.len() {
                break;
            }
            chain.push(edge.parent.clone());
            current = edge.parent.as_str();
        }
        chain
    }

    // Pose of chain[0] in `ancestor`, plus the oldest dynamic stamp used
    fn compose_to(
        edges: &HashMap<String, Edge>,
        chain: &[String],
        ancestor: &str,
        time: LookupTime,
    ) -> Option<(Isometry3<f64>, Option<f64>)> {
        let mut pose = Isometry3::identity();
        let mut oldest: Option<f64> = None;

        for frame in chain.iter().take_while(|f| f.as_str() != ancestor) {
            let edge = edges.get(frame)?;
            if let Some(stamp) = edge.transform.stamp {
                if let LookupTime::At(wanted) = time {
                    if stamp < wanted {
                        return None;
                    }
                }
                oldest = Some(oldest.map_or(stamp, |o| o.min(stamp)));
            }
            pose = edge.transform.isometry * pose;
        }

        Some((pose, oldest))
    }
}

impl FrameLookup for TransformBuffer {
    async fn lookup(
        &self,
        target: &str,
        source: &str,
        time: LookupTime,
        timeout: Duration,
    ) -> Result<RigidTransform, FrameLookupError> {
        let wait = async {
            loop {
                // Register interest before checking so an insert in between is not missed
                let notified = self.updated.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(transform) = self.resolve(target, source, time) {
                    return transform;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| FrameLookupError {
                target_frame: target.to_string(),
                source_frame: source.to_string(),
                timeout,
            })
    }
}

// Lets the runtime share one buffer with the tf listener task
impl<T: FrameLookup + Send + Sync> FrameLookup for Arc<T> {
    fn lookup(
        &self,
        target: &str,
        source: &str,
        time: LookupTime,
        timeout: Duration,
    ) -> impl Future<Output = Result<RigidTransform, FrameLookupError>> + Send {
        (**self).lookup(target, source, time, timeout)
    }
}
