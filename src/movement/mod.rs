//! Movement model: snapshots, forces, paths and the command channel

pub mod channel;
pub mod command;
pub mod flags;
pub mod force;
pub mod mover;
pub mod physics;
pub mod spline;
pub mod state;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use channel::{AckOutcome, CommandChannel, Controller, Dispatch, ProtocolViolation};
pub use command::{Capability, CollisionHeightReason, CommandCategory, MovementCommand};
pub use flags::{MovementFlags, MovementFlags2, MovementFlags3, SplineFlags};
pub use force::{ForceKind, ForceSet, MovementForce};
pub use mover::{Capabilities, Mover, SpeedAxis, SpeedTable};
pub use state::{FallDirection, FallState, MotionState, Pose, TransportState};

/// Globally unique actor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForceId(pub u64);

impl fmt::Display for ForceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "force-{}", self.0)
    }
}

/// A connected client session that may control actors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerId(pub Uuid);

impl ControllerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ControllerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
