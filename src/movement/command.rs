//! Server-issued movement commands
//!
//! Every command carries a complete new value rather than a delta, so
//! applying a command twice leaves the mover as applying it once.

use serde::{Deserialize, Serialize};

use super::flags::{MovementFlags, MovementFlags2, MovementFlags3};
use super::force::MovementForce;
use super::mover::{Mover, SpeedAxis};
use super::state::{FallDirection, Pose};
use super::ForceId;

/// Toggleable movement capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Root = 0,
    DisableGravity = 1,
    DisableCollision = 2,
    Hover = 3,
    WaterWalk = 4,
    FeatherFall = 5,
    DoubleJump = 6,
    SwimToFlyTransition = 7,
    TurnWhileFalling = 8,
    IgnoreForces = 9,
    DisableInertia = 10,
}

impl Capability {
    pub const BITS: u32 = 4;
    pub const ALL: [Self; 11] = [
        Self::Root,
        Self::DisableGravity,
        Self::DisableCollision,
        Self::Hover,
        Self::WaterWalk,
        Self::FeatherFall,
        Self::DoubleJump,
        Self::SwimToFlyTransition,
        Self::TurnWhileFalling,
        Self::IgnoreForces,
        Self::DisableInertia,
    ];

    /// Whether enabling this capability must interrupt spline motion
    pub fn preempts_spline(self) -> bool {
        matches!(self, Self::Root)
    }

    fn apply(self, mover: &mut Mover, enabled: bool) {
        let motion = &mut mover.motion;
        let primary = match self {
            Self::Root => Some(MovementFlags::ROOT),
            Self::DisableGravity => Some(MovementFlags::DISABLE_GRAVITY),
            Self::DisableCollision => Some(MovementFlags::DISABLE_COLLISION),
            Self::Hover => Some(MovementFlags::HOVER),
            Self::WaterWalk => Some(MovementFlags::WATERWALKING),
            Self::FeatherFall => Some(MovementFlags::FALLING_SLOW),
            _ => None,
        };
        if let Some(flag) = primary {
            if enabled {
                motion.add_flags(flag);
            } else {
                motion.remove_flags(flag);
            }
            return;
        }

        match self {
            Self::DoubleJump => motion.update_flags2(MovementFlags2::CAN_DOUBLE_JUMP, enabled),
            Self::SwimToFlyTransition => {
                motion.update_flags2(MovementFlags2::CAN_SWIM_TO_FLY_TRANS, enabled)
            }
            Self::TurnWhileFalling => {
                motion.update_flags2(MovementFlags2::CAN_TURN_WHILE_FALLING, enabled)
            }
            Self::IgnoreForces => {
                motion.update_flags2(MovementFlags2::IGNORE_MOVEMENT_FORCES, enabled)
            }
            Self::DisableInertia => motion.update_flags3(MovementFlags3::DISABLE_INERTIA, enabled),
            _ => {}
        }
    }
}

impl TryFrom<u32> for Capability {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(value)
    }
}

/// Why the collision height changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionHeightReason {
    Scale = 0,
    Mount = 1,
    Force = 2,
}

impl CollisionHeightReason {
    pub const BITS: u32 = 2;
}

impl TryFrom<u32> for CollisionHeightReason {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Scale),
            1 => Ok(Self::Mount),
            2 => Ok(Self::Force),
            other => Err(other),
        }
    }
}

/// Independent acknowledgement lanes; one command may be outstanding in each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Speed(SpeedAxis),
    Capability(Capability),
    Knockback,
    Teleport,
    MovementForce,
    CollisionHeight,
    VehicleRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementCommand {
    SetSpeed {
        axis: SpeedAxis,
        speed: f32,
    },
    SetCapability {
        capability: Capability,
        enabled: bool,
    },
    Knockback {
        horizontal_speed: f32,
        vertical_speed: f32,
        /// Direction of the push in radians
        direction: f32,
    },
    Teleport {
        pose: Pose,
    },
    ApplyForce {
        force: MovementForce,
    },
    RemoveForce {
        id: ForceId,
    },
    SetCollisionHeight {
        height: f32,
        mount_display_id: u32,
        reason: CollisionHeightReason,
    },
    SetVehicleRecord {
        vehicle_record_id: u32,
    },
}

impl MovementCommand {
    pub fn category(&self) -> CommandCategory {
        match self {
            Self::SetSpeed { axis, .. } => CommandCategory::Speed(*axis),
            Self::SetCapability { capability, .. } => CommandCategory::Capability(*capability),
            Self::Knockback { .. } => CommandCategory::Knockback,
            Self::Teleport { .. } => CommandCategory::Teleport,
            Self::ApplyForce { .. } | Self::RemoveForce { .. } => CommandCategory::MovementForce,
            Self::SetCollisionHeight { .. } => CommandCategory::CollisionHeight,
            Self::SetVehicleRecord { .. } => CommandCategory::VehicleRecord,
        }
    }

    /// Whether this command must interrupt an active spline
    pub fn preempts_spline(&self) -> bool {
        match self {
            Self::SetCapability {
                capability,
                enabled,
            } => *enabled && capability.preempts_spline(),
            Self::Knockback { .. } | Self::Teleport { .. } => true,
            _ => false,
        }
    }

    /// Apply the command to the server's copy of the mover
    pub fn apply(&self, mover: &mut Mover, min_speed: f32) {
        match *self {
            Self::SetSpeed { axis, speed } => {
                mover.capabilities.speeds.set(axis, speed.max(min_speed));
            }
            Self::SetCapability {
                capability,
                enabled,
            } => capability.apply(mover, enabled),
            Self::Knockback {
                horizontal_speed,
                vertical_speed,
                direction,
            } => {
                mover.motion.remove_flags(MovementFlags::ROOT);
                mover.motion.begin_fall(
                    vertical_speed,
                    Some(FallDirection::from_angle(direction, horizontal_speed)),
                );
            }
            Self::Teleport { pose } => {
                let motion = &mut mover.motion;
                motion.pose = pose;
                motion.fall = None;
                motion.remove_flags(MovementFlags::MASK_MOVING | MovementFlags::MASK_TURNING);
                motion.transport = None;
            }
            Self::ApplyForce { force } => {
                mover.forces.add(force);
            }
            Self::RemoveForce { id } => {
                if mover.forces.remove(id).is_some() {
                    mover.motion.removed_forces.push(id);
                }
            }
            Self::SetCollisionHeight {
                height,
                mount_display_id,
                ..
            } => {
                mover.capabilities.collision_height = height;
                mover.capabilities.mount_display_id = mount_display_id;
            }
            Self::SetVehicleRecord { vehicle_record_id } => {
                mover.capabilities.vehicle_record_id = vehicle_record_id;
            }
        }
    }
}
