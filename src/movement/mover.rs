//! Everything the movement layer owns for one actor

use serde::{Deserialize, Serialize};

use super::force::ForceSet;
use super::state::{MotionState, Pose};
use super::ActorId;

/// Speed axes the server can set independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedAxis {
    Walk = 0,
    Run = 1,
    RunBack = 2,
    Swim = 3,
    SwimBack = 4,
    Flight = 5,
    FlightBack = 6,
    TurnRate = 7,
    PitchRate = 8,
}

impl SpeedAxis {
    pub const BITS: u32 = 4;
    pub const COUNT: usize = 9;
    pub const ALL: [Self; Self::COUNT] = [
        Self::Walk,
        Self::Run,
        Self::RunBack,
        Self::Swim,
        Self::SwimBack,
        Self::Flight,
        Self::FlightBack,
        Self::TurnRate,
        Self::PitchRate,
    ];

    pub fn base_speed(self) -> f32 {
        match self {
            Self::Walk => 2.5,
            Self::Run => 7.0,
            Self::RunBack => 4.5,
            Self::Swim => 4.722_222,
            Self::SwimBack => 2.5,
            Self::Flight => 7.0,
            Self::FlightBack => 4.5,
            Self::TurnRate => std::f32::consts::PI,
            Self::PitchRate => std::f32::consts::PI,
        }
    }
}

impl TryFrom<u32> for SpeedAxis {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedTable([f32; SpeedAxis::COUNT]);

impl Default for SpeedTable {
    fn default() -> Self {
        Self(SpeedAxis::ALL.map(SpeedAxis::base_speed))
    }
}

impl SpeedTable {
    pub fn get(&self, axis: SpeedAxis) -> f32 {
        self.0[axis as usize]
    }

    pub fn set(&mut self, axis: SpeedAxis, speed: f32) {
        self.0[axis as usize] = speed;
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeedAxis, f32)> + '_ {
        SpeedAxis::ALL.iter().map(|axis| (*axis, self.get(*axis)))
    }
}

/// Server-set scalars that are not part of the movement snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub speeds: SpeedTable,
    pub collision_height: f32,
    pub mount_display_id: u32,
    pub vehicle_record_id: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            speeds: SpeedTable::default(),
            collision_height: 2.0,
            mount_display_id: 0,
            vehicle_record_id: 0,
        }
    }
}

/// Movement state, forces and capabilities of one actor
#[derive(Debug, Clone)]
pub struct Mover {
    pub motion: MotionState,
    pub forces: ForceSet,
    pub capabilities: Capabilities,
}

impl Mover {
    pub fn new(id: ActorId, pose: Pose) -> Self {
        Self {
            motion: MotionState::new(id, pose),
            forces: ForceSet::new(),
            capabilities: Capabilities::default(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.motion.guid
    }
}
