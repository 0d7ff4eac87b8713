//! Persistent movement forces attached to one actor

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::state::Pose;
use super::transport::TransportFrame;
use super::{ActorId, ForceId};

/// How a force's direction is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceKind {
    /// Stored direction used as-is
    SingleDirectional = 0,
    /// Direction recomputed from the origin toward the actor on every query
    Gravity = 1,
}

impl TryFrom<u32> for ForceKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SingleDirectional),
            1 => Ok(Self::Gravity),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementForce {
    pub id: ForceId,
    /// In the owning transport's frame when `transport` is set
    pub origin: Vec3,
    pub direction: Vec3,
    pub magnitude: f32,
    pub transport: Option<ActorId>,
    pub kind: ForceKind,
}

/// Pending outbound change to the force set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceSync {
    Added(ForceId),
    Removed(ForceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    AlreadyPresent,
}

/// Forces owned by a single actor, keyed by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceSet {
    forces: BTreeMap<ForceId, MovementForce>,
    mod_magnitude: f32,
    #[serde(skip)]
    pending_sync: Vec<ForceSync>,
}

impl Default for ForceSet {
    fn default() -> Self {
        Self {
            forces: BTreeMap::new(),
            mod_magnitude: 1.0,
            pending_sync: Vec::new(),
        }
    }
}

impl ForceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, force: MovementForce) -> AddOutcome {
        if self.forces.contains_key(&force.id) {
            return AddOutcome::AlreadyPresent;
        }
        self.forces.insert(force.id, force);
        self.pending_sync.push(ForceSync::Added(force.id));
        AddOutcome::Inserted
    }

    /// Returns the removed force, `None` if it was not present
    pub fn remove(&mut self, id: ForceId) -> Option<MovementForce> {
        let removed = self.forces.remove(&id)?;
        self.pending_sync.push(ForceSync::Removed(id));
        Some(removed)
    }

    pub fn get(&self, id: ForceId) -> Option<&MovementForce> {
        self.forces.get(&id)
    }

    pub fn contains(&self, id: ForceId) -> bool {
        self.forces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovementForce> {
        self.forces.values()
    }

    pub fn mod_magnitude(&self) -> f32 {
        self.mod_magnitude
    }

    pub fn set_mod_magnitude(&mut self, value: f32) {
        self.mod_magnitude = value;
    }

    /// Drain changes not yet sent to observers
    pub fn take_pending_sync(&mut self) -> Vec<ForceSync> {
        std::mem::take(&mut self.pending_sync)
    }

    pub fn has_pending_sync(&self) -> bool {
        !self.pending_sync.is_empty()
    }

    /// Sum of all forces acting on an actor at `actor_position`.
    ///
    /// Transport-owned origins are resolved through `transport_pose` when
    /// it is supplied; otherwise they are taken as world coordinates.
    pub fn effective_velocity_contribution(
        &self,
        actor_position: Vec3,
        transport_pose: Option<&Pose>,
    ) -> Vec3 {
        let frame = transport_pose.map(TransportFrame::new);
        self.forces
            .values()
            .map(|force| {
                let direction = match force.kind {
                    ForceKind::SingleDirectional => force.direction,
                    ForceKind::Gravity => {
                        let origin = match (force.transport, frame) {
                            (Some(_), Some(frame)) => frame.point_to_world(force.origin),
                            _ => force.origin,
                        };
                        (origin - actor_position).normalize_or_zero()
                    }
                };
                direction * force.magnitude * self.mod_magnitude
            })
            .sum()
    }
}
