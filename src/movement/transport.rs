//! Conversion between a transport's local frame and world space
//!
//! Transports rotate about the vertical axis only, so a frame is fully
//! described by the transport's world position and yaw.

use glam::{Quat, Vec3};

use super::state::{normalize_orientation, Pose};

/// The local frame of a transport at one instant
#[derive(Debug, Clone, Copy)]
pub struct TransportFrame {
    origin: Vec3,
    yaw: f32,
    rotation: Quat,
}

impl TransportFrame {
    pub fn new(transport: &Pose) -> Self {
        Self {
            origin: transport.position,
            yaw: transport.orientation,
            rotation: Quat::from_rotation_z(transport.orientation),
        }
    }

    pub fn point_to_world(&self, local: Vec3) -> Vec3 {
        self.origin + self.rotation * local
    }

    pub fn point_to_local(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.origin)
    }

    pub fn to_world(&self, local: &Pose) -> Pose {
        Pose {
            position: self.point_to_world(local.position),
            orientation: normalize_orientation(local.orientation + self.yaw),
            pitch: local.pitch,
        }
    }

    pub fn to_local(&self, world: &Pose) -> Pose {
        Pose {
            position: self.point_to_local(world.position),
            orientation: normalize_orientation(world.orientation - self.yaw),
            pitch: world.pitch,
        }
    }
}

/// Express a transport-local pose in world space
pub fn to_world(local: &Pose, transport: &Pose) -> Pose {
    TransportFrame::new(transport).to_world(local)
}

/// Express a world pose in the transport's local frame
pub fn to_local(world: &Pose, transport: &Pose) -> Pose {
    TransportFrame::new(transport).to_local(world)
}
