//! Canonical per-actor movement snapshot

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use super::flags::{MovementFlags, MovementFlags2, MovementFlags3};
use super::{ActorId, ForceId};

/// Wrap an angle into `[0, 2π)`
pub fn normalize_orientation(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Position, facing and pitch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    /// Yaw in radians
    pub orientation: f32,
    pub pitch: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, z: f32, orientation: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            orientation,
            pitch: 0.0,
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite() && self.pitch.is_finite()
    }

    /// Yaw from this pose to `target`, ignoring height
    pub fn angle_to(&self, target: Vec3) -> f32 {
        let delta = target - self.position;
        normalize_orientation(delta.y.atan2(delta.x))
    }
}

/// Horizontal component of a jump or knockback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallDirection {
    pub sin_angle: f32,
    pub cos_angle: f32,
    pub horizontal_speed: f32,
}

impl FallDirection {
    pub fn from_angle(angle: f32, horizontal_speed: f32) -> Self {
        Self {
            sin_angle: angle.sin(),
            cos_angle: angle.cos(),
            horizontal_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FallState {
    /// Milliseconds since the fall began
    pub fall_time: u32,
    pub vertical_speed: f32,
    pub direction: Option<FallDirection>,
}

/// Attachment to a moving platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub transport: ActorId,
    /// Pose in the transport's local frame
    pub local: Pose,
    pub seat: i8,
    pub move_time: u32,
    pub prev_move_time: Option<u32>,
    pub vehicle_record_id: Option<u32>,
}

impl TransportState {
    pub fn new(transport: ActorId, local: Pose, seat: i8) -> Self {
        Self {
            transport,
            local,
            seat,
            move_time: 0,
            prev_move_time: None,
            vehicle_record_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertiaState {
    pub id: u32,
    pub force: Vec3,
    /// Remaining lifetime in milliseconds
    pub lifetime: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedFlightState {
    pub forward_velocity: f32,
    pub vertical_velocity: f32,
}

/// The authoritative movement snapshot of one actor.
///
/// Flag words and the timestamp are private: every mutation goes through
/// methods that keep the exclusive flag groups resolved, the fall record in
/// step with the falling flags and the timestamp non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub guid: ActorId,
    flags: MovementFlags,
    flags2: MovementFlags2,
    flags3: MovementFlags3,
    timestamp: u32,
    pub pose: Pose,
    pub step_up_start_elevation: f32,
    /// Forces removed since the last outbound update
    pub removed_forces: Vec<ForceId>,
    pub move_index: u32,
    pub transport: Option<TransportState>,
    pub fall: Option<FallState>,
    /// Reserved presence bit; no record follows it on the wire
    pub spline_enabled: bool,
    pub inertia: Option<InertiaState>,
    pub advanced_flight: Option<AdvancedFlightState>,
}

impl MotionState {
    pub fn new(guid: ActorId, pose: Pose) -> Self {
        Self {
            guid,
            flags: MovementFlags::empty(),
            flags2: MovementFlags2::empty(),
            flags3: MovementFlags3::empty(),
            timestamp: 0,
            pose,
            step_up_start_elevation: 0.0,
            removed_forces: Vec::new(),
            move_index: 0,
            transport: None,
            fall: None,
            spline_enabled: false,
            inertia: None,
            advanced_flight: None,
        }
    }

    pub fn flags(&self) -> MovementFlags {
        self.flags
    }

    pub fn flags2(&self) -> MovementFlags2 {
        self.flags2
    }

    pub fn flags3(&self) -> MovementFlags3 {
        self.flags3
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn has_flag(&self, flag: MovementFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flags(&mut self, flags: MovementFlags) {
        self.flags = flags.sanitized();
        self.reconcile_fall();
    }

    pub fn add_flags(&mut self, flags: MovementFlags) {
        self.set_flags(self.flags | flags);
    }

    pub fn remove_flags(&mut self, flags: MovementFlags) {
        let mut next = self.flags;
        next.remove(flags);
        self.set_flags(next);
    }

    pub fn set_flags2(&mut self, flags: MovementFlags2) {
        self.flags2 = flags;
    }

    pub fn update_flags2(&mut self, flags: MovementFlags2, enabled: bool) {
        self.flags2.set(flags, enabled);
    }

    pub fn set_flags3(&mut self, flags: MovementFlags3) {
        self.flags3 = flags;
        if self.flags3.contains(MovementFlags3::DISABLE_INERTIA) {
            self.inertia = None;
        }
    }

    pub fn update_flags3(&mut self, flags: MovementFlags3, enabled: bool) {
        let mut next = self.flags3;
        next.set(flags, enabled);
        self.set_flags3(next);
    }

    /// Move the timestamp forward; earlier values are ignored
    pub fn advance_timestamp(&mut self, timestamp: u32) {
        self.timestamp = self.timestamp.max(timestamp);
    }

    pub fn is_moving(&self) -> bool {
        self.flags.is_moving()
    }

    pub fn is_rooted(&self) -> bool {
        self.flags.contains(MovementFlags::ROOT)
    }

    pub fn is_falling(&self) -> bool {
        self.flags.is_falling()
    }

    /// Start a fall with the given vertical and optional horizontal motion
    pub fn begin_fall(&mut self, vertical_speed: f32, direction: Option<FallDirection>) {
        self.fall = Some(FallState {
            fall_time: 0,
            vertical_speed,
            direction,
        });
        self.add_flags(MovementFlags::FALLING);
    }

    /// Land: clear falling flags and the fall record
    pub fn land(&mut self) {
        self.fall = None;
        self.remove_flags(MovementFlags::MASK_FALLING);
    }

    /// Replace capability bits with those of `authority`, keeping every
    /// other bit, then re-resolve the flag groups
    pub fn adopt_capabilities(&mut self, authority: &MotionState) {
        self.flags = self
            .flags
            .with_bits_from(authority.flags, MovementFlags::MASK_CAPABILITY);
        self.flags2 = self
            .flags2
            .with_bits_from(authority.flags2, MovementFlags2::MASK_CAPABILITY);
        self.flags3 = self
            .flags3
            .with_bits_from(authority.flags3, MovementFlags3::MASK_CAPABILITY);
        self.sanitize();
    }

    /// Re-apply every invariant, used after bulk field assignment
    pub fn sanitize(&mut self) {
        self.set_flags(self.flags);
        self.set_flags3(self.flags3);
    }

    /// Fall record is present iff a falling flag is set or the fall timer
    /// still runs.
    fn reconcile_fall(&mut self) {
        let falling = self.flags.is_falling();
        match self.fall {
            Some(fall) if !falling && fall.fall_time == 0 => self.fall = None,
            None if falling => self.fall = Some(FallState::default()),
            _ => {}
        }
    }

    /// Overwrite all three flag words at once
    pub(crate) fn replace_flags(
        &mut self,
        flags: MovementFlags,
        flags2: MovementFlags2,
        flags3: MovementFlags3,
    ) {
        self.flags2 = flags2;
        self.flags3 = flags3;
        self.flags = flags;
    }

    pub(crate) fn replace_timestamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
    }
}
