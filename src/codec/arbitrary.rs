//! Seeded generators for codec property tests

use glam::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::movement::channel::ControlSnapshot;
use crate::movement::command::{Capability, CollisionHeightReason, MovementCommand};
use crate::movement::flags::{MovementFlags, MovementFlags2, MovementFlags3, SplineFlags};
use crate::movement::force::{ForceKind, MovementForce};
use crate::movement::mover::{Capabilities, SpeedAxis};
use crate::movement::spline::{
    AnimTier, AnimTierTransition, CompressedPath, FadeEffect, Facing, JumpArc, PackedOffset,
    PathEncoding, SplineDescription, SplineEffects,
};
use crate::movement::state::{
    AdvancedFlightState, FallDirection, FallState, InertiaState, MotionState, Pose,
    TransportState,
};
use crate::movement::{ActorId, ForceId};

pub fn random_f32(rng: &mut ChaCha8Rng) -> f32 {
    rng.gen_range(-5000.0..5000.0)
}

pub fn random_vec3(rng: &mut ChaCha8Rng) -> Vec3 {
    Vec3::new(random_f32(rng), random_f32(rng), random_f32(rng))
}

pub fn random_pose(rng: &mut ChaCha8Rng) -> Pose {
    Pose {
        position: random_vec3(rng),
        orientation: rng.gen_range(0.0..std::f32::consts::TAU),
        pitch: rng.gen_range(-1.5..1.5),
    }
}

fn maybe<T>(rng: &mut ChaCha8Rng, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> Option<T> {
    if rng.gen_bool(0.5) {
        Some(f(rng))
    } else {
        None
    }
}

/// A sanitized snapshot with every optional record present at random
pub fn random_motion(rng: &mut ChaCha8Rng) -> MotionState {
    let mut state = MotionState::new(ActorId(rng.gen()), random_pose(rng));
    state.set_flags(MovementFlags::from_bits_truncate(rng.gen()));
    state.set_flags2(MovementFlags2::from_bits_truncate(rng.gen()));
    state.set_flags3(MovementFlags3::from_bits_truncate(rng.gen()));
    state.advance_timestamp(rng.gen());
    state.step_up_start_elevation = random_f32(rng);
    state.removed_forces = (0..rng.gen_range(0..5)).map(|_| ForceId(rng.gen())).collect();
    state.move_index = rng.gen();
    state.spline_enabled = rng.gen_bool(0.5);

    state.transport = maybe(rng, |rng| TransportState {
        transport: ActorId(rng.gen()),
        local: random_pose(rng),
        seat: rng.gen(),
        move_time: rng.gen(),
        prev_move_time: maybe(rng, |rng| rng.gen()),
        vehicle_record_id: maybe(rng, |rng| rng.gen()),
    });

    if state.is_falling() || rng.gen_bool(0.3) {
        state.fall = Some(FallState {
            fall_time: rng.gen_range(1..10_000),
            vertical_speed: rng.gen_range(-60.0..60.0),
            direction: maybe(rng, |rng| {
                FallDirection::from_angle(rng.gen_range(0.0..6.28), rng.gen_range(0.0..30.0))
            }),
        });
    }

    if !state.flags3().contains(MovementFlags3::DISABLE_INERTIA) {
        state.inertia = maybe(rng, |rng| InertiaState {
            id: rng.gen(),
            force: random_vec3(rng),
            lifetime: rng.gen(),
        });
    }

    state.advanced_flight = maybe(rng, |rng| AdvancedFlightState {
        forward_velocity: random_f32(rng),
        vertical_velocity: random_f32(rng),
    });

    state.sanitize();
    state
}

pub fn random_force(rng: &mut ChaCha8Rng) -> MovementForce {
    MovementForce {
        id: ForceId(rng.gen()),
        origin: random_vec3(rng),
        direction: random_vec3(rng).normalize_or_zero(),
        magnitude: rng.gen_range(0.0..50.0),
        transport: maybe(rng, |rng| ActorId(rng.gen())),
        kind: if rng.gen_bool(0.5) {
            ForceKind::Gravity
        } else {
            ForceKind::SingleDirectional
        },
    }
}

pub fn random_command(rng: &mut ChaCha8Rng) -> MovementCommand {
    match rng.gen_range(0..8) {
        0 => MovementCommand::SetSpeed {
            axis: SpeedAxis::ALL[rng.gen_range(0..SpeedAxis::COUNT)],
            speed: rng.gen_range(0.0..50.0),
        },
        1 => MovementCommand::SetCapability {
            capability: Capability::ALL[rng.gen_range(0..Capability::ALL.len())],
            enabled: rng.gen_bool(0.5),
        },
        2 => MovementCommand::Knockback {
            horizontal_speed: rng.gen_range(0.0..40.0),
            vertical_speed: rng.gen_range(-40.0..40.0),
            direction: rng.gen_range(0.0..6.28),
        },
        3 => MovementCommand::Teleport {
            pose: random_pose(rng),
        },
        4 => MovementCommand::ApplyForce {
            force: random_force(rng),
        },
        5 => MovementCommand::RemoveForce {
            id: ForceId(rng.gen()),
        },
        6 => MovementCommand::SetCollisionHeight {
            height: rng.gen_range(0.5..10.0),
            mount_display_id: rng.gen(),
            reason: match rng.gen_range(0..3) {
                0 => CollisionHeightReason::Scale,
                1 => CollisionHeightReason::Mount,
                _ => CollisionHeightReason::Force,
            },
        },
        _ => MovementCommand::SetVehicleRecord {
            vehicle_record_id: rng.gen(),
        },
    }
}

pub fn random_snapshot(rng: &mut ChaCha8Rng) -> ControlSnapshot {
    let mut capabilities = Capabilities::default();
    for axis in SpeedAxis::ALL {
        capabilities.speeds.set(axis, rng.gen_range(0.0..50.0));
    }
    capabilities.collision_height = rng.gen_range(0.5..10.0);
    capabilities.mount_display_id = rng.gen();
    capabilities.vehicle_record_id = rng.gen();

    let motion = random_motion(rng);
    ControlSnapshot {
        actor: motion.guid,
        motion,
        capabilities,
        forces: (0..rng.gen_range(0..4)).map(|_| random_force(rng)).collect(),
    }
}

pub fn random_description(rng: &mut ChaCha8Rng) -> SplineDescription {
    let facing = match rng.gen_range(0..4) {
        0 => Facing::None,
        1 => Facing::Spot {
            point: random_vec3(rng),
        },
        2 => Facing::Target {
            actor: ActorId(rng.gen()),
        },
        _ => Facing::Angle {
            angle: rng.gen_range(0.0..6.28),
        },
    };

    let path = if rng.gen_bool(0.5) {
        PathEncoding::Compressed(CompressedPath {
            start: random_vec3(rng),
            destination: random_vec3(rng),
            offsets: (0..rng.gen_range(0..6))
                .map(|_| PackedOffset(rng.gen()))
                .collect(),
        })
    } else {
        PathEncoding::Uncompressed((0..rng.gen_range(1..8)).map(|_| random_vec3(rng)).collect())
    };

    let duration_ms = rng.gen_range(1..60_000);
    SplineDescription {
        actor: ActorId(rng.gen()),
        spline_id: rng.gen(),
        flags: SplineFlags::from_bits_truncate(rng.gen()),
        facing,
        duration_ms,
        time_passed: rng.gen_range(0..duration_ms),
        path,
        effects: SplineEffects {
            jump: maybe(rng, |rng| JumpArc {
                start_offset_ms: rng.gen_range(0..duration_ms),
                vertical_acceleration: rng.gen_range(0.0..40.0),
            }),
            fade: maybe(rng, |rng| FadeEffect {
                start_offset_ms: rng.gen_range(0..duration_ms),
            }),
            anim_tier: maybe(rng, |rng| AnimTierTransition {
                tier: AnimTier::try_from(rng.gen_range(0..5)).unwrap_or(AnimTier::Ground),
                start_offset_ms: rng.gen_range(0..duration_ms),
            }),
        },
        transport: maybe(rng, |rng| ActorId(rng.gen())),
    }
}
