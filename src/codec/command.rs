//! Command, force and control snapshot layouts

use crate::movement::channel::ControlSnapshot;
use crate::movement::command::{Capability, CollisionHeightReason, MovementCommand};
use crate::movement::force::{ForceKind, MovementForce};
use crate::movement::mover::{Capabilities, SpeedAxis};
use crate::movement::{ActorId, ForceId};

use super::bits::{BitReader, BitWriter};
use super::error::{CodecError, DecodeError};
use super::motion::{read_motion, read_pose, read_vec3, write_motion, write_pose, write_vec3};

const KIND_BITS: u32 = 3;
const FORCE_KIND_BITS: u32 = 1;

/// Upper bound on forces carried by one snapshot
pub const MAX_SNAPSHOT_FORCES: u32 = 64;

fn kind_code(command: &MovementCommand) -> u32 {
    match command {
        MovementCommand::SetSpeed { .. } => 0,
        MovementCommand::SetCapability { .. } => 1,
        MovementCommand::Knockback { .. } => 2,
        MovementCommand::Teleport { .. } => 3,
        MovementCommand::ApplyForce { .. } => 4,
        MovementCommand::RemoveForce { .. } => 5,
        MovementCommand::SetCollisionHeight { .. } => 6,
        MovementCommand::SetVehicleRecord { .. } => 7,
    }
}

pub fn write_force(w: &mut BitWriter, force: &MovementForce) {
    w.write_bits(force.kind as u32, FORCE_KIND_BITS);
    w.write_bit(force.transport.is_some());
    w.write_u64(force.id.0);
    write_vec3(w, force.origin);
    write_vec3(w, force.direction);
    w.write_f32(force.magnitude);
    if let Some(transport) = force.transport {
        w.write_u64(transport.0);
    }
}

pub fn read_force(r: &mut BitReader<'_>) -> Result<MovementForce, CodecError> {
    let kind: ForceKind = r.read_enum(FORCE_KIND_BITS, "force_kind")?;
    let has_transport = r.read_bit()?;
    let id = ForceId(r.read_u64()?);
    let origin = read_vec3(r)?;
    let direction = read_vec3(r)?;
    let magnitude = r.read_f32()?;
    let transport = if has_transport {
        Some(ActorId(r.read_u64()?))
    } else {
        None
    };
    Ok(MovementForce {
        id,
        origin,
        direction,
        magnitude,
        transport,
        kind,
    })
}

pub fn write_command(w: &mut BitWriter, command: &MovementCommand) {
    w.write_bits(kind_code(command), KIND_BITS);
    match command {
        MovementCommand::SetSpeed { axis, speed } => {
            w.write_bits(*axis as u32, SpeedAxis::BITS);
            w.write_f32(*speed);
        }
        MovementCommand::SetCapability {
            capability,
            enabled,
        } => {
            w.write_bits(*capability as u32, Capability::BITS);
            w.write_bit(*enabled);
        }
        MovementCommand::Knockback {
            horizontal_speed,
            vertical_speed,
            direction,
        } => {
            w.write_f32(*horizontal_speed);
            w.write_f32(*vertical_speed);
            w.write_f32(*direction);
        }
        MovementCommand::Teleport { pose } => write_pose(w, pose),
        MovementCommand::ApplyForce { force } => write_force(w, force),
        MovementCommand::RemoveForce { id } => w.write_u64(id.0),
        MovementCommand::SetCollisionHeight {
            height,
            mount_display_id,
            reason,
        } => {
            w.write_bits(*reason as u32, CollisionHeightReason::BITS);
            w.write_f32(*height);
            w.write_u32(*mount_display_id);
        }
        MovementCommand::SetVehicleRecord { vehicle_record_id } => {
            w.write_u32(*vehicle_record_id);
        }
    }
}

pub fn read_command(r: &mut BitReader<'_>) -> Result<MovementCommand, CodecError> {
    let command = match r.read_bits(KIND_BITS)? {
        0 => MovementCommand::SetSpeed {
            axis: r.read_enum(SpeedAxis::BITS, "speed_axis")?,
            speed: r.read_f32()?,
        },
        1 => MovementCommand::SetCapability {
            capability: r.read_enum(Capability::BITS, "capability")?,
            enabled: r.read_bit()?,
        },
        2 => MovementCommand::Knockback {
            horizontal_speed: r.read_f32()?,
            vertical_speed: r.read_f32()?,
            direction: r.read_f32()?,
        },
        3 => MovementCommand::Teleport {
            pose: read_pose(r)?,
        },
        4 => MovementCommand::ApplyForce {
            force: read_force(r)?,
        },
        5 => MovementCommand::RemoveForce {
            id: ForceId(r.read_u64()?),
        },
        6 => {
            let reason = r.read_enum(CollisionHeightReason::BITS, "collision_reason")?;
            MovementCommand::SetCollisionHeight {
                height: r.read_f32()?,
                mount_display_id: r.read_u32()?,
                reason,
            }
        }
        _ => MovementCommand::SetVehicleRecord {
            vehicle_record_id: r.read_u32()?,
        },
    };
    Ok(command)
}

pub fn write_snapshot(w: &mut BitWriter, snapshot: &ControlSnapshot) {
    w.write_u64(snapshot.actor.0);
    write_motion(w, &snapshot.motion);
    for (_, speed) in snapshot.capabilities.speeds.iter() {
        w.write_f32(speed);
    }
    w.write_f32(snapshot.capabilities.collision_height);
    w.write_u32(snapshot.capabilities.mount_display_id);
    w.write_u32(snapshot.capabilities.vehicle_record_id);
    w.write_u32(snapshot.forces.len() as u32);
    for force in &snapshot.forces {
        write_force(w, force);
    }
}

pub fn read_snapshot(r: &mut BitReader<'_>) -> Result<ControlSnapshot, CodecError> {
    let actor = ActorId(r.read_u64()?);
    let motion = read_motion(r)?;
    let mut capabilities = Capabilities::default();
    for axis in SpeedAxis::ALL {
        capabilities.speeds.set(axis, r.read_f32()?);
    }
    capabilities.collision_height = r.read_f32()?;
    capabilities.mount_display_id = r.read_u32()?;
    capabilities.vehicle_record_id = r.read_u32()?;

    let count = r.read_u32()?;
    if count > MAX_SNAPSHOT_FORCES {
        return Err(DecodeError::TooMany {
            field: "forces",
            count,
            limit: MAX_SNAPSHOT_FORCES,
        }
        .into());
    }
    let forces = (0..count)
        .map(|_| read_force(r))
        .collect::<Result<_, _>>()?;

    Ok(ControlSnapshot {
        actor,
        motion,
        capabilities,
        forces,
    })
}
