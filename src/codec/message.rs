//! Framed messages exchanged with clients
//!
//! Every frame starts with a little-endian u16 opcode. Server opcodes live
//! in `0x00..0x10`, client opcodes in `0x10..0x20`.

use bytes::Bytes;

use crate::movement::channel::ControlSnapshot;
use crate::movement::command::{CollisionHeightReason, MovementCommand};
use crate::movement::spline::SplineDescription;
use crate::movement::state::{MotionState, Pose};
use crate::movement::ActorId;

use super::bits::{BitReader, BitWriter};
use super::command::{read_command, read_snapshot, write_command, write_snapshot};
use super::error::{CodecError, DecodeError};
use super::motion::{read_motion, read_pose, write_motion, write_pose};
use super::spline::{read_description, write_description};

mod opcode {
    pub const MOVEMENT_UPDATE: u16 = 0x01;
    pub const MONSTER_MOVE: u16 = 0x02;
    pub const COMMAND: u16 = 0x03;
    pub const CONTROL_SNAPSHOT: u16 = 0x04;
    pub const CYCLIC_RESYNC: u16 = 0x05;
    pub const STATE_CHANGE: u16 = 0x06;
    pub const ACTOR_LEFT: u16 = 0x07;

    pub const CLIENT_MOVEMENT_UPDATE: u16 = 0x11;
    pub const SPLINE_ARRIVED: u16 = 0x12;
    pub const KNOCKBACK_ACK: u16 = 0x13;
    pub const TELEPORT_ACK: u16 = 0x14;
    pub const COLLISION_HEIGHT_ACK: u16 = 0x15;
    pub const VEHICLE_RECORD_ACK: u16 = 0x16;
    pub const ACK: u16 = 0x17;
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full movement state of one actor
    MovementUpdate(MotionState),
    /// A server-driven path for observers to replay
    MonsterMove(SplineDescription),
    /// Sequenced command the controller must acknowledge
    Command {
        actor: ActorId,
        seq: u32,
        command: MovementCommand,
    },
    /// Sent to a controller when it takes over a mover
    ControlSnapshot(ControlSnapshot),
    /// Periodic drift correction for cyclic paths
    CyclicResync {
        actor: ActorId,
        spline_id: u32,
        time_passed: u32,
    },
    /// Unsequenced change to a server-driven mover
    StateChange {
        actor: ActorId,
        command: MovementCommand,
    },
    ActorLeft { actor: ActorId },
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    MovementUpdate(MotionState),
    SplineArrived {
        actor: ActorId,
        spline_id: u32,
        pose: Pose,
    },
    KnockbackAck {
        actor: ActorId,
        seq: u32,
    },
    TeleportAck {
        actor: ActorId,
        seq: u32,
        move_time: u32,
    },
    CollisionHeightAck {
        actor: ActorId,
        seq: u32,
        height: f32,
        mount_display_id: u32,
        reason: CollisionHeightReason,
    },
    VehicleRecordAck {
        actor: ActorId,
        seq: u32,
        vehicle_record_id: u32,
    },
    /// Ack carrying only a sequence number
    Ack { actor: ActorId, seq: u32 },
}

impl ClientMessage {
    /// Actor the message is about
    pub fn actor(&self) -> ActorId {
        match self {
            Self::MovementUpdate(state) => state.guid,
            Self::SplineArrived { actor, .. }
            | Self::KnockbackAck { actor, .. }
            | Self::TeleportAck { actor, .. }
            | Self::CollisionHeightAck { actor, .. }
            | Self::VehicleRecordAck { actor, .. }
            | Self::Ack { actor, .. } => *actor,
        }
    }
}

fn write_actor_seq(w: &mut BitWriter, actor: ActorId, seq: u32) {
    w.write_u64(actor.0);
    w.write_u32(seq);
}

fn read_actor_seq(r: &mut BitReader<'_>) -> Result<(ActorId, u32), CodecError> {
    Ok((ActorId(r.read_u64()?), r.read_u32()?))
}

impl ServerMessage {
    pub fn encode(&self) -> Bytes {
        let mut w = BitWriter::with_capacity(64);
        match self {
            Self::MovementUpdate(state) => {
                w.write_u16(opcode::MOVEMENT_UPDATE);
                write_motion(&mut w, state);
            }
            Self::MonsterMove(desc) => {
                w.write_u16(opcode::MONSTER_MOVE);
                write_description(&mut w, desc);
            }
            Self::Command {
                actor,
                seq,
                command,
            } => {
                w.write_u16(opcode::COMMAND);
                write_actor_seq(&mut w, *actor, *seq);
                write_command(&mut w, command);
            }
            Self::ControlSnapshot(snapshot) => {
                w.write_u16(opcode::CONTROL_SNAPSHOT);
                write_snapshot(&mut w, snapshot);
            }
            Self::CyclicResync {
                actor,
                spline_id,
                time_passed,
            } => {
                w.write_u16(opcode::CYCLIC_RESYNC);
                w.write_u64(actor.0);
                w.write_u32(*spline_id);
                w.write_u32(*time_passed);
            }
            Self::StateChange { actor, command } => {
                w.write_u16(opcode::STATE_CHANGE);
                w.write_u64(actor.0);
                write_command(&mut w, command);
            }
            Self::ActorLeft { actor } => {
                w.write_u16(opcode::ACTOR_LEFT);
                w.write_u64(actor.0);
            }
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = BitReader::new(bytes);
        let message = match r.read_u16()? {
            opcode::MOVEMENT_UPDATE => Self::MovementUpdate(read_motion(&mut r)?),
            opcode::MONSTER_MOVE => Self::MonsterMove(read_description(&mut r)?),
            opcode::COMMAND => {
                let (actor, seq) = read_actor_seq(&mut r)?;
                Self::Command {
                    actor,
                    seq,
                    command: read_command(&mut r)?,
                }
            }
            opcode::CONTROL_SNAPSHOT => Self::ControlSnapshot(read_snapshot(&mut r)?),
            opcode::CYCLIC_RESYNC => Self::CyclicResync {
                actor: ActorId(r.read_u64()?),
                spline_id: r.read_u32()?,
                time_passed: r.read_u32()?,
            },
            opcode::STATE_CHANGE => Self::StateChange {
                actor: ActorId(r.read_u64()?),
                command: read_command(&mut r)?,
            },
            opcode::ACTOR_LEFT => Self::ActorLeft {
                actor: ActorId(r.read_u64()?),
            },
            other => return Err(DecodeError::UnknownOpcode(other).into()),
        };
        r.finish()?;
        Ok(message)
    }
}

impl ClientMessage {
    pub fn encode(&self) -> Bytes {
        let mut w = BitWriter::with_capacity(64);
        match self {
            Self::MovementUpdate(state) => {
                w.write_u16(opcode::CLIENT_MOVEMENT_UPDATE);
                write_motion(&mut w, state);
            }
            Self::SplineArrived {
                actor,
                spline_id,
                pose,
            } => {
                w.write_u16(opcode::SPLINE_ARRIVED);
                w.write_u64(actor.0);
                w.write_u32(*spline_id);
                write_pose(&mut w, pose);
            }
            Self::KnockbackAck { actor, seq } => {
                w.write_u16(opcode::KNOCKBACK_ACK);
                write_actor_seq(&mut w, *actor, *seq);
            }
            Self::TeleportAck {
                actor,
                seq,
                move_time,
            } => {
                w.write_u16(opcode::TELEPORT_ACK);
                write_actor_seq(&mut w, *actor, *seq);
                w.write_u32(*move_time);
            }
            Self::CollisionHeightAck {
                actor,
                seq,
                height,
                mount_display_id,
                reason,
            } => {
                w.write_u16(opcode::COLLISION_HEIGHT_ACK);
                write_actor_seq(&mut w, *actor, *seq);
                w.write_bits(*reason as u32, CollisionHeightReason::BITS);
                w.write_f32(*height);
                w.write_u32(*mount_display_id);
            }
            Self::VehicleRecordAck {
                actor,
                seq,
                vehicle_record_id,
            } => {
                w.write_u16(opcode::VEHICLE_RECORD_ACK);
                write_actor_seq(&mut w, *actor, *seq);
                w.write_u32(*vehicle_record_id);
            }
            Self::Ack { actor, seq } => {
                w.write_u16(opcode::ACK);
                write_actor_seq(&mut w, *actor, *seq);
            }
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = BitReader::new(bytes);
        let message = match r.read_u16()? {
            opcode::CLIENT_MOVEMENT_UPDATE => Self::MovementUpdate(read_motion(&mut r)?),
            opcode::SPLINE_ARRIVED => Self::SplineArrived {
                actor: ActorId(r.read_u64()?),
                spline_id: r.read_u32()?,
                pose: read_pose(&mut r)?,
            },
            opcode::KNOCKBACK_ACK => {
                let (actor, seq) = read_actor_seq(&mut r)?;
                Self::KnockbackAck { actor, seq }
            }
            opcode::TELEPORT_ACK => {
                let (actor, seq) = read_actor_seq(&mut r)?;
                Self::TeleportAck {
                    actor,
                    seq,
                    move_time: r.read_u32()?,
                }
            }
            opcode::COLLISION_HEIGHT_ACK => {
                let (actor, seq) = read_actor_seq(&mut r)?;
                let reason = r.read_enum(CollisionHeightReason::BITS, "collision_reason")?;
                Self::CollisionHeightAck {
                    actor,
                    seq,
                    height: r.read_f32()?,
                    mount_display_id: r.read_u32()?,
                    reason,
                }
            }
            opcode::VEHICLE_RECORD_ACK => {
                let (actor, seq) = read_actor_seq(&mut r)?;
                Self::VehicleRecordAck {
                    actor,
                    seq,
                    vehicle_record_id: r.read_u32()?,
                }
            }
            opcode::ACK => {
                let (actor, seq) = read_actor_seq(&mut r)?;
                Self::Ack { actor, seq }
            }
            other => return Err(DecodeError::UnknownOpcode(other).into()),
        };
        r.finish()?;
        Ok(message)
    }
}
