//! MotionState wire layout

use bytes::Bytes;

use crate::movement::flags::{MovementFlags, MovementFlags2, MovementFlags3};
use crate::movement::state::{
    AdvancedFlightState, FallDirection, FallState, InertiaState, MotionState, Pose,
    TransportState,
};
use crate::movement::{ActorId, ForceId};

use super::bits::{BitReader, BitWriter};
use super::error::{CodecError, DecodeError};

/// Upper bound on removed-force ids accepted in one update
pub const MAX_REMOVED_FORCES: u32 = 64;

pub(crate) fn write_vec3(w: &mut BitWriter, v: glam::Vec3) {
    w.write_f32(v.x);
    w.write_f32(v.y);
    w.write_f32(v.z);
}

pub(crate) fn read_vec3(r: &mut BitReader<'_>) -> Result<glam::Vec3, CodecError> {
    Ok(glam::Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?))
}

pub(crate) fn write_pose(w: &mut BitWriter, pose: &Pose) {
    write_vec3(w, pose.position);
    w.write_f32(pose.orientation);
    w.write_f32(pose.pitch);
}

pub(crate) fn read_pose(r: &mut BitReader<'_>) -> Result<Pose, CodecError> {
    let position = read_vec3(r)?;
    Ok(Pose {
        position,
        orientation: r.read_f32()?,
        pitch: r.read_f32()?,
    })
}

pub fn write_motion(w: &mut BitWriter, state: &MotionState) {
    w.write_u64(state.guid.0);
    w.write_bits(state.flags().bits(), MovementFlags::WIDTH);
    w.write_bits(state.flags2().bits(), MovementFlags2::WIDTH);
    w.write_bits(state.flags3().bits(), MovementFlags3::WIDTH);
    w.write_u32(state.timestamp());
    write_pose(w, &state.pose);
    w.write_f32(state.step_up_start_elevation);

    w.write_u32(state.removed_forces.len() as u32);
    for id in &state.removed_forces {
        w.write_u64(id.0);
    }
    w.write_u32(state.move_index);

    w.write_bit(state.transport.is_some());
    w.write_bit(state.fall.is_some());
    w.write_bit(state.spline_enabled);
    w.write_bit(state.inertia.is_some());
    w.write_bit(state.advanced_flight.is_some());

    if let Some(transport) = &state.transport {
        w.write_u64(transport.transport.0);
        write_pose(w, &transport.local);
        w.write_i8(transport.seat);
        w.write_u32(transport.move_time);
        w.write_bit(transport.prev_move_time.is_some());
        w.write_bit(transport.vehicle_record_id.is_some());
        if let Some(prev) = transport.prev_move_time {
            w.write_u32(prev);
        }
        if let Some(record) = transport.vehicle_record_id {
            w.write_u32(record);
        }
    }

    if let Some(fall) = &state.fall {
        w.write_u32(fall.fall_time);
        w.write_f32(fall.vertical_speed);
        w.write_bit(fall.direction.is_some());
        if let Some(direction) = fall.direction {
            w.write_f32(direction.sin_angle);
            w.write_f32(direction.cos_angle);
            w.write_f32(direction.horizontal_speed);
        }
    }

    if let Some(inertia) = &state.inertia {
        w.write_u32(inertia.id);
        write_vec3(w, inertia.force);
        w.write_u32(inertia.lifetime);
    }

    if let Some(flight) = &state.advanced_flight {
        w.write_f32(flight.forward_velocity);
        w.write_f32(flight.vertical_velocity);
    }
}

pub fn read_motion(r: &mut BitReader<'_>) -> Result<MotionState, CodecError> {
    let guid = ActorId(r.read_u64()?);
    let flags = MovementFlags::from_bits_truncate(r.read_bits(MovementFlags::WIDTH)?);
    let flags2 = MovementFlags2::from_bits_truncate(r.read_bits(MovementFlags2::WIDTH)?);
    let flags3 = MovementFlags3::from_bits_truncate(r.read_bits(MovementFlags3::WIDTH)?);
    let timestamp = r.read_u32()?;
    let pose = read_pose(r)?;

    let mut state = MotionState::new(guid, pose);
    state.replace_flags(flags, flags2, flags3);
    state.replace_timestamp(timestamp);
    state.step_up_start_elevation = r.read_f32()?;

    let count = r.read_u32()?;
    if count > MAX_REMOVED_FORCES {
        return Err(DecodeError::TooMany {
            field: "removed_forces",
            count,
            limit: MAX_REMOVED_FORCES,
        }
        .into());
    }
    state.removed_forces = (0..count)
        .map(|_| r.read_u64().map(ForceId))
        .collect::<Result<_, _>>()?;
    state.move_index = r.read_u32()?;

    let has_transport = r.read_bit()?;
    let has_fall = r.read_bit()?;
    state.spline_enabled = r.read_bit()?;
    let has_inertia = r.read_bit()?;
    let has_flight = r.read_bit()?;

    if has_transport {
        let transport = ActorId(r.read_u64()?);
        let local = read_pose(r)?;
        let seat = r.read_i8()?;
        let move_time = r.read_u32()?;
        let has_prev = r.read_bit()?;
        let has_record = r.read_bit()?;
        let prev_move_time = if has_prev { Some(r.read_u32()?) } else { None };
        let vehicle_record_id = if has_record { Some(r.read_u32()?) } else { None };
        state.transport = Some(TransportState {
            transport,
            local,
            seat,
            move_time,
            prev_move_time,
            vehicle_record_id,
        });
    }

    if has_fall {
        let fall_time = r.read_u32()?;
        let vertical_speed = r.read_f32()?;
        let direction = if r.read_bit()? {
            Some(FallDirection {
                sin_angle: r.read_f32()?,
                cos_angle: r.read_f32()?,
                horizontal_speed: r.read_f32()?,
            })
        } else {
            None
        };
        state.fall = Some(FallState {
            fall_time,
            vertical_speed,
            direction,
        });
    }

    if has_inertia {
        state.inertia = Some(InertiaState {
            id: r.read_u32()?,
            force: read_vec3(r)?,
            lifetime: r.read_u32()?,
        });
    }

    if has_flight {
        state.advanced_flight = Some(AdvancedFlightState {
            forward_velocity: r.read_f32()?,
            vertical_velocity: r.read_f32()?,
        });
    }

    // flags from the wire are never trusted
    state.sanitize();
    Ok(state)
}

/// Encode one movement snapshot on its own
pub fn encode(state: &MotionState) -> Bytes {
    let mut w = BitWriter::with_capacity(64);
    write_motion(&mut w, state);
    w.finish()
}

/// Decode one movement snapshot; the input must hold exactly one
pub fn decode(bytes: &[u8]) -> Result<MotionState, CodecError> {
    let mut r = BitReader::new(bytes);
    let state = read_motion(&mut r)?;
    r.finish()?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::arbitrary::random_motion;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn random_states_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let state = random_motion(&mut rng);
            let bytes = encode(&state);
            assert_eq!(decode(&bytes).unwrap(), state);
        }
    }

    #[test]
    fn absent_records_decode_to_none() {
        let state = MotionState::new(ActorId(42), Pose::new(1.0, 2.0, 3.0, 0.5));
        let decoded = decode(&encode(&state)).unwrap();
        assert!(decoded.transport.is_none());
        assert!(decoded.fall.is_none());
        assert!(decoded.inertia.is_none());
        assert!(decoded.advanced_flight.is_none());
        assert_eq!(decoded, state);
    }

    #[test]
    fn every_prefix_is_truncated() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let bytes = encode(&random_motion(&mut rng));
            for len in 0..bytes.len() {
                assert_eq!(
                    decode(&bytes[..len]),
                    Err(CodecError::Truncated),
                    "prefix of {len} bytes"
                );
            }
        }
    }

    #[test]
    fn contradictory_flags_are_resolved_on_decode() {
        let mut w = BitWriter::new();
        let mut state = MotionState::new(ActorId(1), Pose::default());
        state.replace_flags(
            MovementFlags::FORWARD | MovementFlags::BACKWARD | MovementFlags::STRAFE_LEFT,
            MovementFlags2::empty(),
            MovementFlags3::empty(),
        );
        write_motion(&mut w, &state);
        let decoded = decode(&w.finish()).unwrap();
        assert_eq!(decoded.flags(), MovementFlags::STRAFE_LEFT);
    }

    #[test]
    fn oversized_removed_force_list_is_rejected() {
        let mut state = MotionState::new(ActorId(1), Pose::default());
        state.removed_forces = (0..MAX_REMOVED_FORCES as u64 + 1).map(ForceId).collect();
        assert!(matches!(
            decode(&encode(&state)),
            Err(CodecError::Decode(DecodeError::TooMany { .. }))
        ));
    }

    #[test]
    fn trailing_garbage_is_a_decode_error() {
        let state = MotionState::new(ActorId(1), Pose::default());
        let mut bytes = encode(&state).to_vec();
        bytes.push(0);
        assert_eq!(
            decode(&bytes),
            Err(CodecError::Decode(DecodeError::TrailingBytes(1)))
        );
    }
}
