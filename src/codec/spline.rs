//! Spline description layout

use crate::movement::flags::SplineFlags;
use crate::movement::spline::{
    AnimTier, AnimTierTransition, CompressedPath, FadeEffect, Facing, JumpArc, PackedOffset,
    PathEncoding, SplineDescription, SplineEffects,
};
use crate::movement::ActorId;

use super::bits::{BitReader, BitWriter};
use super::error::{CodecError, DecodeError};
use super::motion::{read_vec3, write_vec3};

/// Upper bound on waypoints in one description
pub const MAX_WAYPOINTS: u32 = 1024;

fn read_count(r: &mut BitReader<'_>, field: &'static str) -> Result<u32, CodecError> {
    let count = r.read_u32()?;
    if count > MAX_WAYPOINTS {
        return Err(DecodeError::TooMany {
            field,
            count,
            limit: MAX_WAYPOINTS,
        }
        .into());
    }
    Ok(count)
}

pub fn write_description(w: &mut BitWriter, desc: &SplineDescription) {
    let compressed = matches!(desc.path, PathEncoding::Compressed(_));

    w.write_bits(desc.flags.bits(), SplineFlags::WIDTH);
    w.write_bits(desc.facing.code(), Facing::BITS);
    w.write_bit(compressed);
    w.write_bit(desc.transport.is_some());
    w.write_bit(desc.effects.jump.is_some());
    w.write_bit(desc.effects.fade.is_some());
    w.write_bit(desc.effects.anim_tier.is_some());
    if let Some(anim) = desc.effects.anim_tier {
        w.write_bits(anim.tier as u32, AnimTier::BITS);
    }

    w.write_u64(desc.actor.0);
    w.write_u32(desc.spline_id);
    w.write_u32(desc.duration_ms);
    w.write_u32(desc.time_passed);
    if let Some(transport) = desc.transport {
        w.write_u64(transport.0);
    }

    match desc.facing {
        Facing::None => {}
        Facing::Spot { point } => write_vec3(w, point),
        Facing::Target { actor } => w.write_u64(actor.0),
        Facing::Angle { angle } => w.write_f32(angle),
    }

    match &desc.path {
        PathEncoding::Compressed(path) => {
            write_vec3(w, path.start);
            write_vec3(w, path.destination);
            w.write_u32(path.offsets.len() as u32);
            for offset in &path.offsets {
                w.write_u32(offset.0);
            }
        }
        PathEncoding::Uncompressed(points) => {
            w.write_u32(points.len() as u32);
            for point in points {
                write_vec3(w, *point);
            }
        }
    }

    if let Some(jump) = desc.effects.jump {
        w.write_u32(jump.start_offset_ms);
        w.write_f32(jump.vertical_acceleration);
    }
    if let Some(fade) = desc.effects.fade {
        w.write_u32(fade.start_offset_ms);
    }
    if let Some(anim) = desc.effects.anim_tier {
        w.write_u32(anim.start_offset_ms);
    }
}

pub fn read_description(r: &mut BitReader<'_>) -> Result<SplineDescription, CodecError> {
    let flags = SplineFlags::from_bits_truncate(r.read_bits(SplineFlags::WIDTH)?);
    let facing_code = r.read_bits(Facing::BITS)?;
    let compressed = r.read_bit()?;
    let has_transport = r.read_bit()?;
    let has_jump = r.read_bit()?;
    let has_fade = r.read_bit()?;
    let has_anim = r.read_bit()?;
    let tier: Option<AnimTier> = if has_anim {
        Some(r.read_enum(AnimTier::BITS, "anim_tier")?)
    } else {
        None
    };

    let actor = ActorId(r.read_u64()?);
    let spline_id = r.read_u32()?;
    let duration_ms = r.read_u32()?;
    let time_passed = r.read_u32()?;
    let transport = if has_transport {
        Some(ActorId(r.read_u64()?))
    } else {
        None
    };

    let facing = match facing_code {
        0 => Facing::None,
        1 => Facing::Spot {
            point: read_vec3(r)?,
        },
        2 => Facing::Target {
            actor: ActorId(r.read_u64()?),
        },
        _ => Facing::Angle {
            angle: r.read_f32()?,
        },
    };

    let path = if compressed {
        let start = read_vec3(r)?;
        let destination = read_vec3(r)?;
        let count = read_count(r, "offsets")?;
        let offsets = (0..count)
            .map(|_| r.read_u32().map(PackedOffset))
            .collect::<Result<_, _>>()?;
        PathEncoding::Compressed(CompressedPath {
            start,
            destination,
            offsets,
        })
    } else {
        let count = read_count(r, "waypoints")?;
        let points = (0..count)
            .map(|_| read_vec3(r))
            .collect::<Result<_, _>>()?;
        PathEncoding::Uncompressed(points)
    };

    let jump = if has_jump {
        Some(JumpArc {
            start_offset_ms: r.read_u32()?,
            vertical_acceleration: r.read_f32()?,
        })
    } else {
        None
    };
    let fade = if has_fade {
        Some(FadeEffect {
            start_offset_ms: r.read_u32()?,
        })
    } else {
        None
    };
    let anim_tier = match tier {
        Some(tier) => Some(AnimTierTransition {
            tier,
            start_offset_ms: r.read_u32()?,
        }),
        None => None,
    };

    Ok(SplineDescription {
        actor,
        spline_id,
        flags,
        facing,
        duration_ms,
        time_passed,
        path,
        effects: SplineEffects {
            jump,
            fade,
            anim_tier,
        },
        transport,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::arbitrary::random_description;
    use crate::movement::spline::{MoveSpec, SplineEngine, SplineTiming};
    use crate::movement::state::Pose;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn round_trip(desc: &SplineDescription) -> Result<SplineDescription, CodecError> {
        let mut w = BitWriter::new();
        write_description(&mut w, desc);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let decoded = read_description(&mut r)?;
        r.finish()?;
        Ok(decoded)
    }

    #[test]
    fn random_descriptions_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..300 {
            let desc = random_description(&mut rng);
            assert_eq!(round_trip(&desc).unwrap(), desc);
        }
    }

    #[test]
    fn engine_description_replays_to_same_points() {
        let mut engine = SplineEngine::new(0);
        let lookup = |_: ActorId| -> Option<Pose> { None };
        let spec = MoveSpec::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(3.1, 1.2, 0.0),
                Vec3::new(6.0, 4.4, 0.5),
                Vec3::new(10.0, 5.0, 1.0),
            ],
            SplineTiming::Velocity(5.0),
        );
        engine.start(ActorId(1), spec, &lookup).unwrap();
        let desc = engine.describe(ActorId(1)).unwrap();
        assert!(matches!(desc.path, PathEncoding::Compressed(_)));

        let decoded = round_trip(&desc).unwrap();
        let path = engine.path(ActorId(1)).unwrap();
        assert_eq!(decoded.path.waypoints(), path.waypoints());
    }

    #[test]
    fn waypoint_count_is_capped() {
        let mut w = BitWriter::new();
        w.write_bits(0, SplineFlags::WIDTH);
        w.write_bits(0, Facing::BITS);
        w.write_bits(0, 5);
        w.write_u64(1);
        w.write_u32(1);
        w.write_u32(1000);
        w.write_u32(0);
        w.write_u32(MAX_WAYPOINTS + 1);
        let bytes = w.finish();
        assert!(matches!(
            read_description(&mut BitReader::new(&bytes)),
            Err(CodecError::Decode(DecodeError::TooMany { .. }))
        ));
    }

    #[test]
    fn unknown_anim_tier_is_rejected() {
        let mut w = BitWriter::new();
        w.write_bits(0, SplineFlags::WIDTH);
        w.write_bits(0, Facing::BITS);
        w.write_bits(0b00001, 5);
        w.write_bits(6, AnimTier::BITS);
        let bytes = w.finish();
        assert_eq!(
            read_description(&mut BitReader::new(&bytes)).unwrap_err(),
            CodecError::Decode(DecodeError::OutOfDomain {
                field: "anim_tier",
                value: 6
            })
        );
    }
}
