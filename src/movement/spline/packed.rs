//! Delta compression of waypoint lists
//!
//! A compressed path keeps its first and last points absolute. Every
//! interior point is stored as a quantized offset from the midpoint of the
//! two, packed into 32 bits: 11 bits x, 11 bits y, 10 bits z, each a signed
//! count of quarter units.

use glam::Vec3;

use super::SplineError;

const UNIT: f32 = 0.25;
const X_BITS: u32 = 11;
const Y_BITS: u32 = 11;
const Z_BITS: u32 = 10;

/// One interior waypoint, packed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedOffset(pub u32);

fn quantize(value: f32, bits: u32) -> Option<u32> {
    let steps = (value / UNIT).round();
    let limit = (1i32 << (bits - 1)) as f32;
    if !(steps >= -limit && steps < limit) {
        return None;
    }
    Some((steps as i32 as u32) & ((1 << bits) - 1))
}

fn dequantize(field: u32, bits: u32) -> f32 {
    // sign-extend from `bits`
    let shift = 32 - bits;
    (((field << shift) as i32) >> shift) as f32 * UNIT
}

impl PackedOffset {
    /// Pack `offset`; `None` when a component does not fit
    pub fn pack(offset: Vec3) -> Option<Self> {
        let x = quantize(offset.x, X_BITS)?;
        let y = quantize(offset.y, Y_BITS)?;
        let z = quantize(offset.z, Z_BITS)?;
        Some(Self(x | (y << X_BITS) | (z << (X_BITS + Y_BITS))))
    }

    pub fn unpack(self) -> Vec3 {
        let x = self.0 & ((1 << X_BITS) - 1);
        let y = (self.0 >> X_BITS) & ((1 << Y_BITS) - 1);
        let z = self.0 >> (X_BITS + Y_BITS);
        Vec3::new(
            dequantize(x, X_BITS),
            dequantize(y, Y_BITS),
            dequantize(z, Z_BITS),
        )
    }
}

/// A waypoint list in its bandwidth-saving form
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedPath {
    pub start: Vec3,
    pub destination: Vec3,
    pub offsets: Vec<PackedOffset>,
}

impl CompressedPath {
    /// Compress `points` (at least two) around the midpoint of its ends
    pub fn compress(points: &[Vec3]) -> Result<Self, SplineError> {
        let (start, destination) = match points {
            [] => return Err(SplineError::EmptyPath),
            [only] => (*only, *only),
            [first, .., last] => (*first, *last),
        };
        let middle = midpoint(start, destination);

        let interior = if points.len() > 2 {
            &points[1..points.len() - 1]
        } else {
            &[][..]
        };

        let offsets = interior
            .iter()
            .enumerate()
            .map(|(i, point)| {
                PackedOffset::pack(middle - *point)
                    .ok_or(SplineError::OffsetOutOfRange { index: i + 1 })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            start,
            destination,
            offsets,
        })
    }

    pub fn midpoint(&self) -> Vec3 {
        midpoint(self.start, self.destination)
    }

    /// Absolute waypoints, deterministic for a given compressed form
    pub fn expand(&self) -> Vec<Vec3> {
        let middle = self.midpoint();
        let mut points = Vec::with_capacity(self.offsets.len() + 2);
        points.push(self.start);
        points.extend(self.offsets.iter().map(|offset| middle - offset.unpack()));
        points.push(self.destination);
        points
    }

    pub fn point_count(&self) -> usize {
        self.offsets.len() + 2
    }
}

fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn pack_unpack_exact_on_grid() {
        let offset = Vec3::new(-12.25, 100.5, -3.75);
        let packed = PackedOffset::pack(offset).expect("fits");
        assert_eq!(packed.unpack(), offset);
    }

    #[test]
    fn pack_rejects_out_of_range() {
        assert!(PackedOffset::pack(Vec3::new(300.0, 0.0, 0.0)).is_none());
        assert!(PackedOffset::pack(Vec3::new(0.0, 0.0, 128.0)).is_none());
        assert!(PackedOffset::pack(Vec3::new(0.0, 0.0, -128.0)).is_some());
        assert!(PackedOffset::pack(Vec3::new(f32::NAN, 0.0, 0.0)).is_none());
    }

    #[test]
    fn recompressing_expansion_reproduces_compressed_form() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xc0ffee);
        for _ in 0..256 {
            let start = Vec3::new(
                rng.gen_range(-8000.0..8000.0),
                rng.gen_range(-8000.0..8000.0),
                rng.gen_range(-200.0..200.0),
            );
            let destination = start
                + Vec3::new(
                    rng.gen_range(-150.0..150.0),
                    rng.gen_range(-150.0..150.0),
                    rng.gen_range(-50.0..50.0),
                );
            let count = rng.gen_range(0..12);
            let offsets = (0..count)
                .map(|_| {
                    let x: i32 = rng.gen_range(-1024..1024);
                    let y: i32 = rng.gen_range(-1024..1024);
                    let z: i32 = rng.gen_range(-512..512);
                    PackedOffset(
                        (x as u32 & 0x7ff) | ((y as u32 & 0x7ff) << 11) | ((z as u32 & 0x3ff) << 22),
                    )
                })
                .collect();
            let compressed = CompressedPath {
                start,
                destination,
                offsets,
            };

            let expanded = compressed.expand();
            assert_eq!(expanded.len(), compressed.point_count());

            let again = CompressedPath::compress(&expanded).expect("expanded path recompresses");
            assert_eq!(again, compressed);
            // expansion is deterministic
            assert_eq!(again.expand(), expanded);
        }
    }

    #[test]
    fn compression_error_stays_under_half_a_step() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(3.1, 4.07, 0.33),
            Vec3::new(9.9, -2.2, 1.0),
            Vec3::new(20.0, 0.0, 0.0),
        ];
        let expanded = CompressedPath::compress(&points).expect("fits").expand();
        for (a, b) in points.iter().zip(&expanded) {
            assert!((*a - *b).abs().max_element() <= 0.125 + 1e-4);
        }
    }
}
