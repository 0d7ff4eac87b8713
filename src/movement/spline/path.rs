//! Time-parameterized waypoint paths

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::movement::flags::SplineFlags;
use crate::movement::state::{normalize_orientation, Pose};
use crate::movement::ActorId;

use super::effects::{EffectSample, SplineEffects};
use super::packed::CompressedPath;
use super::SplineError;

/// How the mover faces while on the path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Facing {
    /// Face the direction of travel
    None,
    Spot { point: Vec3 },
    Target { actor: ActorId },
    Angle { angle: f32 },
}

impl Facing {
    pub const BITS: u32 = 2;

    pub fn code(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Spot { .. } => 1,
            Self::Target { .. } => 2,
            Self::Angle { .. } => 3,
        }
    }
}

/// Either a travel speed or a total duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplineTiming {
    /// Yards per second
    Velocity(f32),
    /// Milliseconds for the whole path
    Duration(u32),
}

/// A request to move an actor along a path
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSpec {
    /// Absolute waypoints, or transport-local when `transport` is set
    pub waypoints: Vec<Vec3>,
    pub timing: SplineTiming,
    pub flags: SplineFlags,
    pub facing: Facing,
    pub effects: SplineEffects,
    pub transport: Option<ActorId>,
    /// Feather fall caps the speed of the FALLING effect
    pub safe_fall: bool,
}

impl MoveSpec {
    pub fn new(waypoints: Vec<Vec3>, timing: SplineTiming) -> Self {
        Self {
            waypoints,
            timing,
            flags: SplineFlags::empty(),
            facing: Facing::None,
            effects: SplineEffects::default(),
            transport: None,
            safe_fall: false,
        }
    }

    pub fn with_flags(mut self, flags: SplineFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    pub fn with_effects(mut self, effects: SplineEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn on_transport(mut self, transport: ActorId) -> Self {
        self.transport = Some(transport);
        self
    }

    fn validate(&self) -> Result<(), SplineError> {
        if self.waypoints.is_empty() {
            return Err(SplineError::EmptyPath);
        }
        if let Some(index) = self.waypoints.iter().position(|p| !p.is_finite()) {
            return Err(SplineError::NonFiniteWaypoint { index });
        }
        match self.timing {
            SplineTiming::Velocity(v) if !(v.is_finite() && v > 0.0) => {
                return Err(SplineError::InvalidTiming("velocity must be positive"));
            }
            SplineTiming::Duration(0) => {
                return Err(SplineError::InvalidTiming("duration must be positive"));
            }
            _ => {}
        }
        match self.facing {
            Facing::Spot { point } if !point.is_finite() => Err(SplineError::InvalidFacing),
            Facing::Angle { angle } if !angle.is_finite() => Err(SplineError::InvalidFacing),
            _ => Ok(()),
        }
    }
}

/// Where along the path an instant falls: segment index and fraction
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PathProgress {
    pub segment: usize,
    pub fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResolvedFacing {
    Travel,
    Fixed(f32),
    Track(ActorId),
}

/// An active path, owned by the spline engine
#[derive(Debug, Clone)]
pub struct SplinePath {
    id: u32,
    spec: MoveSpec,
    /// Interpolated points; the seam is closed for cyclic paths
    points: Vec<Vec3>,
    compressed: Option<CompressedPath>,
    /// Cumulative arc length at each point
    lengths: Vec<f32>,
    /// Cumulative time at each point
    knots: Vec<u32>,
    duration: u32,
    facing: ResolvedFacing,
}

impl SplinePath {
    pub fn new(id: u32, mut spec: MoveSpec) -> Result<Self, SplineError> {
        spec.validate()?;

        let cyclic = spec.flags.contains(SplineFlags::CYCLIC);
        let smooth = spec.flags.intersects(SplineFlags::CATMULLROM | SplineFlags::FLYING);
        if cyclic || smooth || spec.waypoints.len() < 2 {
            spec.flags.insert(SplineFlags::UNCOMPRESSED_PATH);
        }

        // the server interpolates the same quantized points the client expands
        let mut compressed = None;
        if !spec.flags.contains(SplineFlags::UNCOMPRESSED_PATH) {
            match CompressedPath::compress(&spec.waypoints) {
                Ok(path) => {
                    spec.waypoints = path.expand();
                    compressed = Some(path);
                }
                Err(SplineError::OffsetOutOfRange { .. }) => {
                    spec.flags.insert(SplineFlags::UNCOMPRESSED_PATH);
                }
                Err(other) => return Err(other),
            }
        }

        let mut points = spec.waypoints.clone();
        if cyclic && points.len() > 1 && points.first() != points.last() {
            points.push(points[0]);
        }

        let mut lengths = Vec::with_capacity(points.len());
        let mut total = 0.0_f32;
        lengths.push(0.0);
        for pair in points.windows(2) {
            total += segment_length(pair[0], pair[1]);
            lengths.push(total);
        }

        let duration = match spec.timing {
            SplineTiming::Duration(ms) => ms,
            SplineTiming::Velocity(v) if total > 0.0 => {
                ((total / v) * 1000.0).round().max(1.0) as u32
            }
            SplineTiming::Velocity(_) => 0,
        };

        if cyclic && (duration == 0 || total <= 0.0) {
            return Err(SplineError::DegenerateCycle);
        }

        let segments = points.len() - 1;
        let knots = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| {
                if i == segments {
                    duration
                } else if total > 0.0 {
                    ((len / total) * duration as f32).round() as u32
                } else {
                    (duration as u64 * i as u64 / segments.max(1) as u64) as u32
                }
            })
            .collect();

        let facing = match spec.facing {
            Facing::None => ResolvedFacing::Travel,
            Facing::Spot { point } => ResolvedFacing::Fixed(Pose::at(points[0]).angle_to(point)),
            Facing::Angle { angle } => ResolvedFacing::Fixed(normalize_orientation(angle)),
            Facing::Target { actor } => ResolvedFacing::Track(actor),
        };

        Ok(Self {
            id,
            spec,
            points,
            compressed,
            lengths,
            knots,
            duration,
            facing,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn flags(&self) -> SplineFlags {
        self.spec.flags
    }

    pub fn is_cyclic(&self) -> bool {
        self.spec.flags.contains(SplineFlags::CYCLIC)
    }

    pub fn facing(&self) -> Facing {
        self.spec.facing
    }

    pub fn effects(&self) -> &SplineEffects {
        &self.spec.effects
    }

    pub fn transport(&self) -> Option<ActorId> {
        self.spec.transport
    }

    pub fn timing(&self) -> SplineTiming {
        self.spec.timing
    }

    /// Waypoints as sent on the wire, after quantization
    pub fn waypoints(&self) -> &[Vec3] {
        &self.spec.waypoints
    }

    pub fn compressed(&self) -> Option<&CompressedPath> {
        self.compressed.as_ref()
    }

    pub fn total_length(&self) -> f32 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    pub fn final_point(&self) -> Vec3 {
        self.points.last().copied().unwrap_or(Vec3::ZERO)
    }

    /// Fold any elapsed time into `[0, duration]`, wrapping cyclic paths
    pub fn normalize_time(&self, time_passed: u64) -> u32 {
        if self.is_cyclic() {
            (time_passed % self.duration as u64) as u32
        } else {
            time_passed.min(self.duration as u64) as u32
        }
    }

    pub fn progress_at(&self, time: u32) -> PathProgress {
        let segments = self.points.len() - 1;
        if segments == 0 {
            return PathProgress {
                segment: 0,
                fraction: 1.0,
            };
        }
        let time = time.min(self.duration);
        if time >= self.duration {
            return PathProgress {
                segment: segments - 1,
                fraction: 1.0,
            };
        }

        // last knot not greater than `time`
        let segment = (self.knots.partition_point(|&k| k <= time) - 1).min(segments - 1);
        let start = self.knots[segment];
        let end = self.knots[segment + 1];
        let fraction = if end > start {
            (time - start) as f32 / (end - start) as f32
        } else {
            1.0
        };
        PathProgress { segment, fraction }
    }

    /// Arc length covered at `time`, exact for linear paths
    pub fn distance_at(&self, time: u32) -> f32 {
        let progress = self.progress_at(time);
        if self.points.len() < 2 {
            return 0.0;
        }
        let start = self.lengths[progress.segment];
        let end = self.lengths[progress.segment + 1];
        start + (end - start) * progress.fraction
    }

    /// Interpolated local-frame position at `time`
    pub fn position_at(&self, time: u32) -> Vec3 {
        if self.points.len() < 2 || (!self.is_cyclic() && time >= self.duration) {
            return self.final_point();
        }
        let progress = self.progress_at(time);
        self.evaluate(progress)
    }

    fn evaluate(&self, progress: PathProgress) -> Vec3 {
        let i = progress.segment;
        let p1 = self.points[i];
        let p2 = self.points[i + 1];
        if !self.spec.flags.contains(SplineFlags::CATMULLROM) {
            return p1.lerp(p2, progress.fraction);
        }
        let (p0, p3) = self.neighbours(i);
        catmull_rom(p0, p1, p2, p3, progress.fraction)
    }

    fn tangent(&self, progress: PathProgress) -> Vec3 {
        let i = progress.segment;
        let p1 = self.points[i];
        let p2 = self.points[i + 1];
        if !self.spec.flags.contains(SplineFlags::CATMULLROM) {
            return p2 - p1;
        }
        let (p0, p3) = self.neighbours(i);
        catmull_rom_derivative(p0, p1, p2, p3, progress.fraction)
    }

    fn neighbours(&self, segment: usize) -> (Vec3, Vec3) {
        let last = self.points.len() - 1;
        if self.is_cyclic() {
            // points[last] duplicates points[0] across the seam
            let before = if segment == 0 { last - 1 } else { segment - 1 };
            let after = if segment + 2 > last { 1 } else { segment + 2 };
            (self.points[before], self.points[after])
        } else {
            let before = segment.saturating_sub(1);
            let after = (segment + 2).min(last);
            (self.points[before], self.points[after])
        }
    }

    /// Local pose at `time`; `target` is the live position of a tracked
    /// facing target already expressed in the path's frame.
    pub fn pose_at(&self, time: u32, target: Option<Vec3>, previous_orientation: f32) -> Pose {
        let position = self.position_at(time);
        let mut pose = Pose {
            position,
            orientation: previous_orientation,
            pitch: 0.0,
        };

        if self.points.len() >= 2 {
            let tangent = self.tangent(self.progress_at(time));
            if self.spec.flags.contains(SplineFlags::FLYING) {
                let horizontal = tangent.truncate().length();
                if horizontal > f32::EPSILON || tangent.z.abs() > f32::EPSILON {
                    pose.pitch = tangent.z.atan2(horizontal);
                }
            }
            if let ResolvedFacing::Travel = self.facing {
                if tangent.truncate().length_squared() > f32::EPSILON {
                    let mut yaw = tangent.y.atan2(tangent.x);
                    if self.spec.flags.contains(SplineFlags::BACKWARD) {
                        yaw += PI;
                    }
                    pose.orientation = normalize_orientation(yaw);
                }
            }
        }

        match self.facing {
            ResolvedFacing::Travel => {}
            ResolvedFacing::Fixed(angle) => pose.orientation = angle,
            ResolvedFacing::Track(_) => {
                if let Some(target) = target {
                    if target.truncate() != position.truncate() {
                        pose.orientation = pose.angle_to(target);
                    }
                }
            }
        }
        pose
    }

    pub fn tracked_target(&self) -> Option<ActorId> {
        match self.facing {
            ResolvedFacing::Track(actor) => Some(actor),
            _ => None,
        }
    }

    /// Height of a falling path at `time`. The drop starts from the first
    /// waypoint and bottoms out at the destination, which is reached
    /// exactly once the path ends.
    pub fn fall_height(&self, time: u32) -> Option<f32> {
        let fallen = self.sample_effects(time).fall_distance?;
        let start = self.points.first()?.z;
        let floor = self.final_point().z;
        if time >= self.duration {
            return Some(floor);
        }
        Some((start - fallen).max(floor))
    }

    pub fn sample_effects(&self, time: u32) -> EffectSample {
        self.spec.effects.sample(
            time,
            self.duration,
            self.spec.flags.contains(SplineFlags::FALLING),
            self.spec.safe_fall,
        )
    }
}

fn segment_length(a: Vec3, b: Vec3) -> f32 {
    a.distance(b)
}

fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

fn catmull_rom_derivative(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    0.5 * ((-p0 + p2)
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * (2.0 * t)
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * (3.0 * t2))
}
