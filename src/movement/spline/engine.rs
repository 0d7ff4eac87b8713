//! Owner of every active path, advanced once per tick

use glam::Vec3;
use std::collections::HashMap;
use tracing::debug;

use crate::movement::flags::SplineFlags;
use crate::movement::state::Pose;
use crate::movement::transport::TransportFrame;
use crate::movement::ActorId;

use super::effects::{EffectSample, SplineEffects};
use super::packed::CompressedPath;
use super::path::{Facing, MoveSpec, SplinePath, SplineTiming};
use super::SplineError;

/// Read access to other actors' current world poses
pub trait ActorLookup {
    fn pose_of(&self, actor: ActorId) -> Option<Pose>;
}

impl<F> ActorLookup for F
where
    F: Fn(ActorId) -> Option<Pose>,
{
    fn pose_of(&self, actor: ActorId) -> Option<Pose> {
        self(actor)
    }
}

/// Result of advancing one path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineStep {
    pub spline_id: u32,
    /// World-space pose
    pub pose: Pose,
    /// Transport-local pose for paths on a transport
    pub local: Option<Pose>,
    pub time_passed: u32,
    pub just_finished: bool,
    /// A cyclic path is due for a drift-correcting resync
    pub resync_due: bool,
    pub effects: EffectSample,
}

/// Waypoints as they travel on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum PathEncoding {
    Compressed(CompressedPath),
    Uncompressed(Vec<Vec3>),
}

impl PathEncoding {
    pub fn waypoints(&self) -> Vec<Vec3> {
        match self {
            Self::Compressed(path) => path.expand(),
            Self::Uncompressed(points) => points.clone(),
        }
    }
}

/// Everything an observer needs to run the same path locally
#[derive(Debug, Clone, PartialEq)]
pub struct SplineDescription {
    pub actor: ActorId,
    pub spline_id: u32,
    pub flags: SplineFlags,
    pub facing: Facing,
    pub duration_ms: u32,
    pub time_passed: u32,
    pub path: PathEncoding,
    pub effects: SplineEffects,
    pub transport: Option<ActorId>,
}

impl SplineDescription {
    /// Rebuild the request an observer replays
    pub fn to_move_spec(&self) -> MoveSpec {
        MoveSpec {
            waypoints: self.path.waypoints(),
            timing: SplineTiming::Duration(self.duration_ms),
            flags: self.flags,
            facing: self.facing,
            effects: self.effects,
            transport: self.transport,
            safe_fall: false,
        }
    }
}

#[derive(Debug)]
struct ActivePath {
    path: SplinePath,
    time_passed: u32,
    resync_timer: u32,
    last_world: Pose,
    last_local: Pose,
}

/// Active paths keyed by actor, at most one each
#[derive(Debug)]
pub struct SplineEngine {
    paths: HashMap<ActorId, ActivePath>,
    last_spline_id: u32,
    resync_interval_ms: u32,
}

impl SplineEngine {
    pub fn new(resync_interval_ms: u32) -> Self {
        Self {
            paths: HashMap::new(),
            last_spline_id: 0,
            resync_interval_ms,
        }
    }

    /// Replace the actor's path. A rejected request leaves any current
    /// path untouched.
    pub fn start(
        &mut self,
        actor: ActorId,
        spec: MoveSpec,
        lookup: &impl ActorLookup,
    ) -> Result<u32, SplineError> {
        let spline_id = self.last_spline_id.wrapping_add(1).max(1);
        let path = SplinePath::new(spline_id, spec)?;
        self.last_spline_id = spline_id;

        let previous_orientation = self
            .paths
            .get(&actor)
            .map(|active| active.last_local.orientation)
            .unwrap_or(0.0);
        let (world, local) = sample(&path, 0, previous_orientation, lookup);

        debug!(
            actor = %actor,
            spline_id,
            duration_ms = path.duration(),
            cyclic = path.is_cyclic(),
            "Spline started"
        );

        self.paths.insert(
            actor,
            ActivePath {
                path,
                time_passed: 0,
                resync_timer: 0,
                last_world: world,
                last_local: local,
            },
        );
        Ok(spline_id)
    }

    /// Advance the actor's path by `delta_ms`. A non-cyclic path reports
    /// `just_finished` once, on the step that reaches its end, and is then
    /// discarded.
    pub fn advance(
        &mut self,
        actor: ActorId,
        delta_ms: u32,
        lookup: &impl ActorLookup,
    ) -> Option<SplineStep> {
        let resync_interval = self.resync_interval_ms;
        let active = self.paths.get_mut(&actor)?;
        let path = &active.path;

        let time_passed = path.normalize_time(active.time_passed as u64 + delta_ms as u64);
        let just_finished = !path.is_cyclic() && time_passed >= path.duration();

        let mut resync_due = false;
        if path.is_cyclic() && resync_interval > 0 {
            active.resync_timer = active.resync_timer.saturating_add(delta_ms);
            if active.resync_timer >= resync_interval {
                active.resync_timer %= resync_interval;
                resync_due = true;
            }
        }

        let (world, local) = sample(path, time_passed, active.last_local.orientation, lookup);
        let step = SplineStep {
            spline_id: path.id(),
            pose: world,
            local: path.transport().map(|_| local),
            time_passed,
            just_finished,
            resync_due,
            effects: path.sample_effects(time_passed),
        };

        active.time_passed = time_passed;
        active.last_world = world;
        active.last_local = local;

        if just_finished {
            self.paths.remove(&actor);
            debug!(actor = %actor, spline_id = step.spline_id, "Spline finished");
        }
        Some(step)
    }

    /// Discard the actor's path, returning the last pose it produced
    pub fn stop(&mut self, actor: ActorId) -> Option<Pose> {
        self.paths.remove(&actor).map(|active| {
            debug!(actor = %actor, spline_id = active.path.id(), "Spline stopped");
            active.last_world
        })
    }

    pub fn is_active(&self, actor: ActorId) -> bool {
        self.paths.contains_key(&actor)
    }

    /// True when the actor has no path left to run
    pub fn is_finished(&self, actor: ActorId) -> bool {
        !self.is_active(actor)
    }

    pub fn path(&self, actor: ActorId) -> Option<&SplinePath> {
        self.paths.get(&actor).map(|active| &active.path)
    }

    pub fn spline_id(&self, actor: ActorId) -> Option<u32> {
        self.paths.get(&actor).map(|active| active.path.id())
    }

    pub fn time_passed(&self, actor: ActorId) -> Option<u32> {
        self.paths.get(&actor).map(|active| active.time_passed)
    }

    pub fn active_actors(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.paths.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn describe(&self, actor: ActorId) -> Option<SplineDescription> {
        let active = self.paths.get(&actor)?;
        let path = &active.path;
        let encoding = match path.compressed() {
            Some(compressed) => PathEncoding::Compressed(compressed.clone()),
            None => PathEncoding::Uncompressed(path.waypoints().to_vec()),
        };
        Some(SplineDescription {
            actor,
            spline_id: path.id(),
            flags: path.flags(),
            facing: path.facing(),
            duration_ms: path.duration(),
            time_passed: active.time_passed,
            path: encoding,
            effects: *path.effects(),
            transport: path.transport(),
        })
    }
}

/// World and local pose of `path` at `time`
fn sample(
    path: &SplinePath,
    time: u32,
    previous_orientation: f32,
    lookup: &impl ActorLookup,
) -> (Pose, Pose) {
    let frame = path
        .transport()
        .and_then(|transport| lookup.pose_of(transport))
        .map(|pose| TransportFrame::new(&pose));

    // tracked targets are read live, every sample
    let target = path
        .tracked_target()
        .and_then(|target| lookup.pose_of(target))
        .map(|pose| match frame {
            Some(frame) => frame.point_to_local(pose.position),
            None => pose.position,
        });

    let mut local = path.pose_at(time, target, previous_orientation);
    if let Some(z) = path.fall_height(time) {
        local.position.z = z;
    }
    local.position.z += path.sample_effects(time).elevation;

    let world = match frame {
        Some(frame) => frame.to_world(&local),
        None => local,
    };
    (world, local)
}
