//! Server-driven path motion

pub mod effects;
pub mod engine;
pub mod packed;
pub mod path;

pub use effects::{AnimTier, AnimTierTransition, EffectSample, FadeEffect, JumpArc, SplineEffects};
pub use engine::{ActorLookup, PathEncoding, SplineDescription, SplineEngine, SplineStep};
pub use packed::{CompressedPath, PackedOffset};
pub use path::{Facing, MoveSpec, PathProgress, SplinePath, SplineTiming};

/// Reasons a path request is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("invalid waypoints: path is empty")]
    EmptyPath,

    #[error("invalid waypoints: waypoint {index} is not finite")]
    NonFiniteWaypoint { index: usize },

    #[error("invalid waypoints: {0}")]
    InvalidTiming(&'static str),

    #[error("invalid waypoints: facing target is not finite")]
    InvalidFacing,

    #[error("invalid waypoints: cyclic path has no length")]
    DegenerateCycle,

    #[error("waypoint {index} is too far from the path midpoint to pack")]
    OffsetOutOfRange { index: usize },
}
