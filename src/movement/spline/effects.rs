//! Time-keyed spline sub-effects
//!
//! Every effect is a pure function of elapsed path time; sampling never
//! changes path state.

use serde::{Deserialize, Serialize};

use crate::movement::physics::fall_elevation;

fn ms_to_secs(ms: u32) -> f32 {
    ms as f32 / 1000.0
}

/// Parabolic arc layered over the path elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpArc {
    pub start_offset_ms: u32,
    pub vertical_acceleration: f32,
}

impl JumpArc {
    /// Arc peaking at `max_height` halfway between the offset and the end
    pub fn from_height(max_height: f32, start_offset_ms: u32, duration_ms: u32) -> Self {
        let span = ms_to_secs(duration_ms.saturating_sub(start_offset_ms));
        let vertical_acceleration = if span > 0.0 {
            max_height * 8.0 / (span * span)
        } else {
            0.0
        };
        Self {
            start_offset_ms,
            vertical_acceleration,
        }
    }

    pub fn elevation(&self, time_passed: u32, duration: u32) -> f32 {
        if time_passed <= self.start_offset_ms {
            return 0.0;
        }
        let passed = ms_to_secs(time_passed - self.start_offset_ms);
        let span = ms_to_secs(duration.saturating_sub(self.start_offset_ms));
        (span - passed).max(0.0) * 0.5 * self.vertical_acceleration * passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadeEffect {
    pub start_offset_ms: u32,
}

impl FadeEffect {
    /// 1.0 fully visible, 0.0 fully faded at the end of the path
    pub fn alpha(&self, time_passed: u32, duration: u32) -> f32 {
        if time_passed <= self.start_offset_ms {
            return 1.0;
        }
        let span = duration.saturating_sub(self.start_offset_ms);
        if span == 0 {
            return 0.0;
        }
        let progress = (time_passed - self.start_offset_ms) as f32 / span as f32;
        (1.0 - progress).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimTier {
    Ground = 0,
    Swim = 1,
    Hover = 2,
    Fly = 3,
    Submerged = 4,
}

impl AnimTier {
    pub const BITS: u32 = 3;
}

impl TryFrom<u32> for AnimTier {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ground),
            1 => Ok(Self::Swim),
            2 => Ok(Self::Hover),
            3 => Ok(Self::Fly),
            4 => Ok(Self::Submerged),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimTierTransition {
    pub tier: AnimTier,
    pub start_offset_ms: u32,
}

/// Optional effects attached to a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SplineEffects {
    pub jump: Option<JumpArc>,
    pub fade: Option<FadeEffect>,
    pub anim_tier: Option<AnimTierTransition>,
}

/// Effect annotations for one sampled instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectSample {
    /// Added to the interpolated height
    pub elevation: f32,
    /// Distance dropped since the path began, on falling paths
    pub fall_distance: Option<f32>,
    pub alpha: Option<f32>,
    pub anim_tier: Option<AnimTier>,
}

impl SplineEffects {
    pub fn is_empty(&self) -> bool {
        self.jump.is_none() && self.fade.is_none() && self.anim_tier.is_none()
    }

    pub fn sample(
        &self,
        time_passed: u32,
        duration: u32,
        falling: bool,
        safe_fall: bool,
    ) -> EffectSample {
        let elevation = self
            .jump
            .map(|jump| jump.elevation(time_passed, duration))
            .unwrap_or(0.0);
        let fall_distance =
            falling.then(|| fall_elevation(ms_to_secs(time_passed), safe_fall, 0.0));

        EffectSample {
            elevation,
            fall_distance,
            alpha: self.fade.map(|fade| fade.alpha(time_passed, duration)),
            anim_tier: self
                .anim_tier
                .filter(|transition| time_passed >= transition.start_offset_ms)
                .map(|transition| transition.tier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_arc_peaks_at_requested_height() {
        let jump = JumpArc::from_height(4.0, 1000, 3000);
        assert_eq!(jump.elevation(1000, 3000), 0.0);
        assert!((jump.elevation(2000, 3000) - 4.0).abs() < 1e-4);
        assert!(jump.elevation(3000, 3000).abs() < 1e-6);
        assert_eq!(jump.elevation(500, 3000), 0.0);
    }

    #[test]
    fn fade_runs_from_offset_to_end() {
        let fade = FadeEffect { start_offset_ms: 200 };
        assert_eq!(fade.alpha(100, 1200), 1.0);
        assert!((fade.alpha(700, 1200) - 0.5).abs() < 1e-6);
        assert_eq!(fade.alpha(1200, 1200), 0.0);
    }

    #[test]
    fn anim_tier_applies_after_offset() {
        let effects = SplineEffects {
            anim_tier: Some(AnimTierTransition {
                tier: AnimTier::Fly,
                start_offset_ms: 300,
            }),
            ..Default::default()
        };
        assert_eq!(effects.sample(299, 1000, false, false).anim_tier, None);
        assert_eq!(effects.sample(300, 1000, false, false).anim_tier, Some(AnimTier::Fly));
    }

    #[test]
    fn sampling_is_pure() {
        let effects = SplineEffects {
            jump: Some(JumpArc::from_height(2.0, 0, 1000)),
            fade: Some(FadeEffect { start_offset_ms: 0 }),
            anim_tier: None,
        };
        let before = effects;
        let a = effects.sample(400, 1000, true, false);
        let b = effects.sample(400, 1000, true, false);
        assert_eq!(a, b);
        assert_eq!(effects, before);
        assert_eq!(a.elevation, JumpArc::from_height(2.0, 0, 1000).elevation(400, 1000));
        assert!(a.fall_distance.is_some_and(|d| d > 0.0));
        assert_eq!(effects.sample(400, 1000, false, false).fall_distance, None);
    }
}
