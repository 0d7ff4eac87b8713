//! Movement and spline flag words
//!
//! Each word is a newtype over `u32` with a fixed wire width. Bits above the
//! width are never set; `from_bits_truncate` drops them.

use serde::{Deserialize, Serialize};

macro_rules! flag_word {
    (
        $(#[$meta:meta])*
        $name:ident, width = $width:expr;
        $( $(#[$fmeta:meta])* $flag:ident = $bit:expr; )*
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: Self = Self(1 << $bit); )*

            /// Number of bits this word occupies on the wire
            pub const WIDTH: u32 = $width;
            pub const ALL: Self = Self(0 $( | (1 << $bit) )*);

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn from_bits_truncate(bits: u32) -> Self {
                Self(bits & Self::ALL.0)
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Bits under `mask` taken from `other`, the rest from `self`
            pub const fn with_bits_from(self, other: Self, mask: Self) -> Self {
                Self((self.0 & !mask.0) | (other.0 & mask.0))
            }

            pub fn set(&mut self, other: Self, enabled: bool) {
                if enabled {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

flag_word! {
    /// Primary movement flags
    MovementFlags, width = 30;
    FORWARD = 0;
    BACKWARD = 1;
    STRAFE_LEFT = 2;
    STRAFE_RIGHT = 3;
    LEFT = 4;
    RIGHT = 5;
    PITCH_UP = 6;
    PITCH_DOWN = 7;
    WALKING = 8;
    DISABLE_GRAVITY = 9;
    ROOT = 10;
    FALLING = 11;
    FALLING_FAR = 12;
    PENDING_STOP = 13;
    PENDING_STRAFE_STOP = 14;
    PENDING_FORWARD = 15;
    PENDING_BACKWARD = 16;
    PENDING_STRAFE_LEFT = 17;
    PENDING_STRAFE_RIGHT = 18;
    PENDING_ROOT = 19;
    SWIMMING = 20;
    ASCENDING = 21;
    DESCENDING = 22;
    CAN_FLY = 23;
    FLYING = 24;
    SPLINE_ELEVATION = 25;
    WATERWALKING = 26;
    /// Feather fall
    FALLING_SLOW = 27;
    HOVER = 28;
    DISABLE_COLLISION = 29;
}

flag_word! {
    /// First extension word
    MovementFlags2, width = 18;
    NO_STRAFE = 0;
    NO_JUMPING = 1;
    FULL_SPEED_TURNING = 2;
    FULL_SPEED_PITCHING = 3;
    ALWAYS_ALLOW_PITCHING = 4;
    IS_VEHICLE_EXIT_VOLUNTARY = 5;
    WATERWALKING_FULL_PITCH = 6;
    VEHICLE_PASSENGER_IS_TRANSITION_ALLOWED = 7;
    CAN_SWIM_TO_FLY_TRANS = 8;
    /// Reserved by older clients
    UNUSED_9 = 9;
    CAN_TURN_WHILE_FALLING = 10;
    IGNORE_MOVEMENT_FORCES = 11;
    CAN_DOUBLE_JUMP = 12;
    DOUBLE_JUMP = 13;
    AWAITING_LOAD = 14;
    INTERPOLATED_MOVEMENT = 15;
    INTERPOLATED_TURNING = 16;
    INTERPOLATED_PITCHING = 17;
}

flag_word! {
    /// Second extension word
    MovementFlags3, width = 4;
    DISABLE_INERTIA = 0;
    CAN_ADV_FLY = 1;
    ADV_FLYING = 2;
    CANT_SWIM = 3;
}

flag_word! {
    /// Flags describing how a spline path is traversed
    SplineFlags, width = 8;
    FLYING = 0;
    CATMULLROM = 1;
    CYCLIC = 2;
    WALKMODE = 3;
    UNCOMPRESSED_PATH = 4;
    BACKWARD = 5;
    /// Apply fall elevation while traversing
    FALLING = 6;
    CAN_SWIM = 7;
}

impl MovementFlags {
    /// Bits that mean the mover is translating
    pub const MASK_MOVING: Self = Self(
        Self::FORWARD.0
            | Self::BACKWARD.0
            | Self::STRAFE_LEFT.0
            | Self::STRAFE_RIGHT.0
            | Self::ASCENDING.0
            | Self::DESCENDING.0
            | Self::FALLING.0
            | Self::FALLING_FAR.0,
    );

    pub const MASK_TURNING: Self = Self(Self::LEFT.0 | Self::RIGHT.0);

    pub const MASK_FALLING: Self = Self(Self::FALLING.0 | Self::FALLING_FAR.0);

    /// Bits only a server command may change
    pub const MASK_CAPABILITY: Self = Self(
        Self::ROOT.0
            | Self::DISABLE_GRAVITY.0
            | Self::DISABLE_COLLISION.0
            | Self::HOVER.0
            | Self::WATERWALKING.0
            | Self::FALLING_SLOW.0
            | Self::CAN_FLY.0,
    );

    const OPPOSING: [(Self, Self); 5] = [
        (Self::FORWARD, Self::BACKWARD),
        (Self::STRAFE_LEFT, Self::STRAFE_RIGHT),
        (Self::LEFT, Self::RIGHT),
        (Self::PITCH_UP, Self::PITCH_DOWN),
        (Self::ASCENDING, Self::DESCENDING),
    ];

    /// Resolve mutually exclusive groups.
    ///
    /// Opposing directions presented together cancel out, `ROOT` clears every
    /// moving bit and `DISABLE_GRAVITY` clears `SWIMMING`.
    pub fn sanitized(self) -> Self {
        let mut flags = self;
        for (a, b) in Self::OPPOSING {
            if flags.contains(a | b) {
                flags.remove(a | b);
            }
        }
        if flags.contains(Self::ROOT) {
            flags.remove(Self::MASK_MOVING);
        }
        if flags.contains(Self::DISABLE_GRAVITY) {
            flags.remove(Self::SWIMMING);
        }
        flags
    }

    pub fn is_moving(self) -> bool {
        self.intersects(Self::MASK_MOVING)
    }

    pub fn is_turning(self) -> bool {
        self.intersects(Self::MASK_TURNING)
    }

    pub fn is_falling(self) -> bool {
        self.intersects(Self::MASK_FALLING)
    }
}

impl MovementFlags2 {
    pub const MASK_CAPABILITY: Self = Self(
        Self::CAN_DOUBLE_JUMP.0
            | Self::CAN_SWIM_TO_FLY_TRANS.0
            | Self::CAN_TURN_WHILE_FALLING.0
            | Self::IGNORE_MOVEMENT_FORCES.0,
    );
}

impl MovementFlags3 {
    pub const MASK_CAPABILITY: Self = Self::DISABLE_INERTIA;
}
