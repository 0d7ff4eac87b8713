//! Fall physics constants and helpers
//!
//! These values are calibrated against client behaviour rather than derived,
//! so they are kept as named constants.

/// Downward acceleration in yards per second squared
pub const GRAVITY: f32 = 19.291_105;
/// Terminal fall speed
pub const TERMINAL_VELOCITY: f32 = 60.148_003;
/// Terminal speed while feather falling
pub const TERMINAL_SAFE_FALL_VELOCITY: f32 = 7.0;

const TERMINAL_LENGTH: f32 = (TERMINAL_VELOCITY * TERMINAL_VELOCITY) / (2.0 * GRAVITY);
const TERMINAL_SAFE_FALL_LENGTH: f32 =
    (TERMINAL_SAFE_FALL_VELOCITY * TERMINAL_SAFE_FALL_VELOCITY) / (2.0 * GRAVITY);
const TERMINAL_FALL_TIME: f32 = TERMINAL_VELOCITY / GRAVITY;
const TERMINAL_SAFE_FALL_TIME: f32 = TERMINAL_SAFE_FALL_VELOCITY / GRAVITY;

/// Distance fallen after `t` seconds, starting at `start_velocity`
/// (positive is downward). Speed is capped at terminal velocity.
pub fn fall_elevation(t: f32, safe_fall: bool, start_velocity: f32) -> f32 {
    let (terminal_velocity, terminal_time) = if safe_fall {
        (TERMINAL_SAFE_FALL_VELOCITY, TERMINAL_SAFE_FALL_TIME)
    } else {
        (TERMINAL_VELOCITY, TERMINAL_FALL_TIME)
    };

    let start_velocity = start_velocity.min(terminal_velocity);
    // time left until terminal velocity is reached
    let until_terminal = (terminal_time - start_velocity / GRAVITY).max(0.0);

    if t > until_terminal {
        terminal_velocity * (t - until_terminal)
            + start_velocity * until_terminal
            + GRAVITY * until_terminal * until_terminal * 0.5
    } else {
        t * (start_velocity + t * GRAVITY * 0.5)
    }
}

/// Seconds needed to fall `distance` from rest
pub fn fall_time(distance: f32, safe_fall: bool) -> f32 {
    if distance <= 0.0 {
        return 0.0;
    }

    let (terminal_velocity, terminal_length, terminal_time) = if safe_fall {
        (
            TERMINAL_SAFE_FALL_VELOCITY,
            TERMINAL_SAFE_FALL_LENGTH,
            TERMINAL_SAFE_FALL_TIME,
        )
    } else {
        (TERMINAL_VELOCITY, TERMINAL_LENGTH, TERMINAL_FALL_TIME)
    };

    if distance > terminal_length {
        (distance - terminal_length) / terminal_velocity + terminal_time
    } else {
        (2.0 * distance / GRAVITY).sqrt()
    }
}
