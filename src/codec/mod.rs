//! Bit-packed wire format
//!
//! Pure and stateless; any task may encode or decode concurrently.

pub mod bits;
pub mod command;
pub mod error;
pub mod message;
pub mod motion;
pub mod spline;

#[cfg(test)]
pub(crate) mod arbitrary;

pub use bits::{BitReader, BitWriter};
pub use error::{CodecError, DecodeError};
pub use message::{ClientMessage, ServerMessage};
pub use motion::{decode, encode};
