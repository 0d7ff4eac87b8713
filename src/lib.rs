//! Authoritative movement synchronization
//!
//! Bit-packed movement snapshots, server-driven spline paths and a
//! sequenced command channel between the server and whichever client
//! controls each mover.

pub mod app;
pub mod codec;
pub mod config;
pub mod http;
pub mod movement;
pub mod util;
pub mod world;
pub mod ws;
