//! WebSocket sessions

pub mod handler;

pub use handler::ws_handler;
