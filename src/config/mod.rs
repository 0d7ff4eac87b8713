//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Cyclic paths are re-announced this often so observers do not drift
pub const CYCLIC_RESYNC_INTERVAL_MS: u32 = 5000;

/// Floor applied to every speed set by a command
pub const MIN_SPEED: f32 = 0.0;

pub const MAX_PROTOCOL_VIOLATIONS: u32 = 20;

pub const TICK_RATE: u32 = 30;

/// Tuning handed to a partition
#[derive(Clone, Debug, PartialEq)]
pub struct MovementConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    pub cyclic_resync_interval_ms: u32,
    pub min_speed: f32,
    /// Violations a controller may commit before it is disconnected
    pub max_protocol_violations: u32,
    /// Server-driven patrol actors spawned at startup
    pub patrol_actors: u32,
    /// Radius around the origin where actors spawn
    pub spawn_radius: f32,
    /// Seed for spawn positions and patrol routes
    pub seed: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            cyclic_resync_interval_ms: CYCLIC_RESYNC_INTERVAL_MS,
            min_speed: MIN_SPEED,
            max_protocol_violations: MAX_PROTOCOL_VIOLATIONS,
            patrol_actors: 0,
            spawn_radius: 100.0,
            seed: 0,
        }
    }
}

impl MovementConfig {
    pub fn tick_ms(&self) -> u32 {
        1000 / self.tick_rate.max(1)
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Inbound frames per second allowed per connection
    pub input_rate_limit: u32,
    /// Allowed client origins for CORS, comma separated
    pub client_origin: Option<String>,
    pub movement: MovementConfig,
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = MovementConfig::default();
        let movement = MovementConfig {
            tick_rate: parse_var("TICK_RATE", defaults.tick_rate)?,
            cyclic_resync_interval_ms: parse_var(
                "CYCLIC_RESYNC_INTERVAL_MS",
                defaults.cyclic_resync_interval_ms,
            )?,
            min_speed: parse_var("MIN_SPEED", defaults.min_speed)?,
            max_protocol_violations: parse_var(
                "MAX_PROTOCOL_VIOLATIONS",
                defaults.max_protocol_violations,
            )?,
            patrol_actors: parse_var("PATROL_ACTORS", defaults.patrol_actors)?,
            spawn_radius: parse_var("SPAWN_RADIUS", defaults.spawn_radius)?,
            seed: parse_var("WORLD_SEED", rand::random())?,
        };

        if movement.tick_rate == 0 || movement.tick_rate > 1000 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if !movement.min_speed.is_finite() || movement.min_speed < 0.0 {
            return Err(ConfigError::Invalid("MIN_SPEED"));
        }
        if !(movement.spawn_radius.is_finite() && movement.spawn_radius > 0.0) {
            return Err(ConfigError::Invalid("SPAWN_RADIUS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            input_rate_limit: parse_var("INPUT_RATE_LIMIT", 60)?,

            client_origin: env::var("CLIENT_ORIGIN").ok(),

            movement,
        })
    }
}

/// Configuration errors
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
