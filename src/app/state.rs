//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::world::PartitionHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub partition: PartitionHandle,
}

impl AppState {
    pub fn new(config: Config, partition: PartitionHandle) -> Self {
        Self {
            config: Arc::new(config),
            partition,
        }
    }
}
