pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::{config::Config, ml::DetectorService};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<DetectorService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(detector: Arc<DetectorService>) -> Self {
        Self {
            detector,
            config: Arc::new(Config::default()),
        }
    }

    /// Set the configuration used by the HTTP layer
    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        self.config = config;
        self
    }
}
