//! Shared application state.

use std::sync::Arc;

use graphloom_core::GraphLoomConfig;
use graphloom_engine::GraphEngine;

/// Shared state accessible from all route handlers.
pub struct AppState {
    pub config: GraphLoomConfig,
    pub engine: Arc<GraphEngine>,
}

impl AppState {
    pub fn new(config: GraphLoomConfig, engine: Arc<GraphEngine>) -> Self {
        Self { config, engine }
    }
}
