use std::sync::Arc;
use std::time::Instant;

use crate::engine::DecisionEngine;

/// Shared handler state.
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<DecisionEngine>,
    started_at: Instant,
}

impl ServerState {
    #[must_use]
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
