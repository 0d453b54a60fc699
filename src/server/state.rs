use std::time::Instant;

use crate::database::{DatabaseManager, Pool};

/// Shared state of the operations API.
pub struct AppState<P: Pool> {
    pub manager: DatabaseManager<P>,
    pub start_time: Instant,
}

impl<P: Pool> AppState<P> {
    pub fn new(manager: DatabaseManager<P>) -> Self {
        Self {
            manager,
            start_time: Instant::now(),
        }
    }
}

impl<P: Pool> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            start_time: self.start_time,
        }
    }
}
