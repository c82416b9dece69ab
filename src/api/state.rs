use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::db::Dao;

#[derive(Clone)]
pub struct AppState {
    pub dao: Arc<dyn Dao>,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(dao: Arc<dyn Dao>, config: Arc<Config>) -> Self {
        Self {
            dao,
            config,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
