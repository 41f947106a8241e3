use std::sync::Arc;

use crate::config::Config;
use crate::handlers::JobRegistry;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, registry: JobRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            metrics: Arc::new(Metrics::new()),
        }
    }
}
