use config::Config;
use hub::{Hub, MemoryUpdateSource};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by the HTTP layer and the dispatch loop.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub update_source: Arc<MemoryUpdateSource>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        let hub_config = app_config.hub_config();
        info!(
            "Hub config: tick_interval={:?}, write_timeout={:?}, initial_watermark={}",
            hub_config.tick_interval,
            hub_config.write_timeout,
            hub_config
                .initial_watermark
                .map_or_else(|| "startup".to_string(), |w| w.to_rfc3339()),
        );

        let update_source = Arc::new(MemoryUpdateSource::new());
        let hub = Arc::new(Hub::new(update_source.clone(), hub_config));

        Self {
            hub,
            update_source,
            config: app_config,
        }
    }
}
