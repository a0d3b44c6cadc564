use std::sync::Arc;

use fleetnav_core::Database;

pub mod channel;
pub mod config;
pub mod errors;
pub mod fleet;
pub mod routes;

pub use channel::{ChannelRegistry, Delivery, Direction};
pub use config::Config;
pub use fleet::{Fleet, NavSettings};
pub use routes::build_router;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Fleet,
    pub channel: ChannelRegistry,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let fleet = Fleet::new(db, config.nav_settings());
        Self { fleet, channel: ChannelRegistry::new(), config: Arc::new(config) }
    }
}
