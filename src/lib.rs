pub mod auth;
pub mod config;
pub mod db;
pub mod storage;
pub mod ui;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::storage::ImageStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, images: Arc<dyn ImageStore>) -> Self {
        Self { config, db, images }
    }
}
