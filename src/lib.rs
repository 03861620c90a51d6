pub mod analysis;
pub mod api;
pub mod app_store;
pub mod config;
pub mod error;
pub mod models;
pub mod play;
pub mod scraper;
pub mod store_url;

use std::sync::Arc;
use app_store::{AppStore, AppleClient};
use config::Config;
use error::Result;
use play::{GooglePlayClient, PlayStore};

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub play: Arc<dyn PlayStore>,
    pub app_store: Arc<dyn AppStore>,
}

impl AppState {
    pub fn new(play: Arc<dyn PlayStore>, app_store: Arc<dyn AppStore>) -> Self {
        Self { play, app_store }
    }

    /// State backed by the live Google Play and App Store providers.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = scraper::build_client(config)?;
        let play = GooglePlayClient::new(client.clone(), config.lang.clone(), config.country.clone());
        let app_store = AppleClient::new(client, config.country.clone());
        Ok(Self::new(Arc::new(play), Arc::new(app_store)))
    }
}
