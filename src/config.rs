use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::api::client::{ConnectionSettings, DEFAULT_API_URL};
use crate::cache::DEFAULT_ARTWORK_TTL;

/// Config file read when `CIDER_CONFIG` is not set. Missing file is fine.
pub const DEFAULT_CONFIG_FILE: &str = "cider.toml";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // General
    pub enabled: bool,
    pub api_url: String,
    pub require_api_token: bool,
    pub app_token: String,

    // Features
    pub enable_track_sharing: bool,
    pub enable_playback_controls: bool,

    // Rendimiento
    pub artwork_cache_ttl_secs: u64,
    pub history_size: usize,

    // Sharing identity
    pub player_name: String,
    pub player_id: Option<Uuid>,
}

impl Config {
    /// Loads `.env`, then the optional config file, then `CIDER_*` variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("CIDER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("CIDER").try_parsing(true));

        let config = Self::from_builder(builder)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document on top of the defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let mut config: Config = builder.build()?.try_deserialize()?;
        config.player_id.get_or_insert_with(Uuid::new_v4);
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - `api_url` must be empty or an absolute `http`/`https` URL while enabled
    /// - Artwork TTL and history size must be greater than 0
    ///
    /// A required token that is empty only logs a warning: the header is
    /// simply left out.
    pub fn validate(&self) -> Result<()> {
        // Empty means the default address, see `ConnectionSettings::new`.
        if self.enabled && !self.api_url.trim().is_empty() {
            let url = Url::parse(&self.api_url)
                .map_err(|e| anyhow::anyhow!("Invalid api_url '{}': {}", self.api_url, e))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("api_url must use http or https, got: {}", url.scheme());
            }
        }

        if self.artwork_cache_ttl_secs == 0 {
            anyhow::bail!("Artwork cache TTL must be greater than 0");
        }

        if self.history_size == 0 {
            anyhow::bail!("History size must be greater than 0");
        }

        if self.require_api_token && self.app_token.is_empty() {
            warn!("⚠️ require_api_token está activo pero app_token está vacío");
        }

        Ok(())
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        let token = self.require_api_token.then(|| self.app_token.clone());
        ConnectionSettings::new(self.api_url.clone(), token, self.require_api_token)
    }

    pub fn artwork_ttl(&self) -> Duration {
        Duration::from_secs(self.artwork_cache_ttl_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The app token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Cider: {} (enabled={}, token={})\n  \
            Features: sharing={}, controls={}\n  \
            Cache: artwork TTL {}s, history {} tracks\n  \
            Player: {} ({})",
            self.api_url,
            self.enabled,
            match (self.require_api_token, self.app_token.is_empty()) {
                (false, _) => "off",
                (true, true) => "required, missing",
                (true, false) => "required, set",
            },
            self.enable_track_sharing,
            self.enable_playback_controls,
            self.artwork_cache_ttl_secs,
            self.history_size,
            self.player_name,
            self.player_id.map_or("unassigned".to_string(), |id| id.to_string()),
        )
    }
}

/// Default configuration values.
impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: DEFAULT_API_URL.to_string(),
            require_api_token: false,
            app_token: String::new(),

            enable_track_sharing: false,
            enable_playback_controls: false,

            artwork_cache_ttl_secs: DEFAULT_ARTWORK_TTL.as_secs(),
            history_size: 50,

            player_name: "Player".to_string(),
            player_id: None,
        }
    }
}
