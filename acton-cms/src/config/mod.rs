//! Configuration management for acton-cms
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `ACTON_CMS_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/acton-cms/{service}/config.toml` (user config, XDG)
//! 4. `/etc/acton-cms/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `ACTON_CMS_SECTION__FIELD_NAME`
//! - Example: `ACTON_CMS_SERVER__PORT=8080`
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [site]
//! name = "My Site"
//! base_url = "https://example.com"
//! per_page = 10
//!
//! [themes]
//! themes_root = "./themes"
//! public_root = "./public"
//!
//! [database]
//! url = "sqlite://./acton-cms.db?mode=rwc"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! theme_poll_seconds = 5
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Site identity exposed to every template as `site`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Site name
    pub name: String,

    /// Absolute base URL without trailing slash, used for sitemap entries
    pub base_url: String,

    /// Tagline / default meta description
    pub description: String,

    /// Content locale
    pub locale: String,

    /// Default page size for listings
    pub per_page: u32,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            name: "Acton CMS".to_string(),
            base_url: "http://localhost:3000".to_string(),
            description: String::new(),
            locale: "en".to_string(),
            per_page: 10,
        }
    }
}

/// Theme discovery and publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    /// Directory holding one subdirectory per theme package
    pub themes_root: PathBuf,

    /// Directory served publicly; assets are published under `themes/{slug}`
    pub public_root: PathBuf,

    /// Manifest file names looked for in each theme directory, in order
    pub manifest_files: Vec<String>,

    /// File extensions the markup renderer accepts
    pub markup_extensions: Vec<String>,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            themes_root: PathBuf::from("./themes"),
            public_root: PathBuf::from("./public"),
            manifest_files: vec!["theme.json".to_string(), "theme.toml".to_string()],
            markup_extensions: vec![
                "html".to_string(),
                "jinja".to_string(),
                "j2".to_string(),
            ],
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLx connection URL for theme rows
    pub url: String,

    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://./acton-cms.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// How often a running server re-reads the active theme row, picking up
    /// activations made by other processes; `0` disables polling
    pub theme_poll_seconds: u64,
}

impl ServerSettings {
    /// Active theme poll interval, `None` when disabled
    #[must_use]
    pub const fn theme_poll_interval(&self) -> Option<Duration> {
        match self.theme_poll_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            theme_poll_seconds: 5,
        }
    }
}

/// Content source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// JSON seed file loaded into the in-memory content store
    pub seed_file: Option<PathBuf>,
}

/// Sitemap defaults used until an administrator saves settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapDefaults {
    /// Enable document caching
    pub enable_cache: bool,

    /// Cache TTL in seconds
    pub cache_ttl_seconds: u64,

    /// Include taxonomy terms
    pub include_taxonomies: bool,
}

impl Default for SitemapDefaults {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_ttl_seconds: 3600,
            include_taxonomies: true,
        }
    }
}

/// Complete acton-cms configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CmsConfig {
    /// Site identity
    #[serde(default)]
    pub site: SiteSettings,

    /// Theme settings
    #[serde(default)]
    pub themes: ThemeSettings,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Content source
    #[serde(default)]
    pub content: ContentSettings,

    /// Sitemap defaults
    #[serde(default)]
    pub sitemap: SitemapDefaults,
}

impl CmsConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be parsed or a value
    /// fails type conversion.
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config
        let system_config = PathBuf::from("/etc/acton-cms")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Env::prefixed("ACTON_CMS_").split("__").lowercase(true));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields defaults (plus environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML or values fail
    /// type conversion.
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ACTON_CMS_").split("__").lowercase(true))
            .extract()?;

        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("acton-cms")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    /// Bind address for the HTTP server
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
