//! Configuration management
//!
//! Settings are resolved in the following priority order:
//! 1. Environment variables
//! 2. cal-gateway.toml configuration file
//! 3. Default values
//!
//! Inside the configuration file, `${VAR_NAME}` expands to the value of
//! the corresponding environment variable.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// CalDAV remote source configuration
///
/// All three fields are required for the gateway to talk to the remote
/// server. When any of them is missing the gateway starts in a disabled
/// state and calendar tools report a clear "not configured" failure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaldavConfig {
    /// Base URL of the CalDAV server (calendar home)
    pub base_url: Option<String>,

    /// Username for basic authentication
    pub username: Option<String>,

    /// Password for basic authentication
    pub password: Option<String>,
}

impl CaldavConfig {
    /// Whether enough credentials are present to build a client
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.username.is_some() && self.password.is_some()
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port for the HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// Sync behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run a full sync in the background at startup
    #[serde(default = "default_sync_on_start")]
    pub on_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_start: default_sync_on_start(),
        }
    }
}

fn default_db_path() -> String {
    "data/cal-gateway.db".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_sync_on_start() -> bool {
    true
}

/// Main configuration for cal-gateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// CalDAV remote source
    #[serde(default)]
    pub caldav: CaldavConfig,

    /// Local cache store
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP API
    #[serde(default)]
    pub api: ApiConfig,

    /// Sync behaviour
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Expand `${VAR_NAME}` references to environment variable values
    ///
    /// Unknown variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file
    ///
    /// `${VAR_NAME}` references in the file are expanded before parsing,
    /// and environment variables override the parsed values afterwards.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut config: Config = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from the default locations
    ///
    /// Looks for `./cal-gateway.toml` first; when absent the configuration
    /// comes from environment variables alone.
    pub fn load() -> crate::Result<Self> {
        if Path::new("cal-gateway.toml").exists() {
            return Self::from_toml_file("cal-gateway.toml");
        }

        Ok(Self::from_env())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Override settings from environment variables
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CALDAV_BASE_URL") {
            if !url.is_empty() {
                self.caldav.base_url = Some(url);
            }
        }
        if let Ok(username) = std::env::var("CALDAV_USERNAME") {
            if !username.is_empty() {
                self.caldav.username = Some(username);
            }
        }
        if let Ok(password) = std::env::var("CALDAV_PASSWORD") {
            if !password.is_empty() {
                self.caldav.password = Some(password);
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            self.cache.db_path = path;
        }

        if let Ok(port) = std::env::var("API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(on_start) = std::env::var("SYNC_ON_START") {
            self.sync.on_start = on_start.to_lowercase() != "false";
        }
    }
}
