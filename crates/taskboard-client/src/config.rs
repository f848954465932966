//! Client configuration
//!
//! Values are layered, later sources winning:
//! - built-in defaults
//! - an optional TOML file (`taskboard.toml`, or `TASKBOARD_CONFIG_FILE`)
//! - environment variables with the `TASKBOARD__` prefix, e.g. `TASKBOARD__API_URL`
//! - the `TASKBOARD_API_URL` origin override

use crate::error::{ClientError, ClientResult};
use bon::Builder;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Origin used when no override is configured
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Environment variable holding the API origin override
pub const API_URL_ENV: &str = "TASKBOARD_API_URL";

/// Environment variable pointing at the configuration file
pub const CONFIG_FILE_ENV: &str = "TASKBOARD_CONFIG_FILE";

const APP_DIR: &str = "taskboard";
const TOKEN_FILE: &str = "token.json";

/// Configuration shared by the HTTP adapter, session and controllers
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin all endpoint paths are joined onto
    #[builder(into, default = DEFAULT_API_URL.to_string())]
    pub api_url: String,

    /// Per-request timeout in seconds (None = transport default)
    pub request_timeout_secs: Option<u64>,

    /// How long success and error notices stay visible
    #[builder(default = 6)]
    pub notification_ttl_secs: u64,

    /// Where the credential token is persisted (None = user config dir)
    pub token_path: Option<PathBuf>,

    /// Log the session out when the backend answers 401
    #[builder(default = true)]
    pub logout_on_unauthorized: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: None,
            notification_ttl_secs: 6,
            token_path: None,
            logout_on_unauthorized: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default file location and the environment
    pub fn load() -> ClientResult<Self> {
        let config_path =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| "taskboard.toml".to_string());
        Self::load_with(Path::new(&config_path))
    }

    /// Load configuration using an explicit file path
    pub fn load_with(config_path: &Path) -> ClientResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if config_path.exists() {
            info!("Loading configuration from {}", config_path.display());
            builder = builder.add_source(File::from(config_path));
        } else {
            debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKBOARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ClientError::configuration(format!("Failed to build configuration: {e}")))?;

        let mut config: ClientConfig = settings.try_deserialize().map_err(|e| {
            ClientError::configuration(format!("Failed to deserialize configuration: {e}"))
        })?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_url) = std::env::var(API_URL_ENV) {
            if !api_url.trim().is_empty() {
                info!("Using {} environment variable", API_URL_ENV);
                self.api_url = api_url;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> ClientResult<()> {
        let url = Url::parse(&self.api_url).map_err(|e| {
            ClientError::configuration(format!("Invalid API URL '{}': {e}", self.api_url))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::configuration(format!(
                "API URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ClientError::configuration(
                "Request timeout must be greater than 0",
            ));
        }

        if self.notification_ttl_secs == 0 {
            return Err(ClientError::configuration(
                "Notification TTL must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }

    /// Directory holding Taskboard's client-local files
    pub fn config_dir() -> ClientResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| ClientError::configuration("Failed to get config directory"))?;
        Ok(base.join(APP_DIR))
    }

    /// Resolved location of the persisted token
    pub fn token_path(&self) -> ClientResult<PathBuf> {
        match &self.token_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(TOKEN_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.notification_ttl(), Duration::from_secs(6));
        assert_eq!(config.request_timeout(), None);
        assert!(config.logout_on_unauthorized);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = ClientConfig::builder().build();
        let default = ClientConfig::default();
        assert_eq!(built.api_url, default.api_url);
        assert_eq!(built.notification_ttl_secs, default.notification_ttl_secs);
        assert_eq!(built.logout_on_unauthorized, default.logout_on_unauthorized);
    }

    #[test]
    fn test_validation() {
        let config = ClientConfig::builder().api_url("not a url").build();
        assert!(matches!(
            config.validate(),
            Err(ClientError::Configuration(_))
        ));

        let config = ClientConfig::builder().api_url("ftp://example.com").build();
        assert!(config.validate().is_err());

        let config = ClientConfig::builder().request_timeout_secs(0).build();
        assert!(config.validate().is_err());

        let config = ClientConfig::builder().notification_ttl_secs(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "api_url = \"https://tasks.example.com\"\nrequest_timeout_secs = 15\nlogout_on_unauthorized = false"
        )
        .unwrap();

        let config = ClientConfig::load_with(file.path()).unwrap();
        if std::env::var(API_URL_ENV).is_err() {
            assert_eq!(config.api_url, "https://tasks.example.com");
        }
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert!(!config.logout_on_unauthorized);
        assert_eq!(config.notification_ttl_secs, 6);
    }

    #[test]
    fn test_explicit_token_path() {
        let config = ClientConfig::builder()
            .token_path(PathBuf::from("/tmp/taskboard-token.json"))
            .build();
        assert_eq!(
            config.token_path().unwrap(),
            PathBuf::from("/tmp/taskboard-token.json")
        );
    }
}
