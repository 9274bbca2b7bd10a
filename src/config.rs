//! Configuration loading using Figment
//!
//! Configuration is loaded from:
//! 1. `config/observe.toml` (base configuration, optional)
//! 2. Environment variables (prefixed with `OBSERVE_`, sections split on `__`)
//!
//! Every field has a default, so an empty or missing file yields a usable
//! configuration pointing at `localhost`.
//!
//! # Example
//! ```no_run
//! use observe_client::config::ObserveConfig;
//!
//! let config = ObserveConfig::load()?;
//! config.validate()?;
//! println!("Server: {}:{}", config.server.host, config.server.port);
//! # Ok::<(), observe_client::error::ObserveError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, ObserveError};
use crate::transport::ConnectionParams;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/observe.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Remote control server
    pub server: ServerConfig,
    /// Session loop timing
    pub session: SessionConfig,
    /// Observatory site used for LST and airmass
    pub site: SiteConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Observe Client".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Remote control server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Path prefix of every resource, e.g. `/observe`
    pub base_path: String,
    /// The observatory server uses a self-signed certificate
    pub accept_invalid_certs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 443,
            username: String::new(),
            password: String::new(),
            base_path: "/observe".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// Session loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sleep between two poll cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Transport connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Transport read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Observatory site configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    /// Geographic longitude in degrees, east positive
    pub longitude_deg: f64,
    /// Geographic latitude in degrees, north positive
    pub latitude_deg: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Ondrejov".to_string(),
            longitude_deg: 14.7836111,
            latitude_deg: 49.910555,
        }
    }
}

impl ObserveConfig {
    /// Load configuration from `config/observe.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `OBSERVE_`.
    /// Example: `OBSERVE_SERVER__HOST=observe.example.org`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::from(Serialized::defaults(ObserveConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OBSERVE_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.application.log_level.to_lowercase();
        if !valid_levels.contains(&level.as_str()) {
            return Err(ObserveError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.server.host.trim().is_empty() {
            return Err(ObserveError::Configuration(
                "server.host must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ObserveError::Configuration(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.session.poll_interval_ms == 0 {
            return Err(ObserveError::Configuration(
                "session.poll_interval_ms must be non-zero".to_string(),
            ));
        }

        if !(-180.0..=180.0).contains(&self.site.longitude_deg) {
            return Err(ObserveError::Configuration(format!(
                "Invalid site.longitude_deg {}. Must be -180..180",
                self.site.longitude_deg
            )));
        }

        if !(-90.0..=90.0).contains(&self.site.latitude_deg) {
            return Err(ObserveError::Configuration(format!(
                "Invalid site.latitude_deg {}. Must be -90..90",
                self.site.latitude_deg
            )));
        }

        Ok(())
    }

    /// Initial connection parameters handed to the session loop.
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.server.host.clone(),
            port: self.server.port,
            username: self.server.username.clone(),
            password: self.server.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ObserveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 443);
        assert_eq!(config.server.base_path, "/observe");
        assert_eq!(config.session.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[application]
log_level = "debug"

[server]
host = "observe.example.org"
port = 8443
username = "observer"

[session]
poll_interval_ms = 250
"#
        )
        .unwrap();

        let config = ObserveConfig::load_from(file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.server.host, "observe.example.org");
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.session.poll_interval_ms, 250);
        // untouched sections keep their defaults
        assert_eq!(config.session.read_timeout_ms, 5000);
        assert_eq!(config.site, SiteConfig::default());

        let params = config.connection_params();
        assert_eq!(params.address(), "observe.example.org:8443");
        assert_eq!(params.username, "observer");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ObserveConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.host, "localhost");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ObserveConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_server_and_session() {
        let mut config = ObserveConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = ObserveConfig::default();
        config.server.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = ObserveConfig::default();
        config.session.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_site() {
        let mut config = ObserveConfig::default();
        config.site.latitude_deg = 91.0;
        assert!(config.validate().is_err());
    }
}
