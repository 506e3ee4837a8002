//! Configuration management for RAX FTPD
//!
//! Separates startup configuration (requires restart) from runtime configuration
//! (can be updated through the administrative handle while the server runs).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default configuration file, looked up relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "config";

/// Complete server configuration with startup/runtime separation
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: StartupConfig,
    pub limits: RuntimeConfig,
    pub rate_limit: RateLimitConfig,
    pub users: Vec<UserEntry>,
    pub virtual_hosts: Vec<VirtualHostEntry>,
}

/// Configuration that requires server restart to take effect
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StartupConfig {
    // ═══ NETWORK ═══
    /// IP address to bind the FTP control connection
    pub bind_address: String,

    /// Port for FTP control connection
    pub control_port: u16,

    // ═══ DEFAULT VIRTUAL HOST ═══
    pub server_name: String,
    pub server_root: String,
    pub welcome_message: String,

    // ═══ PROTOCOL LIMITS ═══
    /// Maximum FTP command line length in bytes
    pub max_command_length: usize,
    pub max_username_length: usize,

    /// Failed PASS attempts tolerated per session, 0 = unlimited
    pub max_login_attempts: u32,

    pub allow_anonymous: bool,

    /// Seconds between two registry sweeps
    pub sweep_interval_secs: u64,
}

/// Configuration that can be updated while the server is running
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum concurrent sessions
    /// Environment: RAX_FTPD_LIMITS__MAX_CLIENTS
    pub max_clients: usize,

    /// Absolute session lifetime in seconds, 0 = unlimited
    pub session_timeout_secs: u64,

    /// Allowed inactivity in seconds, 0 = unlimited
    pub idle_timeout_secs: u64,
}

/// Initial rate limiter settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub connection_window_secs: u64,
    pub request_window_secs: u64,
    pub max_connections_per_ip: usize,
    /// Global cap on accepted connections within one connection window
    pub max_connections_per_window: usize,
    pub max_requests_per_ip: usize,
}

/// A user account entry
#[derive(Debug, Deserialize, Clone)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
}

/// A virtual host entry
#[derive(Debug, Deserialize, Clone)]
pub struct VirtualHostEntry {
    pub hostname: String,
    pub document_root: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Thread-safe runtime configuration wrapper
pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            server_name: "localhost".to_string(),
            server_root: "./server_root".to_string(),
            welcome_message: "Welcome to RAX FTP Server".to_string(),
            max_command_length: 512,
            max_username_length: 64,
            max_login_attempts: 3,
            allow_anonymous: false,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_clients: 100,
            session_timeout_secs: 3600,
            idle_timeout_secs: 600,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connection_window_secs: 60,
            request_window_secs: 60,
            max_connections_per_ip: 10,
            max_connections_per_window: 100,
            max_requests_per_ip: 1000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH, false)
    }

    /// Load configuration from the given file with environment overrides.
    ///
    /// When `required` is false a missing file falls back to built-in defaults.
    pub fn load_from(path: &str, required: bool) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(required))
            .add_source(
                Environment::with_prefix("RAX_FTPD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Split into startup (immutable) and runtime (mutable) parts
    pub fn split(self) -> (StartupConfig, SharedRuntimeConfig) {
        let runtime = Arc::new(RwLock::new(self.limits));
        (self.server, runtime)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.control_port == 0 {
            return Err(config::ConfigError::Message(
                "Control port cannot be 0".into(),
            ));
        }

        if self.server.bind_address.parse::<IpAddr>().is_err() {
            return Err(config::ConfigError::Message(format!(
                "bind_address is not an IP address: {}",
                self.server.bind_address
            )));
        }

        if self.server.server_root.is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.server.max_command_length < 16 {
            return Err(config::ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        if self.server.sweep_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }

        if self.limits.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.rate_limit.enabled
            && (self.rate_limit.connection_window_secs == 0
                || self.rate_limit.request_window_secs == 0)
        {
            return Err(config::ConfigError::Message(
                "rate limit windows must be greater than 0".into(),
            ));
        }

        if self.users.iter().any(|u| u.username.trim().is_empty()) {
            return Err(config::ConfigError::Message(
                "user entries must have a username".into(),
            ));
        }

        Ok(())
    }
}

impl StartupConfig {
    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl RuntimeConfig {
    /// Absolute session timeout, `None` when disabled
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout_secs > 0).then(|| Duration::from_secs(self.session_timeout_secs))
    }

    /// Idle timeout, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.control_port, 2121);
        assert_eq!(config.limits.session_timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_zero_timeouts_disable_limits() {
        let runtime = RuntimeConfig {
            max_clients: 1,
            session_timeout_secs: 0,
            idle_timeout_secs: 0,
        };
        assert_eq!(runtime.session_timeout(), None);
        assert_eq!(runtime.idle_timeout(), None);
    }

    #[test]
    fn test_validate_rejects_zero_max_clients() {
        let mut config = ServerConfig::default();
        config.limits.max_clients = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind_address() {
        let mut config = ServerConfig::default();
        config.server.bind_address = "not-an-ip".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window_when_enabled() {
        let mut config = ServerConfig::default();
        config.rate_limit.request_window_secs = 0;
        assert!(config.validate().is_err());

        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("rax_ftpd_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("server.toml");
        fs::write(
            &path,
            r#"
[server]
control_port = 2200
welcome_message = "Hello"

[limits]
max_clients = 5
idle_timeout_secs = 0

[rate_limit]
enabled = false

[[users]]
username = "alice"
password = "alice123"

[[virtual_hosts]]
hostname = "10.0.0.1"
document_root = "/srv/ftp/a"
"#,
        )
        .unwrap();

        let config = ServerConfig::load_from(path.to_str().unwrap(), true).unwrap();
        assert_eq!(config.server.control_port, 2200);
        assert_eq!(config.server.welcome_message, "Hello");
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.limits.max_clients, 5);
        assert_eq!(config.limits.idle_timeout(), None);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.users.len(), 1);
        assert!(config.virtual_hosts[0].enabled);

        let (startup, runtime) = config.split();
        assert_eq!(startup.control_port, 2200);
        assert_eq!(runtime.try_read().unwrap().max_clients, 5);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_required_file_fails() {
        assert!(ServerConfig::load_from("/nonexistent/rax_ftpd/config", true).is_err());
    }
}
