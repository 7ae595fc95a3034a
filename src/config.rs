//! Configuration file parser for the server's TOML config.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level server configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub listen_addr: String,

    /// SQLite database file.
    pub database_path: String,

    /// Articles per page for feed listings and bookmarks.
    pub page_size: i64,

    /// Timeout for a whole feed download (request and body), in seconds.
    pub fetch_timeout_secs: u64,

    /// Worker limit for per-feed unread aggregation.
    pub aggregate_concurrency: usize,

    /// Worker limit for background feed refresh.
    pub refresh_concurrency: usize,

    /// Background refresh interval in minutes. 0 = never.
    pub refresh_interval_minutes: u64,

    /// Pending same-link cascade jobs kept before new ones are dropped.
    pub cascade_queue_capacity: usize,

    /// Allow subscribing to loopback and private-network feed URLs.
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            database_path: "newshub.db".to_string(),
            page_size: 20,
            fetch_timeout_secs: 30,
            aggregate_concurrency: 8,
            refresh_concurrency: 10,
            refresh_interval_minutes: 0,
            cascade_queue_capacity: 256,
            allow_private_hosts: false,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "listen_addr",
        "database_path",
        "page_size",
        "fetch_timeout_secs",
        "aggregate_concurrency",
        "refresh_concurrency",
        "refresh_interval_minutes",
        "cascade_queue_capacity",
        "allow_private_hosts",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            listen_addr = %config.listen_addr,
            database = %config.database_path,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("newshub_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.refresh_interval_minutes, 0);
        assert!(!config.allow_private_hosts);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newshub_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "page_size = 50\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.aggregate_concurrency, 8);
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
listen_addr = "0.0.0.0:9000"
database_path = "/var/lib/newshub/news.db"
page_size = 30
fetch_timeout_secs = 5
aggregate_concurrency = 4
refresh_concurrency = 2
refresh_interval_minutes = 15
cascade_queue_capacity = 16
allow_private_hosts = true
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.database_path, "/var/lib/newshub/news.db");
        assert_eq!(config.page_size, 30);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.aggregate_concurrency, 4);
        assert_eq!(config.refresh_concurrency, 2);
        assert_eq!(config.refresh_interval_minutes, 15);
        assert_eq!(config.cascade_queue_capacity, 16);
        assert!(config.allow_private_hosts);
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "page_size = 10\ntotally_fake_key = 1\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 10);
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "page_size = \"twenty\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config {
            fetch_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.fetch_timeout(), Duration::from_secs(1));
    }
}
