//! Configuration file parser for `feeds.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which reproduces the reference deployment (six Verge feeds, 2022 cutoff,
//! one hour cache). Unknown keys are accepted but logged as warnings.
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FeedSource, NormalizePolicy, DEFAULT_MIN_TITLE_LEN};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed URL '{url}': {reason}")]
    InvalidFeedUrl { url: String, reason: String },

    #[error("Invalid cutoff '{0}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidCutoff(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

const DEFAULT_FEEDS: [&str; 6] = [
    "https://www.theverge.com/rss/index.xml",
    "https://www.theverge.com/rss/tech/index.xml",
    "https://www.theverge.com/rss/reviews/index.xml",
    "https://www.theverge.com/rss/science/index.xml",
    "https://www.theverge.com/rss/policy/index.xml",
    "https://www.theverge.com/rss/creators/index.xml",
];

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the web server listens on.
    pub bind: String,

    /// Feed URLs, fetched in this order. Earlier feeds win on duplicate urls.
    pub feeds: Vec<String>,

    /// Oldest publication date to keep: `YYYY-MM-DD` (midnight UTC) or RFC 3339.
    pub cutoff: String,

    /// Titles of this many characters or fewer are dropped.
    pub min_title_len: usize,

    /// How long an aggregation stays fresh, in seconds.
    pub cache_ttl_secs: u64,

    /// Pause between two feed fetches, in milliseconds.
    pub courtesy_delay_ms: u64,

    /// Per-request HTTP timeout, in seconds.
    pub request_timeout_secs: u64,

    /// Longest a request waits for an in-flight first refresh, in seconds.
    pub refresh_wait_secs: u64,

    /// User-Agent header sent to feed servers.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            cutoff: "2022-01-01".to_string(),
            min_title_len: DEFAULT_MIN_TITLE_LEN,
            cache_ttl_secs: 3600,
            courtesy_delay_ms: 300,
            request_timeout_secs: 30,
            refresh_wait_secs: 60,
            user_agent: concat!("digest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "bind",
        "feeds",
        "cutoff",
        "min_title_len",
        "cache_ttl_secs",
        "courtesy_delay_ms",
        "request_timeout_secs",
        "refresh_wait_secs",
        "user_agent",
    ];

    /// Load and validate configuration from a TOML file.
    ///
    /// - Missing file → defaults
    /// - Empty file → defaults
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Bad values (feed URLs, cutoff, zero durations) → `Err`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a runaway file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            ttl_secs = config.cache_ttl_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that can be wrong without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::Invalid("at least one feed is required".into()));
        }
        self.feed_sources()?;
        self.cutoff()?;
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache_ttl_secs must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn feed_sources(&self) -> Result<Vec<FeedSource>, ConfigError> {
        self.feeds
            .iter()
            .map(|url| {
                FeedSource::parse(url).map_err(|e| ConfigError::InvalidFeedUrl {
                    url: url.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    pub fn cutoff(&self) -> Result<DateTime<Utc>, ConfigError> {
        let raw = self.cutoff.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| ConfigError::InvalidCutoff(self.cutoff.clone()))
    }

    pub fn policy(&self) -> Result<NormalizePolicy, ConfigError> {
        Ok(NormalizePolicy {
            cutoff: self.cutoff()?,
            min_title_len: self.min_title_len,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_wait(&self) -> Duration {
        Duration::from_secs(self.refresh_wait_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::default_cutoff;
    use chrono::TimeZone;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind, "0.0.0.0:5000");
        assert_eq!(config.feeds.len(), 6);
        assert_eq!(config.feeds[0], "https://www.theverge.com/rss/index.xml");
        assert_eq!(config.cutoff().unwrap(), default_cutoff());
        assert_eq!(config.min_title_len, 10);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.courtesy_delay(), Duration::from_millis(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/digest_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.feeds.len(), 6);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("digest_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.toml");
        std::fs::write(&path, "   \n  \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache_ttl_secs, 3600);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("cache_ttl_secs = 60\n").unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.feeds.len(), 6); // default
        assert_eq!(config.courtesy_delay_ms, 300); // default
    }

    #[test]
    fn test_full_config() {
        let content = r#"
bind = "127.0.0.1:8080"
feeds = ["https://example.com/a.xml", "https://example.com/b.xml"]
cutoff = "2023-06-15T12:00:00Z"
min_title_len = 5
cache_ttl_secs = 600
courtesy_delay_ms = 0
request_timeout_secs = 10
refresh_wait_secs = 5
user_agent = "test-agent"
"#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.feed_sources().unwrap().len(), 2);
        assert_eq!(
            config.cutoff().unwrap(),
            Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap()
        );
        let policy = config.policy().unwrap();
        assert_eq!(policy.min_title_len, 5);
        assert_eq!(config.courtesy_delay(), Duration::ZERO);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_wait(), Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_date_only_cutoff_is_midnight_utc() {
        let config = Config::from_toml("cutoff = \"2024-02-29\"\n").unwrap();
        assert_eq!(
            config.cutoff().unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let err = Config::from_toml("cutoff = \"last tuesday\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCutoff(_)));
    }

    #[test]
    fn test_invalid_feed_url_rejected() {
        let err = Config::from_toml("feeds = [\"not a url\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFeedUrl { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn test_empty_feed_list_rejected() {
        let err = Config::from_toml("feeds = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = Config::from_toml("cache_ttl_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("cache_ttl_secs = \"soon\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
cache_ttl_secs = 120
totally_fake_key = "should not fail"
"#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.cache_ttl_secs, 120);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("digest_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.toml");

        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
