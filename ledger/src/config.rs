//! Ledger configuration.

use streamledger_common::{Result, StreamError};

/// Stream ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Keep zero-balance streams in their store instead of removing them.
    pub retain_exhausted_streams: bool,
    /// Upper bound on stream length in seconds (`None` = unbounded).
    pub max_duration_secs: Option<u64>,
    /// Log level filter used when the host installs a subscriber.
    pub log_level: String,
    /// Emit logs as JSON.
    pub log_json: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retain_exhausted_streams: false,
            max_duration_secs: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(retain) = std::env::var("STREAMLEDGER_RETAIN_EXHAUSTED") {
            if let Ok(retain) = retain.parse() {
                config.retain_exhausted_streams = retain;
            }
        }

        if let Ok(max) = std::env::var("STREAMLEDGER_MAX_DURATION_SECS") {
            if let Ok(max) = max.parse() {
                config.max_duration_secs = Some(max);
            }
        }

        if let Ok(level) = std::env::var("STREAMLEDGER_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(json) = std::env::var("STREAMLEDGER_LOG_JSON") {
            config.log_json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_duration_secs == Some(0) {
            return Err(StreamError::ConfigurationError(
                "Max duration cannot be 0".to_string(),
            ));
        }

        if self.log_level.is_empty() {
            return Err(StreamError::ConfigurationError(
                "Log level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Check a requested stream length against the configured bound.
    pub fn accepts_duration(&self, duration: u64) -> bool {
        duration > 0 && self.max_duration_secs.map_or(true, |max| duration <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.retain_exhausted_streams);
    }

    #[test]
    fn test_invalid_config() {
        let config = LedgerConfig {
            max_duration_secs: Some(0),
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_duration() {
        let mut config = LedgerConfig::default();
        assert!(!config.accepts_duration(0));
        assert!(config.accepts_duration(u64::MAX));

        config.max_duration_secs = Some(3600);
        assert!(config.accepts_duration(3600));
        assert!(!config.accepts_duration(3601));
    }
}
