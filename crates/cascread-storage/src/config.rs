//! Configuration for the storage system

use std::time::Duration;

use cascread_formats::blte::{DEFAULT_MAX_FRAME_DEPTH, DecodeOptions};
use serde::{Deserialize, Serialize};

use crate::{Result, StorageError};

/// Configuration for the storage system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Verify chunk checksums while decoding
    pub verify_checksums: bool,

    /// Maximum nesting of frame chunks
    pub max_frame_depth: u8,

    /// Number of local index buckets (`00*.idx` .. `0F*.idx`)
    pub index_buckets: u8,

    /// TCP connect timeout for CDN requests
    pub connect_timeout: Duration,

    /// Read timeout for CDN requests
    pub read_timeout: Duration,

    /// User agent sent to CDNs
    pub user_agent: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
            index_buckets: 16,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            user_agent: format!("cascread/{}", crate::VERSION),
        }
    }
}

impl StorageConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::Setup(format!("invalid storage config: {e}")))
    }

    /// Enable or disable checksum verification
    #[must_use]
    pub const fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Set the frame nesting limit
    #[must_use]
    pub const fn with_max_frame_depth(mut self, depth: u8) -> Self {
        self.max_frame_depth = depth;
        self
    }

    /// Set the number of local index buckets
    #[must_use]
    pub const fn with_index_buckets(mut self, buckets: u8) -> Self {
        self.index_buckets = buckets;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// BLTE decoder settings derived from this configuration
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::default()
            .with_verify_checksums(self.verify_checksums)
            .with_max_frame_depth(self.max_frame_depth)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_overrides_defaults() {
        let config = StorageConfig::from_json_str(
            r#"{"verify_checksums": false, "read_timeout": {"secs": 5, "nanos": 0}}"#,
        )
        .unwrap();
        assert!(!config.verify_checksums);
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.index_buckets, 16);
        assert!(!config.decode_options().verify_checksums);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            StorageConfig::from_json_str("{"),
            Err(StorageError::Setup(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = StorageConfig::default()
            .with_max_frame_depth(2)
            .with_connect_timeout(Duration::from_millis(250))
            .with_user_agent("test");
        assert_eq!(config.decode_options().max_frame_depth, 2);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.user_agent, "test");
    }
}
