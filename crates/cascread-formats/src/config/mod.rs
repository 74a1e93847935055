//! Build and CDN configuration files
//!
//! Both are `key = value` text files where a value may hold several
//! space-separated hashes. Only the keys needed to bootstrap a storage are
//! given typed accessors; everything else stays available through
//! [`ConfigFile::get`].

mod build_config;
mod cdn_config;

pub use build_config::BuildConfig;
pub use cdn_config::CdnConfig;

use std::collections::HashMap;

use thiserror::Error;

/// Configuration parse errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key is missing
    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    /// A value is not the expected hex hash
    #[error("invalid hash for '{key}': {value}")]
    InvalidHash {
        /// Key holding the value
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// Input is not UTF-8
    #[error("config is not valid UTF-8")]
    InvalidUtf8,
}

/// Generic `key = value` configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    entries: HashMap<String, Vec<String>>,
}

impl ConfigFile {
    /// Parse config text. Comments and malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(parse_line)
            .map(|(key, value)| {
                let values = value.split_whitespace().map(str::to_string).collect();
                (key, values)
            })
            .collect();
        Self { entries }
    }

    /// Parse raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        std::str::from_utf8(data)
            .map(Self::parse)
            .map_err(|_| ConfigError::InvalidUtf8)
    }

    /// Values of a key
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || !is_valid_key(key) {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn is_valid_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}
