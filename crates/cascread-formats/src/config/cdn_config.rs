//! CDN configuration

use super::{ConfigError, ConfigFile};

/// CDN configuration: lists the archives whose indices make up the remote
/// index table. An archive's position in the list is its archive id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    file: ConfigFile,
}

impl CdnConfig {
    /// Parse a CDN config
    pub fn parse(data: &[u8]) -> Result<Self, ConfigError> {
        let file = ConfigFile::from_bytes(data)?;
        if let Some(bad) = file
            .get("archives")
            .unwrap_or_default()
            .iter()
            .find(|hash| hash.len() != 32 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(ConfigError::InvalidHash {
                key: "archives",
                value: bad.clone(),
            });
        }
        Ok(Self { file })
    }

    /// Archive hashes in archive-id order
    pub fn archives(&self) -> &[String] {
        self.file.get("archives").unwrap_or_default()
    }

    /// Raw access to any key
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.file.get(key)
    }
}
