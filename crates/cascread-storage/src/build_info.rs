//! `.build.info` parser for installation metadata.
//!
//! The `.build.info` file is a BPSV document at the installation root.
//! Each row describes one installed branch; the row with `Active` set to
//! `1` names the build config of the installed build.

use std::path::Path;

use cascread_formats::bpsv::{BpsvDocument, BpsvRow};

use crate::{Result, StorageError};

/// Build metadata of the active `.build.info` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Build config hash
    pub build_key: String,
    /// CDN config hash, if recorded
    pub cdn_key: Option<String>,
    /// CDN path prefix, if recorded
    pub cdn_path: Option<String>,
    /// CDN host names
    pub cdn_hosts: Vec<String>,
    /// Version string, if recorded
    pub version: Option<String>,
}

impl BuildInfo {
    /// Parse `.build.info` contents and select the active row.
    ///
    /// Falls back to the first row when no row is marked active.
    pub fn parse_str(content: &str) -> Result<Self> {
        let document = BpsvDocument::parse(content)?;
        let row = document
            .find("Active", "1")
            .or_else(|| document.rows().first())
            .ok_or_else(|| StorageError::Setup(".build.info has no rows".into()))?;
        Self::from_row(row)
    }

    /// Read and parse a `.build.info` file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read .build.info at {}: {e}", path.display()),
            ))
        })?;
        Self::parse_str(&content)
    }

    fn from_row(row: &BpsvRow) -> Result<Self> {
        let build_key = row
            .get_non_empty("Build Key")
            .ok_or_else(|| StorageError::Setup(".build.info row has no Build Key".into()))?;

        Ok(Self {
            build_key: build_key.to_string(),
            cdn_key: row.get_non_empty("CDN Key").map(str::to_string),
            cdn_path: row.get_non_empty("CDN Path").map(str::to_string),
            cdn_hosts: row
                .get("CDN Hosts")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            version: row.get_non_empty("Version").map(str::to_string),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const CONTENT: &str = "Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Key!HEX:16|CDN Path!STRING:0|CDN Hosts!STRING:0|Version!STRING:0\n\
        eu|0|aaaa|bbbb|tpr/wow|eu.cdn.example|1.0.0.1\n\
        us|1|cccc|dddd|tpr/wow|us.cdn.example level3.example|1.0.0.2\n";

    #[test]
    fn test_active_row_selected() {
        let info = BuildInfo::parse_str(CONTENT).unwrap();
        assert_eq!(info.build_key, "cccc");
        assert_eq!(info.cdn_key.as_deref(), Some("dddd"));
        assert_eq!(info.cdn_path.as_deref(), Some("tpr/wow"));
        assert_eq!(info.cdn_hosts, vec!["us.cdn.example", "level3.example"]);
        assert_eq!(info.version.as_deref(), Some("1.0.0.2"));
    }

    #[test]
    fn test_missing_build_key() {
        let err = BuildInfo::parse_str("Active!DEC:1|Build Key!HEX:16\n1|\n").unwrap_err();
        assert!(matches!(err, StorageError::Setup(_)));
    }

    #[test]
    fn test_no_rows() {
        assert!(BuildInfo::parse_str("Active!DEC:1|Build Key!HEX:16\n").is_err());
    }
}
