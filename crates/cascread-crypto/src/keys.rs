//! Fixed-size key types used along the resolution chain
//!
//! A root table maps names to [`ContentKey`]s, the encoding table maps
//! content keys to [`EncodingKey`]s, and index tables are keyed by the
//! first nine bytes of an encoding key ([`IndexKey`]).

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Number of encoding key bytes significant for index lookups.
pub const INDEX_KEY_LEN: usize = 9;

/// Identifier of logical file content before encoding (MD5 of the plaintext).
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentKey([u8; 16]);

impl ContentKey {
    /// Create content key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse content key from hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of one encoded (BLTE) representation of some content.
///
/// Local encoding tables only keep the first nine bytes; the remaining
/// bytes of such keys are zero.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EncodingKey([u8; 16]);

impl EncodingKey {
    /// Create encoding key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create an encoding key that only carries its index prefix.
    pub fn from_truncated(key: IndexKey) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..INDEX_KEY_LEN].copy_from_slice(key.as_bytes());
        Self(bytes)
    }

    /// Parse encoding key from hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Key used to look this encoding key up in an index table.
    pub fn truncated(&self) -> IndexKey {
        let mut bytes = [0u8; INDEX_KEY_LEN];
        bytes.copy_from_slice(&self.0[..INDEX_KEY_LEN]);
        IndexKey(bytes)
    }
}

impl fmt::Display for EncodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// First nine bytes of an encoding key.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexKey([u8; INDEX_KEY_LEN]);

impl IndexKey {
    /// Create index key from raw bytes
    pub const fn from_bytes(bytes: [u8; INDEX_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from the leading bytes of a longer key.
    ///
    /// Returns `None` when fewer than nine bytes are given.
    pub fn from_prefix(bytes: &[u8]) -> Option<Self> {
        let prefix = bytes.get(..INDEX_KEY_LEN)?;
        let mut key = [0u8; INDEX_KEY_LEN];
        key.copy_from_slice(prefix);
        Some(Self(key))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; INDEX_KEY_LEN] {
        &self.0
    }

    /// All-zero keys mark padding in index files and never name a record.
    pub fn is_padding(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let hex = "0123456789abcdef0123456789abcdef";
        let key = ContentKey::from_hex(hex).unwrap();
        assert_eq!(key.to_hex(), hex);
        assert_eq!(key.to_string(), hex);
        assert!(ContentKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_truncation_keeps_first_nine_bytes() {
        let ekey = EncodingKey::from_hex("00112233445566778899aabbccddeeff").unwrap();
        let ikey = ekey.truncated();
        assert_eq!(ikey.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

        let short = EncodingKey::from_truncated(ikey);
        assert_eq!(short.truncated(), ikey);
        assert_eq!(&short.as_bytes()[9..], &[0u8; 7]);
    }

    #[test]
    fn test_padding_detection() {
        assert!(IndexKey::default().is_padding());
        assert!(!IndexKey::from_bytes([0, 0, 0, 0, 0, 0, 0, 0, 1]).is_padding());
        assert!(IndexKey::from_prefix(&[1, 2, 3]).is_none());
    }
}
