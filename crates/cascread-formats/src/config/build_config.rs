//! Build configuration

use cascread_crypto::{ContentKey, EncodingKey};

use super::{ConfigError, ConfigFile};

/// Build configuration: names the root and encoding files of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    file: ConfigFile,
    root: ContentKey,
    encoding_content: ContentKey,
    encoding: EncodingKey,
}

impl BuildConfig {
    /// Parse a build config and extract the bootstrap keys.
    ///
    /// `encoding` carries the content key followed by the encoding key.
    pub fn parse(data: &[u8]) -> Result<Self, ConfigError> {
        let file = ConfigFile::from_bytes(data)?;

        let root = first_value(&file, "root")?;
        let root = ContentKey::from_hex(root).map_err(|_| invalid("root", root))?;

        let encoding = file.get("encoding").ok_or(ConfigError::MissingKey("encoding"))?;
        let [ckey, ekey, ..] = encoding else {
            return Err(invalid("encoding", &encoding.join(" ")));
        };
        let encoding_content = ContentKey::from_hex(ckey).map_err(|_| invalid("encoding", ckey))?;
        let encoding_key = EncodingKey::from_hex(ekey).map_err(|_| invalid("encoding", ekey))?;

        Ok(Self {
            file,
            root,
            encoding_content,
            encoding: encoding_key,
        })
    }

    /// Content key of the root file
    pub fn root(&self) -> ContentKey {
        self.root
    }

    /// Content key of the encoding file
    pub fn encoding_content_key(&self) -> ContentKey {
        self.encoding_content
    }

    /// Encoding key of the encoding file
    pub fn encoding_key(&self) -> EncodingKey {
        self.encoding
    }

    /// Build name, if present
    pub fn build_name(&self) -> Option<&str> {
        self.file
            .get("build-name")
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Raw access to any key
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.file.get(key)
    }
}

fn first_value<'a>(file: &'a ConfigFile, key: &'static str) -> Result<&'a str, ConfigError> {
    file.get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
        .ok_or(ConfigError::MissingKey(key))
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidHash {
        key,
        value: value.to_string(),
    }
}
