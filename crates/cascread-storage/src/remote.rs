//! Remote CDN backend
//!
//! Everything is addressed by hash below `http://<host>/<path>/`:
//!
//! - `config/ab/cd/<hash>`: build and CDN configs
//! - `data/ab/cd/<hash>.index`: archive indices
//! - `data/ab/cd/<hash>`: archives (read with range requests) and loose
//!   records such as the encoding file

use std::io::{self, Read};

use cascread_crypto::EncodingKey;
use cascread_formats::bpsv::BpsvDocument;
use cascread_formats::config::{BuildConfig, CdnConfig};
use cascread_formats::index::{IndexEntry, IndexLayout};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::RANGE;
use tracing::{debug, info};
use url::Url;

use crate::config::StorageConfig;
use crate::source::{ByteSource, IndexShard, RecordReader};
use crate::{Result, StorageError};

/// Default patch service port
pub const PATCH_SERVICE_PORT: u16 = 1119;

/// Where a build lives on a CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnLocator {
    /// CDN host names, optionally with a port; the first one is used
    pub hosts: Vec<String>,
    /// Path prefix below the host (for example `tpr/wow`)
    pub path: String,
    /// Build config hash
    pub build_config: String,
    /// CDN config hash
    pub cdn_config: String,
    /// URL scheme
    pub scheme: String,
}

impl CdnLocator {
    /// Locator for explicitly known hashes, using plain HTTP.
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        build_config: impl Into<String>,
        cdn_config: impl Into<String>,
    ) -> Self {
        Self {
            hosts: vec![host.into()],
            path: path.into(),
            build_config: build_config.into(),
            cdn_config: cdn_config.into(),
            scheme: "http".to_string(),
        }
    }

    /// Look up the current build of `product` in `region` from the public
    /// patch service.
    pub fn discover(region: &str, product: &str, config: &StorageConfig) -> Result<Self> {
        let service = format!("http://{region}.patch.battle.net:{PATCH_SERVICE_PORT}/");
        let service = Url::parse(&service).map_err(|e| StorageError::Setup(format!("invalid patch service URL: {e}")))?;
        Self::discover_from(&service, region, product, config)
    }

    /// Look up a build from a patch service at `service`, which serves
    /// `<product>/versions` and `<product>/cdns`.
    pub fn discover_from(service: &Url, region: &str, product: &str, config: &StorageConfig) -> Result<Self> {
        let client = build_client(config)?;

        let versions = fetch_document(&client, &join(service, &format!("{product}/versions"))?)?;
        let version = versions
            .find("Region", region)
            .ok_or_else(|| StorageError::Setup(format!("no {product} version for region {region}")))?;
        let build_config = required(version.get_non_empty("BuildConfig"), "BuildConfig")?;
        let cdn_config = required(version.get_non_empty("CDNConfig"), "CDNConfig")?;

        let cdns = fetch_document(&client, &join(service, &format!("{product}/cdns"))?)?;
        let cdn = cdns
            .find("Name", region)
            .ok_or_else(|| StorageError::Setup(format!("no {product} CDN for region {region}")))?;
        let path = required(cdn.get_non_empty("Path"), "Path")?;
        let hosts: Vec<String> = cdn
            .get("Hosts")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            return Err(StorageError::Setup(format!("CDN entry for {region} lists no hosts")));
        }

        info!(
            "discovered {} build config {} on {} hosts",
            product,
            build_config,
            hosts.len()
        );

        Ok(Self {
            hosts,
            path: path.to_string(),
            build_config: build_config.to_string(),
            cdn_config: cdn_config.to_string(),
            scheme: "http".to_string(),
        })
    }

    fn base_url(&self) -> Result<Url> {
        let host = self
            .hosts
            .first()
            .ok_or_else(|| StorageError::Setup("CDN locator has no hosts".into()))?;
        let path = self.path.trim_matches('/');
        let base = format!("{}://{host}/{path}/", self.scheme);
        Url::parse(&base).map_err(|e| StorageError::Setup(format!("invalid CDN URL {base}: {e}")))
    }
}

/// Byte source over a CDN.
pub struct RemoteCdn {
    client: Client,
    base: Url,
    build_config: BuildConfig,
    archives: Vec<String>,
}

impl RemoteCdn {
    /// Connect to the CDN and fetch the build and CDN configs.
    pub fn open(locator: &CdnLocator, config: &StorageConfig) -> Result<Self> {
        let client = build_client(config)?;
        let base = locator.base_url()?;

        let build_config = BuildConfig::parse(&fetch_config(&client, &base, &locator.build_config)?)?;
        let cdn_config = CdnConfig::parse(&fetch_config(&client, &base, &locator.cdn_config)?)?;
        let archives = cdn_config.archives().to_vec();

        info!("opened CDN {} with {} archives", base, archives.len());
        Ok(Self {
            client,
            base,
            build_config,
            archives,
        })
    }

    /// Archive hashes in archive-id order
    pub fn archives(&self) -> &[String] {
        &self.archives
    }

    /// Stream `len` bytes of an archive starting at `offset`.
    pub fn fetch_range(&self, archive: &str, offset: u64, len: u64) -> Result<RecordReader> {
        let url = self.hashed_url("data", archive, "")?;
        if len == 0 {
            return Ok(RecordReader::new(io::empty(), Some(0)));
        }

        let range = format!("bytes={}-{}", offset, offset + len - 1);
        let response = self
            .send(&url, Some(&range))?
            .ok_or_else(|| StorageError::HttpStatus {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
            })?;

        if response.status() == StatusCode::PARTIAL_CONTENT {
            return Ok(RecordReader::new(response.take(len), Some(len)));
        }

        // Server ignored the range and sent the whole archive
        debug!("{} ignored range request, skipping {} bytes", url, offset);
        let mut response = response;
        io::copy(&mut (&mut response).take(offset), &mut io::sink())?;
        Ok(RecordReader::new(response.take(len), Some(len)))
    }

    fn hashed_url(&self, kind: &str, hash: &str, suffix: &str) -> Result<Url> {
        hashed_url(&self.base, kind, hash, suffix)
    }

    /// GET a URL. `Ok(None)` for 404.
    fn send(&self, url: &Url, range: Option<&str>) -> Result<Option<Response>> {
        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        check_status(url, request.send())
    }
}

impl ByteSource for RemoteCdn {
    fn layout(&self) -> IndexLayout {
        IndexLayout::Archive
    }

    fn build_config(&self) -> &BuildConfig {
        &self.build_config
    }

    fn index_shards(&self) -> Result<Vec<IndexShard>> {
        self.archives
            .iter()
            .enumerate()
            .map(|(id, hash)| {
                let archive_id = u16::try_from(id)
                    .map_err(|_| StorageError::Setup(format!("too many archives: {}", self.archives.len())))?;
                Ok(IndexShard {
                    name: format!("{hash}.index"),
                    archive_id,
                })
            })
            .collect()
    }

    fn read_index_shard(&self, shard: &IndexShard) -> Result<Vec<u8>> {
        let hash = self
            .archives
            .get(usize::from(shard.archive_id))
            .ok_or_else(|| StorageError::Setup(format!("unknown archive id {}", shard.archive_id)))?;
        let url = self.hashed_url("data", hash, ".index")?;
        let mut response = self.send(&url, None)?.ok_or_else(|| StorageError::HttpStatus {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND.as_u16(),
        })?;
        let mut data = Vec::new();
        response.read_to_end(&mut data)?;
        Ok(data)
    }

    fn open_record(&self, entry: &IndexEntry) -> Result<RecordReader> {
        let archive = self
            .archives
            .get(usize::from(entry.archive_id))
            .ok_or_else(|| StorageError::Archive(format!("unknown archive id {}", entry.archive_id)))?;
        self.fetch_range(archive, entry.offset, u64::from(entry.size))
    }

    fn open_loose(&self, key: &EncodingKey) -> Result<Option<RecordReader>> {
        let url = self.hashed_url("data", &key.to_hex(), "")?;
        Ok(self.send(&url, None)?.map(|response| {
            let len = response.content_length();
            RecordReader::new(response, len)
        }))
    }
}

impl std::fmt::Debug for RemoteCdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCdn")
            .field("base", &self.base.as_str())
            .field("archives", &self.archives.len())
            .finish_non_exhaustive()
    }
}

fn build_client(config: &StorageConfig) -> Result<Client> {
    // Ignore the error: another client may have installed it already
    let _ = rustls::crypto::ring::default_provider().install_default();

    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.read_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|source| StorageError::Transport {
            url: String::new(),
            source,
        })
}

fn fetch_config(client: &Client, base: &Url, hash: &str) -> Result<Vec<u8>> {
    let url = hashed_url(base, "config", hash, "")?;
    let mut response = check_status(&url, client.get(url.clone()).send())?
        .ok_or_else(|| StorageError::Setup(format!("config {hash} not found at {url}")))?;
    let mut data = Vec::new();
    response.read_to_end(&mut data)?;
    Ok(data)
}

/// `<base>/<kind>/ab/cd/<hash><suffix>` for a hex hash.
fn hashed_url(base: &Url, kind: &str, hash: &str, suffix: &str) -> Result<Url> {
    let hash = hash.trim().to_ascii_lowercase();
    if hash.len() < 4 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StorageError::Setup(format!("invalid hash '{hash}'")));
    }
    join(base, &format!("{kind}/{}/{}/{hash}{suffix}", &hash[0..2], &hash[2..4]))
}

fn fetch_document(client: &Client, url: &Url) -> Result<BpsvDocument> {
    let response = check_status(url, client.get(url.clone()).send())?
        .ok_or_else(|| StorageError::Setup(format!("{url} not found")))?;
    let text = response.text().map_err(|source| StorageError::Transport {
        url: url.to_string(),
        source,
    })?;
    Ok(BpsvDocument::parse(&text)?)
}

fn check_status(url: &Url, sent: reqwest::Result<Response>) -> Result<Option<Response>> {
    let response = sent.map_err(|source| StorageError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(StorageError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(Some(response))
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| StorageError::Setup(format!("invalid URL {base}{path}: {e}")))
}

fn required<'a>(value: Option<&'a str>, column: &str) -> Result<&'a str> {
    value.ok_or_else(|| StorageError::Setup(format!("missing {column} column")))
}
