use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::collector::extract;
use crate::core::model::{Candidate, HeadMeta};
use crate::error::FetchError;

/// Declared sizes are scaled against this baseline when computing payload
/// fetch timeouts: a job twice the baseline gets twice the base timeout.
const SIZE_BASELINE: u64 = 100 * 1024;

/// Network environment for the collector and the download engine.
///
/// `head` and `fetch_page` swallow their failures (`None` / empty) because a
/// failed probe is "no metadata" and a failed expansion contributes nothing;
/// `fetch_blob` failures are surfaced so the engine can drop the single job.
#[async_trait]
pub trait Net: Send + Sync {
    /// Headers-only metadata probe. Resolves as soon as response headers
    /// arrive, without waiting for the body.
    async fn head(&self, src: &str) -> Option<HeadMeta>;

    /// Fetches `src` as a document and extracts its candidates. Anchors are
    /// included only when `extract_links` is set.
    async fn fetch_page(&self, src: &str, extract_links: bool) -> Vec<Candidate>;

    /// Fetches a binary payload with a timeout scaled to `declared_size`.
    async fn fetch_blob(&self, src: &str, declared_size: u64) -> Result<Bytes, FetchError>;
}

/// Platform save facility: individual file saves and archive blob emission.
/// Implementations uniquify on name conflict.
#[async_trait]
pub trait Saver: Send + Sync {
    async fn save_blob(&self, data: &[u8], filename: &str, save_as: bool)
        -> anyhow::Result<PathBuf>;

    async fn save_url(&self, src: &str, rel_path: &Path) -> anyhow::Result<PathBuf>;
}

/// reqwest-backed [`Net`].
#[derive(Clone)]
pub struct HttpNet {
    client: Client,
    timeout: Duration,
}

impl HttpNet {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(user_agent.to_string())
            .build()
            .expect("client");
        Self { client, timeout }
    }

    /// Base timeout, scaled up proportionally for payloads declared larger
    /// than the baseline so slow large transfers are tolerated without
    /// waiting indefinitely on small ones.
    fn scaled_timeout(&self, declared_size: u64) -> Duration {
        let scaled = self.timeout.as_millis() as u64 * declared_size / SIZE_BASELINE;
        self.timeout.max(Duration::from_millis(scaled))
    }

    /// Fetches a page as text, returning the final URL (after redirects)
    /// alongside the body.
    pub async fn fetch_text(&self, src: &str) -> Result<(Url, String), FetchError> {
        let resp = self
            .client
            .get(src)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_timeout(self.timeout))?;
        let base = resp.url().clone();
        let body = resp.text().await.map_err(map_timeout(self.timeout))?;
        Ok((base, body))
    }
}

fn map_timeout(limit: Duration) -> impl Fn(reqwest::Error) -> FetchError {
    move |e| {
        if e.is_timeout() {
            FetchError::Timeout(limit)
        } else {
            FetchError::Http(e)
        }
    }
}

/// Mediatype declared inside a `data:` URL header, when present.
fn data_url_meta(src: &str) -> HeadMeta {
    let header = src
        .strip_prefix("data:")
        .and_then(|rest| rest.split(',').next())
        .unwrap_or("");
    let mediatype = header.split(';').next().unwrap_or("");
    HeadMeta {
        r#type: if mediatype.is_empty() {
            // RFC 2397 default
            "text/plain".to_string()
        } else {
            mediatype.to_string()
        },
        size: None,
        disposition: String::new(),
    }
}

#[async_trait]
impl Net for HttpNet {
    async fn head(&self, src: &str) -> Option<HeadMeta> {
        // data URLs carry their own type; there is nothing to probe
        if src.starts_with("data:") {
            return Some(data_url_meta(src));
        }
        // GET, not HEAD: HEAD is not universally supported. The response is
        // dropped as soon as headers arrive, regardless of status, since an
        // error page still declares a usable content-type.
        let resp = match self.client.get(src).timeout(self.timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(src, error = %e, "metadata probe failed");
                return None;
            }
        };
        let headers = resp.headers();
        Some(HeadMeta {
            r#type: headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("")
                .to_string(),
            size: headers
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok()),
            disposition: headers
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("")
                .to_string(),
        })
    }

    async fn fetch_page(&self, src: &str, extract_links: bool) -> Vec<Candidate> {
        match self.fetch_text(src).await {
            Ok((base, body)) => extract::extract(&body, &base, extract_links),
            Err(e) => {
                debug!(src, error = %e, "page fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_blob(&self, src: &str, declared_size: u64) -> Result<Bytes, FetchError> {
        let limit = self.scaled_timeout(declared_size);
        let fetch = async {
            let resp = self.client.get(src).send().await?;
            if !resp.status().is_success() {
                return Err(FetchError::Status(resp.status()));
            }
            Ok(resp.bytes().await?)
        };
        tokio::time::timeout(limit, fetch)
            .await
            .map_err(|_| FetchError::Timeout(limit))?
    }
}

/// [`Saver`] writing under a base directory, uniquifying on conflict. There
/// is no interactive surface, so `save_as` is honored as a no-op.
pub struct FsSaver {
    base: PathBuf,
    client: Client,
}

impl FsSaver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            client: Client::builder()
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .expect("client"),
        }
    }

    async fn unique_path(&self, rel: &Path) -> anyhow::Result<PathBuf> {
        let target = self.base.join(rel);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(&target).await? {
            return Ok(target);
        }
        let stem = target
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("download")
            .to_string();
        let ext = target.extension().and_then(|s| s.to_str()).map(str::to_string);
        let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
        for n in 1.. {
            let name = match &ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            let candidate = dir.join(name);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        unreachable!()
    }
}

#[async_trait]
impl Saver for FsSaver {
    async fn save_blob(&self, data: &[u8], filename: &str, save_as: bool) -> anyhow::Result<PathBuf> {
        if save_as {
            debug!(filename, "no save dialog available, saving directly");
        }
        let path = self.unique_path(Path::new(filename)).await?;
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    async fn save_url(&self, src: &str, rel_path: &Path) -> anyhow::Result<PathBuf> {
        let path = self.unique_path(rel_path).await?;
        let resp = self.client.get(src).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("HTTP {}", resp.status());
        }
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(path)
    }
}
