//! Remote archive access.
//!
//! Both near-real-time archives serve plain HTTP directory listings, so a
//! listing is just the set of `href` targets on the index page.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use regex::Regex;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ArchiveConfig;

/// Failure talking to a remote archive. Any of these abandons the cycle.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Authentication rejected by {url} ({status})")]
    Auth { url: String, status: StatusCode },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed reading response from {url}: {message}")]
    Body { url: String, message: String },
}

impl TransportError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            Self::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Body {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn from_status(url: &str, status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Auth {
                url: url.to_string(),
                status,
            }
        } else {
            Self::Status {
                url: url.to_string(),
                status,
            }
        }
    }
}

/// A remote file server addressed by directory path and file name.
#[async_trait]
pub trait RemoteArchive: Send + Sync {
    /// Names of the files in a directory, in no particular order.
    async fn list(&self, path: &str) -> Result<Vec<String>, TransportError>;

    /// Full contents of one file.
    async fn retrieve(&self, path: &str, name: &str) -> Result<Bytes, TransportError>;
}

/// HTTP(S) archive with optional basic auth.
///
/// `timeout` applies to each wait on the server, never to a whole transfer,
/// so a slow download that keeps making progress is not cut off.
pub struct HttpArchive {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
    href: Regex,
}

impl HttpArchive {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        let href = Regex::new(r#"(?i)href\s*=\s*"([^"]+)""#)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            timeout,
            href,
        })
    }

    pub fn from_config(config: &ArchiveConfig) -> anyhow::Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.credentials()?,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str, name: &str) -> String {
        let path = path.trim_matches('/');
        match (path.is_empty(), name.is_empty()) {
            (true, true) => format!("{}/", self.base_url),
            (true, false) => format!("{}/{}", self.base_url, name),
            (false, true) => format!("{}/{}/", self.base_url, path),
            (false, false) => format!("{}/{}/{}", self.base_url, path, name),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, TransportError> {
        let mut request = self.client.get(url);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::from_status(url, status));
        }
        Ok(response)
    }

    /// Read the body chunk by chunk, failing only if a chunk stalls.
    async fn read_body(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Bytes, TransportError> {
        let capacity = response.content_length().unwrap_or(0) as usize;
        let mut body = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::time::timeout(self.timeout, stream.next())
                .await
                .map_err(|_| TransportError::Timeout {
                    url: url.to_string(),
                })?;
            match next {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| TransportError::from_reqwest(url, e))?;
                    body.extend_from_slice(&chunk);
                }
                None => break,
            }
        }
        Ok(body.freeze())
    }

    /// File names linked from an index page.
    ///
    /// Sorting links, parent-directory links and subdirectories are dropped;
    /// absolute links are reduced to their last path segment.
    fn parse_index(&self, html: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .href
            .captures_iter(html)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str())
            .filter(|href| !href.starts_with('?') && !href.ends_with('/'))
            .filter_map(|href| href.rsplit('/').next())
            .filter(|name| !name.is_empty() && !name.contains(['?', '#', ':']))
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[async_trait]
impl RemoteArchive for HttpArchive {
    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> Result<Vec<String>, TransportError> {
        let url = self.url(path, "");
        let response = self.get(&url).await?;
        let body = self.read_body(&url, response).await?;
        let names = self.parse_index(&String::from_utf8_lossy(&body));
        debug!(url = %url, count = names.len(), "Listed remote directory");
        Ok(names)
    }

    async fn retrieve(&self, path: &str, name: &str) -> Result<Bytes, TransportError> {
        let url = self.url(path, name);
        let response = self.get(&url).await?;
        let bytes = self.read_body(&url, response).await?;
        debug!(url = %url, bytes = bytes.len(), "Retrieved remote file");
        Ok(bytes)
    }
}

/// Lists a remote directory most-recent-first.
///
/// Every convention starts with a fixed prefix followed by the acquisition
/// date and time, so a descending lexical sort is newest first. It also puts
/// each `.met` sidecar ahead of the data file it describes.
#[derive(Clone)]
pub struct RemoteLister {
    archive: Arc<dyn RemoteArchive>,
}

impl RemoteLister {
    pub fn new(archive: Arc<dyn RemoteArchive>) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &Arc<dyn RemoteArchive> {
        &self.archive
    }

    pub async fn list(&self, path: &str) -> Result<Vec<String>, TransportError> {
        let mut names = self.archive.list(path).await?;
        names.sort_unstable_by(|a, b| b.cmp(a));
        names.dedup();
        Ok(names)
    }
}
