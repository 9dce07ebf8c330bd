//! Blob store client for an HTTP object store.
//!
//! Objects are addressed as `<endpoint>/<bucket>/<key>` and manipulated with
//! plain `PUT`, `GET`, `HEAD` and `DELETE` requests. Public links are built
//! from a separate base URL (typically a CDN or the store's public host).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use url::Url;

use super::storage::{encode_key, BlobStore};
use crate::{DriveError, Result};

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Blob store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    public_base_url: String,
}

impl HttpBlobStore {
    /// Create a client for `bucket` on the object store at `endpoint`.
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("clouddrive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DriveError::Config(format!("failed to build HTTP client: {e}")))?;

        Self::with_client(client, endpoint, bucket, public_base_url)
    }

    /// Create a store using an existing `reqwest` client.
    pub fn with_client(
        client: Client,
        endpoint: &str,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| DriveError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
        let bucket = bucket.into();
        if bucket.is_empty() || bucket.contains('/') {
            return Err(DriveError::Config(format!("invalid bucket name {bucket:?}")));
        }

        Ok(Self {
            client,
            endpoint,
            bucket,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Bucket this client writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|s| s == "..") {
            return Err(DriveError::Validation(format!("invalid blob key: {key:?}")));
        }
        Ok(())
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        Self::check_key(key)?;
        let base = self.endpoint.as_str().trim_end_matches('/');
        let raw = format!("{base}/{}/{}", self.bucket, encode_key(key));
        Url::parse(&raw).map_err(|e| DriveError::Validation(format!("invalid blob key {key:?}: {e}")))
    }

    fn status_error(method: &str, key: &str, status: StatusCode) -> DriveError {
        if status == StatusCode::NOT_FOUND {
            DriveError::NotFound(format!("blob {key}"))
        } else {
            DriveError::Http(format!("{method} {key} returned {status}"))
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(skip(self, content), fields(bucket = %self.bucket, size = content.len()))]
    async fn put(&self, path: &str, content: &[u8], content_type: &str) -> Result<String> {
        let url = self.object_url(path)?;

        let response = self
            .client
            .put(url.clone())
            .header(header::CONTENT_TYPE, content_type)
            .body(content.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error("PUT", path, status));
        }

        tracing::debug!(%url, "Stored blob");
        Ok(url.to_string())
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        Self::check_key(path)?;
        Ok(format!(
            "{}/{}/{}",
            self.public_base_url,
            self.bucket,
            encode_key(path)
        ))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(path)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error("GET", path, status));
        }

        Ok(response.bytes().await?.to_vec())
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.object_url(path)?;

        let response = self.client.delete(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error("DELETE", path, status));
        }

        tracing::debug!("Deleted blob");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.object_url(path)?;

        let response = self.client.head(url).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(Self::status_error("HEAD", path, s)),
        }
    }
}
