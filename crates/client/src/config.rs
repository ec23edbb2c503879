//! Client configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use tus_protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_RETRIES, Metadata, TUS_VERSION};
use tus_stream::DEFAULT_PIPE_CAPACITY;

use crate::error::UploadError;

/// Settings for a [`Client`](crate::Client).
///
/// Every field except `url` has a default, so partial JSON or TOML
/// documents deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upload creation endpoint of the TUS server.
    pub url: String,

    /// Attempts per create/patch request (must be positive).
    pub retries: u32,

    /// Upper bound for a single read from the upload source.
    pub chunk_size: usize,

    /// Upload metadata; `None` values are sent as bare keys.
    pub metadata: BTreeMap<String, Option<String>>,

    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,

    /// Value of the `Tus-Resumable` header.
    pub tus_version: String,

    pub connect_timeout_secs: u64,

    /// Buffer between download and upload for remote sources.
    pub pipe_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            retries: DEFAULT_RETRIES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            metadata: BTreeMap::new(),
            headers: BTreeMap::new(),
            tus_version: TUS_VERSION.to_string(),
            connect_timeout_secs: tus_transport::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Default configuration for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Checks every field without touching the network.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.url.trim().is_empty() {
            return Err(UploadError::Validation("server URL is required".into()));
        }
        if self.retries == 0 {
            return Err(UploadError::Validation(
                "retries must be a positive integer".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::Validation(
                "chunk size must be a positive integer".into(),
            ));
        }
        self.build_metadata()?;
        self.build_headers()?;
        self.version_header()?;
        Ok(())
    }

    /// Converts the configured metadata into a validated [`Metadata`] set.
    pub fn build_metadata(&self) -> Result<Metadata, UploadError> {
        let mut metadata = Metadata::new();
        for (key, value) in &self.metadata {
            metadata
                .insert(key.clone(), value.as_ref().map(|v| v.as_bytes().to_vec()))
                .map_err(|e| UploadError::Validation(e.to_string()))?;
        }
        Ok(metadata)
    }

    /// Converts the configured extra headers into a [`HeaderMap`].
    pub fn build_headers(&self) -> Result<HeaderMap, UploadError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| UploadError::Validation(format!("invalid header name {name:?}")))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                UploadError::Validation(format!("invalid value for header {name}"))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub(crate) fn version_header(&self) -> Result<HeaderValue, UploadError> {
        HeaderValue::from_str(&self.tus_version).map_err(|_| {
            UploadError::Validation(format!("invalid TUS version {:?}", self.tus_version))
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
