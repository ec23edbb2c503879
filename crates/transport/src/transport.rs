//! Request layer bound to one TUS server.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Body, Method, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, info, warn};

use tus_protocol::constants::{TUS_EXTENSION, UPLOAD_LENGTH, UPLOAD_OFFSET};
use tus_protocol::{parse_extensions, parse_offset};

use crate::error::{RequestFailure, TransportError};
use crate::DEFAULT_CONNECT_TIMEOUT;

/// Connection settings for a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Headers merged into every outgoing request. Protocol headers set
    /// per request take precedence.
    pub headers: HeaderMap,
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Offset and length reported by the server for an upload resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetState {
    pub offset: u64,
    pub length: u64,
}

/// Issues TUS requests against a single server.
///
/// The underlying `reqwest` pool keeps the connection alive between
/// requests; the base URL is parsed once and never re-resolved.
pub struct Transport {
    http: reqwest::Client,
    base: Url,
    location: Option<String>,
}

impl Transport {
    /// Creates a transport bound to `url`.
    pub fn new(url: &str, options: TransportOptions) -> Result<Self, TransportError> {
        let base =
            Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let http = reqwest::Client::builder()
            .default_headers(options.headers)
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            location: None,
        })
    }

    /// Path of the upload resource created last, if any.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Forgets the current upload resource.
    pub fn clear_location(&mut self) {
        self.location = None;
    }

    /// Asks the server which protocol extensions it supports.
    ///
    /// Issued once, without retry. A missing `Tus-Extension` header yields
    /// an empty set.
    pub async fn query_capabilities(&self) -> Result<BTreeSet<String>, TransportError> {
        let resp = self
            .http
            .request(Method::OPTIONS, self.base.clone())
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "capability query returned non-success status");
        }

        let extensions = parse_extensions(resp.headers().get(TUS_EXTENSION));
        debug!(?extensions, "server capabilities");
        Ok(extensions)
    }

    /// Creates a new upload resource and remembers its location.
    ///
    /// The whole request is retried up to `retries` times, but only when
    /// no response arrives at all; any response ends the retry loop.
    pub async fn create_resource(
        &mut self,
        headers: HeaderMap,
        retries: u32,
    ) -> Result<String, TransportError> {
        let url = self.base.clone();
        let resp = self
            .send_with_retries("create", retries, || {
                self.http.post(url.clone()).headers(headers.clone())
            })
            .await
            .map_err(TransportError::CreationRejected)?;

        if resp.status() != StatusCode::CREATED {
            return Err(TransportError::CreationRejected(RequestFailure::Status(
                resp.status(),
            )));
        }

        let path = self.resolve_location(&resp)?;
        info!(location = %path, "upload resource created");
        self.location = Some(path.clone());
        Ok(path)
    }

    /// Fetches the server's offset and total length for the current resource.
    pub async fn query_offset(&self, headers: HeaderMap) -> Result<OffsetState, TransportError> {
        let url = self.resource_url()?;
        let resp = self
            .http
            .head(url)
            .headers(headers)
            .send()
            .await
            .map_err(|source| {
                TransportError::OffsetQueryFailed(RequestFailure::Transport {
                    attempts: 1,
                    source,
                })
            })?;

        if resp.status() != StatusCode::OK {
            return Err(TransportError::OffsetQueryFailed(RequestFailure::Status(
                resp.status(),
            )));
        }

        let state = OffsetState {
            offset: parse_offset(resp.headers().get(UPLOAD_OFFSET)),
            length: parse_offset(resp.headers().get(UPLOAD_LENGTH)),
        };
        debug!(offset = state.offset, length = state.length, "upload state");
        Ok(state)
    }

    /// Streams a request body to the current resource and returns the
    /// offset the server acknowledged.
    ///
    /// `body` is called once per attempt. A retried attempt re-sends
    /// whatever the body factory yields at that point; for a non-seekable
    /// source that is the unread remainder, not the original chunk.
    pub async fn send_chunk<F>(
        &self,
        headers: HeaderMap,
        retries: u32,
        mut body: F,
    ) -> Result<u64, TransportError>
    where
        F: FnMut() -> Body,
    {
        let url = self.resource_url()?;
        let resp = self
            .send_with_retries("patch", retries, || {
                self.http
                    .patch(url.clone())
                    .headers(headers.clone())
                    .body(body())
            })
            .await
            .map_err(TransportError::PatchRejected)?;

        if resp.status() != StatusCode::NO_CONTENT {
            return Err(TransportError::PatchRejected(RequestFailure::Status(
                resp.status(),
            )));
        }

        Ok(parse_offset(resp.headers().get(UPLOAD_OFFSET)))
    }

    /// Sends the request built by `build`, retrying on transport errors.
    async fn send_with_retries<B>(
        &self,
        op: &'static str,
        retries: u32,
        mut build: B,
    ) -> Result<Response, RequestFailure>
    where
        B: FnMut() -> RequestBuilder,
    {
        let attempts = retries.max(1);
        let mut attempt = 1;
        loop {
            match build().send().await {
                Ok(resp) => {
                    debug!(op, attempt, status = %resp.status(), "response received");
                    return Ok(resp);
                }
                Err(source) if attempt >= attempts => {
                    warn!(op, attempts, error = %source, "retry budget exhausted");
                    return Err(RequestFailure::Transport { attempts, source });
                }
                Err(e) => {
                    warn!(op, attempt, attempts, error = %e, "request attempt failed, retrying");
                    attempt += 1;
                }
            }
        }
    }

    /// Extracts the path of the `Location` header, resolving relative values
    /// against the base URL.
    fn resolve_location(&self, resp: &Response) -> Result<String, TransportError> {
        let raw = resp.headers().get(LOCATION).ok_or_else(|| {
            TransportError::MalformedResponse("missing 'Location' header".into())
        })?;
        let raw = raw.to_str().map_err(|_| {
            TransportError::MalformedResponse("non-ASCII 'Location' header".into())
        })?;
        let resolved = self.base.join(raw).map_err(|e| {
            TransportError::MalformedResponse(format!("unparsable 'Location' {raw:?}: {e}"))
        })?;
        Ok(resolved.path().to_string())
    }

    fn resource_url(&self) -> Result<Url, TransportError> {
        let path = self
            .location
            .as_deref()
            .ok_or(TransportError::NoRemoteResource)?;
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        Ok(url)
    }
}
