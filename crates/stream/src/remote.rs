//! Remote HTTP resources used as upload sources.

use reqwest::header::CONTENT_LENGTH;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pipe::{PipeSource, ProducerWorker};
use crate::StreamError;

/// Fetches a remote resource so it can be uploaded while it downloads.
#[derive(Clone, Default)]
pub struct RemoteSource {
    http: reqwest::Client,
}

impl RemoteSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Reads the resource size from a `HEAD` request.
    ///
    /// Returns `None` if `Content-Length` is absent, unparsable or not
    /// positive.
    pub async fn probe_length(&self, url: &str) -> Result<Option<u64>, StreamError> {
        let resp = self.http.head(url).send().await?;
        if !resp.status().is_success() {
            return Err(StreamError::Status(resp.status()));
        }

        // `Response::content_length` reflects the (empty) HEAD body, so the
        // header is read directly.
        let length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|len| *len > 0);
        debug!(url, ?length, "remote source length");
        Ok(length)
    }

    /// Starts downloading `url` into a pipe of `capacity` bytes.
    ///
    /// The returned source yields the body as it arrives. The producer task
    /// stops when `cancel` fires or when the source is closed.
    pub async fn open(
        &self,
        url: &str,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Result<PipeSource, StreamError> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(StreamError::Status(resp.status()));
        }

        let (writer, reader) = tokio::io::duplex(capacity.max(1));
        let worker = ProducerWorker::spawn(resp.bytes_stream(), writer, cancel);
        info!(url, capacity, "remote download started");
        Ok(PipeSource::new(reader, worker))
    }
}
