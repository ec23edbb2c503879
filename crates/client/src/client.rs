//! Upload orchestrator.
//!
//! Drives one upload at a time through capability check, resource
//! creation, offset reconciliation and a single streamed `PATCH`, and
//! always closes the source on the way out.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tus_protocol::constants::{TUS_RESUMABLE, UPLOAD_LENGTH, UPLOAD_METADATA, UPLOAD_OFFSET};
use tus_protocol::{EXTENSION_CREATION, Metadata, OFFSET_OCTET_STREAM};
use tus_stream::{
    FileSource, ObservedStream, ProgressCallback, RemoteSource, STREAM_BUFFER_SIZE, SharedSource,
    UploadSource,
};
use tus_transport::{Transport, TransportError, TransportOptions};

use crate::config::ClientConfig;
use crate::error::{BrokenCause, UploadError};
use crate::session::UploadSession;

/// A completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    /// Path of the upload resource on the server.
    pub location: String,
    /// Bytes the server holds, equal to the source length.
    pub length: u64,
}

/// TUS upload client bound to one server.
pub struct Client {
    transport: Transport,
    remote: RemoteSource,
    config: ClientConfig,
    version: HeaderValue,
    metadata: HeaderValue,
    capabilities: BTreeSet<String>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Client {
    /// Validates `config`, then asks the server for its capabilities.
    pub async fn connect(config: ClientConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let version = config.version_header()?;
        let metadata = encode_metadata(&config.build_metadata()?)?;

        let transport = Transport::new(
            &config.url,
            TransportOptions {
                headers: config.build_headers()?,
                connect_timeout: config.connect_timeout(),
            },
        )?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(TransportError::Http)?;

        let capabilities = transport.query_capabilities().await?;
        info!(url = %config.url, ?capabilities, "connected to TUS server");

        Ok(Self {
            transport,
            remote: RemoteSource::new(http),
            config,
            version,
            metadata,
            capabilities,
            progress: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Extensions advertised by the server at connect time.
    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.capabilities.contains(extension)
    }

    /// Token that aborts the running upload and its producer task.
    ///
    /// Once cancelled, every later upload on this client fails with
    /// [`UploadError::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Registers a callback receiving `(bytes_read, total_length)` before
    /// each read from the upload source, and once more with the offset the
    /// server acknowledged.
    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// Replaces the metadata sent with new uploads.
    pub fn set_metadata(&mut self, metadata: &Metadata) -> Result<(), UploadError> {
        self.metadata = encode_metadata(metadata)?;
        Ok(())
    }

    /// Uploads a local file.
    pub async fn upload_file(&mut self, path: impl AsRef<Path>) -> Result<Uploaded, UploadError> {
        let path = path.as_ref();
        let source = FileSource::open(path).await?;
        let length = source.len();
        info!(path = %path.display(), length, "uploading file");
        self.upload_stream(Some(length), source).await
    }

    /// Uploads a remote resource while it is being downloaded.
    ///
    /// The size comes from the resource's `Content-Length`; a missing or
    /// zero size fails with [`UploadError::UnknownLength`].
    pub async fn upload_url(&mut self, url: &str) -> Result<Uploaded, UploadError> {
        let length = with_cancel(&self.cancel, self.remote.probe_length(url))
            .await?
            .ok_or(UploadError::UnknownLength)?;
        info!(url, length, "uploading remote resource");

        let source = with_cancel(
            &self.cancel,
            self.remote
                .open(url, self.config.pipe_capacity, self.cancel.child_token()),
        )
        .await?;
        self.upload_stream(Some(length), source).await
    }

    /// Uploads `total_length` bytes read from `source`.
    ///
    /// The source is closed whether the upload succeeds or not.
    pub async fn upload_stream<S: UploadSource>(
        &mut self,
        total_length: Option<u64>,
        source: S,
    ) -> Result<Uploaded, UploadError> {
        let read_size = self.config.chunk_size.min(STREAM_BUFFER_SIZE);
        let observed =
            ObservedStream::new(source, total_length.unwrap_or(0), self.progress.clone());
        let shared = SharedSource::new(observed, read_size);

        let result = match total_length {
            Some(total) => self.run(total, &shared).await,
            None => Err(UploadError::UnknownLength),
        };
        let closed = shared.close().await;
        finish(result, closed)
    }

    async fn run<S: UploadSource>(
        &mut self,
        total: u64,
        source: &SharedSource<ObservedStream<S>>,
    ) -> Result<Uploaded, UploadError> {
        if !self.supports(EXTENSION_CREATION) {
            return Err(UploadError::UnsupportedOperation(EXTENSION_CREATION.into()));
        }

        let mut session = UploadSession::new(total);
        self.transport.clear_location();

        let headers = self.creation_headers(total);
        let location = with_cancel(
            &self.cancel,
            self.transport.create_resource(headers, self.config.retries),
        )
        .await?;
        session.set_location(location.clone());

        let state = with_cancel(
            &self.cancel,
            self.transport.query_offset(self.protocol_headers()),
        )
        .await?;
        if state.length != total {
            return Err(TransportError::MalformedResponse(format!(
                "server reports upload length {}, expected {total}",
                state.length
            ))
            .into());
        }
        session.advance(state.offset)?;
        debug!(location = %location, offset = state.offset, total, "upload state reconciled");

        if !session.is_complete() {
            let offset = session.current_offset();
            if offset > 0 {
                // Bytes the server already holds.
                source.discard(offset).await?;
            }

            let remaining = session.remaining();
            let headers = self.patch_headers(offset, remaining);
            let resulting = with_cancel(
                &self.cancel,
                self.transport.send_chunk(headers, self.config.retries, || source.body(remaining)),
            )
            .await
            .map_err(|e| match e {
                UploadError::Transport(t) => UploadError::BrokenUpload(BrokenCause::Patch(t)),
                other => other,
            })?;
            debug!(offset, resulting, "chunk acknowledged");
            session.advance(resulting)?;
            if let Some(cb) = &self.progress {
                cb(resulting, total);
            }
        }

        session.ensure_complete()?;
        let length = session.total_length();
        info!(location = %location, length, "upload complete");
        Ok(Uploaded { location, length })
    }

    fn protocol_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TUS_RESUMABLE, self.version.clone());
        headers
    }

    fn creation_headers(&self, total: u64) -> HeaderMap {
        let mut headers = self.protocol_headers();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(0u64));
        headers.insert(UPLOAD_LENGTH, HeaderValue::from(total));
        headers.insert(UPLOAD_METADATA, self.metadata.clone());
        headers
    }

    fn patch_headers(&self, offset: u64, remaining: u64) -> HeaderMap {
        let mut headers = self.protocol_headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(OFFSET_OCTET_STREAM));
        headers.insert(UPLOAD_OFFSET, HeaderValue::from(offset));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(remaining));
        headers
    }
}

fn encode_metadata(metadata: &Metadata) -> Result<HeaderValue, UploadError> {
    HeaderValue::from_str(&metadata.encode())
        .map_err(|_| UploadError::Validation("metadata is not a valid header value".into()))
}

/// Runs `fut` unless `cancel` fires first.
async fn with_cancel<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, UploadError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<UploadError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        result = fut => result.map_err(Into::into),
    }
}

/// Combines the upload result with the outcome of closing the source.
///
/// A producer failure explains a broken upload better than the transport
/// error it caused, so it replaces the cause.
fn finish(
    result: Result<Uploaded, UploadError>,
    closed: std::io::Result<()>,
) -> Result<Uploaded, UploadError> {
    match (result, closed) {
        (result, Ok(())) => result,
        (Ok(done), Err(e)) => {
            warn!(error = %e, "upload complete but closing the source failed");
            Ok(done)
        }
        (Err(UploadError::BrokenUpload(_)), Err(e)) => {
            Err(UploadError::BrokenUpload(BrokenCause::Producer(e)))
        }
        (Err(err), Err(e)) => {
            warn!(error = %e, "closing the source failed");
            Err(err)
        }
    }
}
