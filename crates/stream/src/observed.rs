//! Progress-observing wrapper and the shared handle used to build
//! request bodies.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::Mutex;

use crate::source::UploadSource;

/// Callback invoked with `(bytes_read_so_far, total_length)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Wraps an [`UploadSource`] and reports progress before every read.
///
/// The callback sees the byte count *before* the read it precedes. A read
/// that returns `Pending` and is polled again counts as the same read, so
/// the callback fires once per read that eventually completes.
pub struct ObservedStream<S> {
    inner: S,
    total: u64,
    position: u64,
    progress: Option<ProgressCallback>,
    in_flight: bool,
}

impl<S: UploadSource> ObservedStream<S> {
    pub fn new(inner: S, total: u64, progress: Option<ProgressCallback>) -> Self {
        Self {
            inner,
            total,
            position: 0,
            progress,
            in_flight: false,
        }
    }

    /// Bytes read from the wrapped source so far.
    pub fn position(&self) -> u64 {
        self.position
    }

}

impl<S: UploadSource> AsyncRead for ObservedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.in_flight {
            if let Some(cb) = &this.progress {
                cb(this.position, this.total);
            }
            this.in_flight = true;
        }

        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(result) = &poll {
            this.in_flight = false;
            if result.is_ok() {
                this.position += (buf.filled().len() - before) as u64;
            }
        }
        poll
    }
}

impl<S: UploadSource> UploadSource for ObservedStream<S> {
    async fn close(&mut self) -> io::Result<()> {
        self.inner.close().await
    }
}

/// A source shared between request attempts.
///
/// Each call to [`body`](Self::body) produces a fresh request body that
/// continues reading from wherever the source currently is.
pub struct SharedSource<S> {
    inner: Arc<Mutex<S>>,
    read_size: usize,
}

impl<S: UploadSource> SharedSource<S> {
    /// `read_size` bounds each individual read; 0 is treated as 1.
    pub fn new(source: S, read_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
            read_size: read_size.max(1),
        }
    }

    /// Builds a streaming request body yielding at most `limit` more bytes.
    ///
    /// The body ends early if the source does, and never reads past
    /// `limit` even if the source holds more.
    pub fn body(&self, limit: u64) -> reqwest::Body {
        let read_size = self.read_size;
        let stream = futures_util::stream::try_unfold(
            (Arc::clone(&self.inner), limit),
            move |(inner, remaining)| read_next(inner, remaining, read_size),
        );
        reqwest::Body::wrap_stream(stream)
    }

    /// Reads and drops the next `count` bytes.
    ///
    /// Fails with `UnexpectedEof` if the source ends first.
    pub async fn discard(&self, count: u64) -> io::Result<()> {
        let mut guard = self.inner.lock().await;
        let mut limited = (&mut *guard).take(count);
        let skipped = tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;
        if skipped < count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended after {skipped} of {count} bytes"),
            ));
        }
        Ok(())
    }

    pub async fn close(&self) -> io::Result<()> {
        self.inner.lock().await.close().await
    }
}

type BodyState<S> = (Arc<Mutex<S>>, u64);

/// Reads up to `read_size` bytes, capped by `remaining`; `None` at end of
/// stream or once `remaining` reaches zero.
async fn read_next<S: UploadSource>(
    inner: Arc<Mutex<S>>,
    remaining: u64,
    read_size: usize,
) -> io::Result<Option<(Vec<u8>, BodyState<S>)>> {
    if remaining == 0 {
        return Ok(None);
    }
    let want = usize::try_from(remaining).map_or(read_size, |r| r.min(read_size));
    let mut buf = vec![0u8; want];
    let n = inner.lock().await.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((buf, (inner, remaining - n as u64))))
}

impl<S: UploadSource> SharedSource<ObservedStream<S>> {
    /// Bytes consumed from the underlying source so far.
    pub async fn position(&self) -> u64 {
        self.inner.lock().await.position()
    }
}
