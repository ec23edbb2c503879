//! Producer/consumer pipe between a download and an upload.
//!
//! The producer writes into one end of a bounded `tokio::io::duplex`; the
//! upload reads from the other. A full pipe blocks the producer, an empty
//! one blocks the reader, and closing the write end is the only
//! end-of-stream signal.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::source::UploadSource;

/// Background task pumping a byte stream into the write end of a pipe.
pub struct ProducerWorker {
    handle: JoinHandle<io::Result<u64>>,
    cancel: CancellationToken,
}

impl ProducerWorker {
    /// Spawns the producer task.
    ///
    /// The write end is shut down and dropped on every exit path,
    /// including errors and cancellation.
    pub fn spawn<St, T, E>(body: St, writer: DuplexStream, cancel: CancellationToken) -> Self
    where
        St: Stream<Item = Result<T, E>> + Send + 'static,
        T: AsRef<[u8]> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(pump(body, writer, token));
        Self { handle, cancel }
    }

    /// Returns `true` once the producer task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the producer and waits for it.
    ///
    /// Returns the number of bytes written into the pipe, or the error the
    /// producer failed with. Being cancelled is not a failure.
    pub async fn stop(self) -> io::Result<u64> {
        self.cancel.cancel();
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

async fn pump<St, T, E>(
    body: St,
    mut writer: DuplexStream,
    cancel: CancellationToken,
) -> io::Result<u64>
where
    St: Stream<Item = Result<T, E>> + Send,
    T: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut body = Box::pin(body);
    let mut written = 0u64;

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(written, "producer cancelled");
            Ok(())
        }
        r = copy_chunks(&mut body, &mut writer, &mut written) => r,
    };

    // The reader only sees end-of-stream once the write end is closed.
    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "pipe already closed by reader");
    }
    drop(writer);

    match result {
        Ok(()) => {
            debug!(written, "producer finished");
            Ok(written)
        }
        Err(e) => {
            warn!(written, error = %e, "producer failed");
            Err(e)
        }
    }
}

async fn copy_chunks<St, T, E>(
    body: &mut Pin<Box<St>>,
    writer: &mut DuplexStream,
    written: &mut u64,
) -> io::Result<()>
where
    St: Stream<Item = Result<T, E>>,
    T: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(io::Error::other)?;
        let bytes = chunk.as_ref();
        writer.write_all(bytes).await?;
        *written += bytes.len() as u64;
    }
    Ok(())
}

/// Read end of a producer/consumer pipe.
pub struct PipeSource {
    reader: DuplexStream,
    worker: Option<ProducerWorker>,
}

impl PipeSource {
    pub fn new(reader: DuplexStream, worker: ProducerWorker) -> Self {
        Self {
            reader,
            worker: Some(worker),
        }
    }

    /// A pipe whose write end is driven by the caller.
    pub fn from_reader(reader: DuplexStream) -> Self {
        Self {
            reader,
            worker: None,
        }
    }
}

impl AsyncRead for PipeSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl UploadSource for PipeSource {
    /// Stops the producer and surfaces its error, if it had one.
    async fn close(&mut self) -> io::Result<()> {
        match self.worker.take() {
            Some(worker) => worker.stop().await.map(|_| ()),
            None => Ok(()),
        }
    }
}
