use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// A sequential, non-seekable byte source that can be uploaded.
///
/// Only the operations the upload path needs are exposed: reading, via
/// [`AsyncRead`], and releasing the source with [`close`](Self::close).
pub trait UploadSource: AsyncRead + Send + Unpin + 'static {
    /// Releases the source. Reads after `close` fail.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// A local file opened for upload.
pub struct FileSource {
    file: Option<File>,
    len: u64,
}

impl FileSource {
    /// Opens a regular file and records its size.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let file = File::open(path).await?;
        Ok(Self {
            file: Some(file),
            len: metadata.len(),
        })
    }

    /// File size at open time.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsyncRead for FileSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            None => Poll::Ready(Err(closed())),
        }
    }
}

impl UploadSource for FileSource {
    async fn close(&mut self) -> io::Result<()> {
        self.file.take();
        Ok(())
    }
}

/// In-memory data, for callers that already hold the bytes.
impl UploadSource for io::Cursor<Vec<u8>> {
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "source is closed")
}
