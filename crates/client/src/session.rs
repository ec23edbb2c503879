use crate::error::{BrokenCause, UploadError};

/// State of one upload, from creation to the final offset check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    total_length: u64,
    location: Option<String>,
    current_offset: u64,
}

impl UploadSession {
    /// Creates a session for `total_length` bytes with no remote resource yet.
    pub fn new(total_length: u64) -> Self {
        Self {
            total_length,
            location: None,
            current_offset: 0,
        }
    }

    /// Records the resource created on the server.
    pub fn set_location(&mut self, location: String) {
        self.location = Some(location);
    }

    /// Accepts an offset reported by the server.
    ///
    /// Offsets never move backwards and never pass the total length.
    pub fn advance(&mut self, offset: u64) -> Result<(), UploadError> {
        if offset < self.current_offset || offset > self.total_length {
            return Err(UploadError::BrokenUpload(BrokenCause::OffsetMismatch {
                expected: self.total_length,
                actual: offset,
            }));
        }
        self.current_offset = offset;
        Ok(())
    }

    /// Fails unless the server holds every byte.
    pub fn ensure_complete(&self) -> Result<(), UploadError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(UploadError::BrokenUpload(BrokenCause::OffsetMismatch {
                expected: self.total_length,
                actual: self.current_offset,
            }))
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_offset == self.total_length
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Bytes the server has not acknowledged yet.
    pub fn remaining(&self) -> u64 {
        self.total_length - self.current_offset
    }
}
