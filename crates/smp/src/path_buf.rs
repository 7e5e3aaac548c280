//! Fixed-capacity buffer for assembling one path at a time from [`Sv`] fragments.

use std::path::Path;

use sv::Sv;
use thiserror::Error;

/// Default capacity, matching the usual `PATH_MAX`.
pub const PATH_CAPACITY: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathBufferError {
    #[error("path too long: needs {required} bytes, buffer holds {capacity}")]
    CapacityExceeded { capacity: usize, required: usize },
    #[cfg(not(unix))]
    #[error("path is not valid UTF-8")]
    InvalidEncoding,
}

/// Bytes are appended with [`push`](PathBuffer::push) and terminated with
/// [`finish`](PathBuffer::finish). Call [`rewind`](PathBuffer::rewind) before starting
/// the next path.
#[derive(Debug)]
pub struct PathBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl Default for PathBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathBuffer {
    pub fn new() -> Self {
        Self::with_capacity(PATH_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn push(&mut self, fragment: Sv<'_>) -> Result<(), PathBufferError> {
        self.reserve(fragment.len())?;
        self.bytes.extend_from_slice(fragment.as_bytes());
        Ok(())
    }

    pub fn push_str(&mut self, fragment: &str) -> Result<(), PathBufferError> {
        self.push(Sv::from_text(fragment))
    }

    /// Append the NUL terminator and return what was assembled, without it.
    ///
    /// The length is not reset: a later push lands after the terminator.
    pub fn finish(&mut self) -> Result<&Path, PathBufferError> {
        self.reserve(1)?;
        self.bytes.push(0);
        let end = self.bytes.len() - 1;
        bytes_to_path(&self.bytes[..end])
    }

    pub fn rewind(&mut self) {
        self.bytes.clear();
    }

    fn reserve(&self, extra: usize) -> Result<(), PathBufferError> {
        let required = self.bytes.len().saturating_add(extra);
        if required > self.capacity {
            return Err(PathBufferError::CapacityExceeded {
                capacity: self.capacity,
                required,
            });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> Result<&Path, PathBufferError> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    Ok(Path::new(OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> Result<&Path, PathBufferError> {
    std::str::from_utf8(bytes)
        .map(Path::new)
        .map_err(|_| PathBufferError::InvalidEncoding)
}
