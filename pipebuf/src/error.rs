//! Error type shared by the buffered reader and writer

use std::io;

/// Error type for buffered pipe operations
#[derive(Debug, thiserror::Error)]
pub enum PipeBufError {
    /// A descriptor fault reported by the kernel, passed through unchanged.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The reader or writer was already closed.
    #[error("Pipe endpoint is closed")]
    Closed,
}

impl PipeBufError {
    /// The underlying OS error code, if this is a descriptor fault
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io(e) => e.raw_os_error(),
            Self::Closed => None,
        }
    }
}

impl From<nix::Error> for PipeBufError {
    fn from(e: nix::Error) -> Self {
        Self::Io(io::Error::from(e))
    }
}

impl From<PipeBufError> for io::Error {
    fn from(e: PipeBufError) -> Self {
        match e {
            PipeBufError::Io(e) => e,
            PipeBufError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_passes_through() {
        let err = PipeBufError::from(io::Error::from_raw_os_error(32));
        assert_eq!(err.raw_os_error(), Some(32));

        let back: io::Error = err.into();
        assert_eq!(back.raw_os_error(), Some(32));
    }

    #[test]
    fn test_closed_maps_to_broken_pipe() {
        let err: io::Error = PipeBufError::Closed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_nix_errno_conversion() {
        let err = PipeBufError::from(nix::errno::Errno::EBADF);
        assert_eq!(err.raw_os_error(), Some(nix::libc::EBADF));
    }
}
