//! Pipe capacity discovery
//!
//! Reads and writes are sized to the kernel pipe buffer. On Linux the
//! maximum size a pipe buffer can be grown to is published in
//! `/proc/sys/fs/pipe-max-size`; when that is readable, every wrapped
//! descriptor is resized to it and the same number becomes the I/O chunk
//! size. Elsewhere the conservative 64 KiB default is used and descriptors
//! are left alone.

use std::path::Path;
use std::sync::OnceLock;

/// Chunk size used when the kernel does not publish a maximum pipe size
pub const DEFAULT_PIPE_BUF_BYTES: usize = 64 * 1024;

/// Largest chunk size; `F_SETPIPE_SZ` takes an `int`, so no pipe gets bigger
pub const MAX_PIPE_BUF_BYTES: usize = i32::MAX as usize;

/// Where Linux exposes the largest allowed `F_SETPIPE_SZ` value
pub const PIPE_MAX_SIZE_PATH: &str = "/proc/sys/fs/pipe-max-size";

/// Capacity parameters shared by all readers and writers
///
/// - `os_pipe_size`: size to request for each kernel pipe buffer, `None`
///   to leave the kernel default in place
/// - `buf_bytes`: size of each kernel read, and the buffered byte count
///   above which a writer starts pushing data to the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeCapacity {
    os_pipe_size: Option<usize>,
    buf_bytes: usize,
}

impl PipeCapacity {
    /// Ask the running kernel, falling back to the default on any failure
    #[must_use]
    pub fn discover() -> Self {
        Self::discover_from(Path::new(PIPE_MAX_SIZE_PATH))
    }

    /// Read a `pipe-max-size` style file at an explicit path
    #[must_use]
    pub fn discover_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match text.trim().parse::<usize>() {
                Ok(size) if size > 0 => {
                    log::debug!("pipe capacity from {}: {size} bytes", path.display());
                    Self::with_os_pipe_size(size)
                }
                Ok(_) => {
                    log::debug!("{} reports zero, using default", path.display());
                    Self::default()
                }
                Err(e) => {
                    log::debug!("can't parse {}: {e}, using default", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::debug!("can't read {}: {e}, using default", path.display());
                Self::default()
            }
        }
    }

    /// Fixed chunk size, kernel buffers are not resized
    ///
    /// The size is clamped to `1..=MAX_PIPE_BUF_BYTES`.
    #[must_use]
    pub fn fixed(buf_bytes: usize) -> Self {
        Self {
            os_pipe_size: None,
            buf_bytes: buf_bytes.clamp(1, MAX_PIPE_BUF_BYTES),
        }
    }

    /// Resize kernel buffers to `size` and use it as the chunk size
    ///
    /// Each wrapped descriptor uses the size the kernel actually grants,
    /// see `tune::tune`.
    #[must_use]
    pub fn with_os_pipe_size(size: usize) -> Self {
        Self {
            os_pipe_size: Some(size),
            buf_bytes: size.clamp(1, MAX_PIPE_BUF_BYTES),
        }
    }

    /// Process-wide capacity, discovered on first use
    pub fn process() -> &'static PipeCapacity {
        static PROCESS: OnceLock<PipeCapacity> = OnceLock::new();
        PROCESS.get_or_init(Self::discover)
    }

    #[must_use]
    pub fn os_pipe_size(&self) -> Option<usize> {
        self.os_pipe_size
    }

    #[must_use]
    pub fn buf_bytes(&self) -> usize {
        self.buf_bytes
    }
}

impl Default for PipeCapacity {
    fn default() -> Self {
        Self::fixed(DEFAULT_PIPE_BUF_BYTES)
    }
}
