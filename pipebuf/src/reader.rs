//! Buffered reader over a non-blocking pipe descriptor

use std::fmt;
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use bytes::{Bytes, BytesMut};
use tokio::io::unix::AsyncFd;

use crate::capacity::PipeCapacity;
use crate::deque::ByteDeque;
use crate::error::PipeBufError;
use crate::nonblock;

/// Reader side of a pipe
///
/// Kernel reads are issued in chunks of the size chosen when the descriptor
/// was tuned, see `read_size()`. The kernel fills a `BytesMut` directly and
/// the filled part is queued as is. Bytes read beyond what the caller asked
/// for stay queued for the next `read`.
///
/// # Concurrency
///
/// - Takes ownership of the descriptor; nothing else may read from it.
/// - `read()` takes `&mut self`, so one reader can't have two reads in flight.
/// - Separate readers share nothing and can run side by side on the same
///   single-threaded runtime.
pub struct BufferedReader {
    fd: Option<AsyncFd<File>>,
    deque: ByteDeque,
    buf: BytesMut,
    read_size: usize,
    got_eof: bool,
}

impl BufferedReader {
    /// Wrap a readable pipe descriptor
    ///
    /// Must be called inside a tokio runtime with I/O enabled.
    ///
    /// # Errors
    /// Returns an error if the descriptor can't be made non-blocking or
    /// registered with the reactor. The descriptor is closed in that case.
    pub fn new(fd: OwnedFd, capacity: &PipeCapacity) -> Result<Self, PipeBufError> {
        let (fd, read_size) = nonblock::register(fd, capacity)?;
        Ok(Self {
            fd: Some(fd),
            deque: ByteDeque::new(),
            buf: BytesMut::new(),
            read_size,
            got_eof: false,
        })
    }

    /// Read from the pipe
    ///
    /// - `None`: read until end of stream and return everything
    /// - `Some(0)`: return empty bytes without touching the descriptor
    /// - `Some(n)`: return exactly `n` bytes, or fewer if the stream ended
    ///   first. After the end of stream every read returns empty bytes.
    ///
    /// # Errors
    /// - `PipeBufError::Closed` if the reader was closed
    /// - `PipeBufError::Io` for any descriptor fault
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes, PipeBufError> {
        if self.fd.is_none() {
            return Err(PipeBufError::Closed);
        }

        match size {
            None => {
                while !self.got_eof {
                    self.read_chunk().await?;
                }
                Ok(self.deque.extract_all())
            }
            Some(0) => Ok(Bytes::new()),
            Some(size) => loop {
                if self.deque.len() >= size {
                    return Ok(self.deque.extract(size));
                }
                if self.got_eof {
                    // Short read: the stream ended before `size` bytes arrived
                    return Ok(self.deque.extract_all());
                }
                self.read_chunk().await?;
            },
        }
    }

    /// Read until end of stream
    ///
    /// # Errors
    /// Same as `read`.
    pub async fn read_to_end(&mut self) -> Result<Bytes, PipeBufError> {
        self.read(None).await
    }

    /// One kernel read into the queue. A zero-length read marks end of stream.
    async fn read_chunk(&mut self) -> Result<(), PipeBufError> {
        let fd = self.fd.as_ref().ok_or(PipeBufError::Closed)?;
        let n = nonblock::read_into(fd, &mut self.buf, self.read_size).await?;
        if n == 0 {
            tracing::trace!(fd = fd.as_raw_fd(), "end of stream");
            self.got_eof = true;
        } else {
            self.deque.push(self.buf.split().freeze());
        }
        Ok(())
    }

    /// Whether the writer side has been observed to close
    #[must_use]
    pub fn got_eof(&self) -> bool {
        self.got_eof
    }

    /// Largest single kernel read
    #[must_use]
    pub fn read_size(&self) -> usize {
        self.read_size
    }

    /// Bytes read from the kernel but not yet returned
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.deque.len()
    }

    /// The wrapped descriptor, `None` once closed
    #[must_use]
    pub fn fileno(&self) -> Option<RawFd> {
        self.fd.as_ref().map(AsRawFd::as_raw_fd)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.fd.is_none()
    }

    /// Close the descriptor and drop buffered bytes
    ///
    /// Closing twice only logs a warning.
    ///
    /// # Errors
    /// Returns the `close(2)` error, if any.
    pub fn close(&mut self) -> Result<(), PipeBufError> {
        let Some(fd) = self.fd.take() else {
            log::warn!("BufferedReader::close() called on already closed reader: {self:?}");
            return Ok(());
        };
        self.deque.clear();
        self.buf = BytesMut::new();
        nonblock::close(fd)
    }
}

impl fmt::Debug for BufferedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferedReader(fd={:?}, buffered={}, read_size={}, eof={})",
            self.fileno(),
            self.deque.len(),
            self.read_size,
            self.got_eof
        )
    }
}
