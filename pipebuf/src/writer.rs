//! Buffered writer over a non-blocking pipe descriptor
//!
//! Small writes are queued. Once more than the threshold (the size chosen
//! when the descriptor was tuned) is waiting, the queue is coalesced and pushed to the kernel until no more
//! than that many remain. Only `flush()` drains the queue completely.

use std::fmt;
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use bytes::{Buf, Bytes};
use tokio::io::unix::AsyncFd;

use crate::capacity::PipeCapacity;
use crate::deque::ByteDeque;
use crate::error::PipeBufError;
use crate::nonblock;

/// Writer side of a pipe
///
/// # Concurrency
///
/// - Takes ownership of the descriptor; nothing else may write to it.
/// - All operations take `&mut self`: no second operation while one is
///   suspended.
/// - The futures returned by `write`, `partial_flush` and `flush` are not
///   cancel safe. Dropping one mid-flight can lose the bytes being flushed.
pub struct BufferedWriter {
    fd: Option<AsyncFd<File>>,
    deque: ByteDeque,
    threshold: usize,
}

impl BufferedWriter {
    /// Wrap a writable pipe descriptor
    ///
    /// Must be called inside a tokio runtime with I/O enabled.
    ///
    /// # Errors
    /// Returns an error if the descriptor can't be made non-blocking or
    /// registered with the reactor. The descriptor is closed in that case.
    pub fn new(fd: OwnedFd, capacity: &PipeCapacity) -> Result<Self, PipeBufError> {
        let (fd, threshold) = nonblock::register(fd, capacity)?;
        Ok(Self {
            fd: Some(fd),
            deque: ByteDeque::new(),
            threshold,
        })
    }

    /// Queue a copy of `data`, flushing down to the threshold if it is exceeded
    ///
    /// # Errors
    /// - `PipeBufError::Closed` if the writer was closed
    /// - `PipeBufError::Io` for any descriptor fault during the flush
    pub async fn write(&mut self, data: &[u8]) -> Result<(), PipeBufError> {
        self.write_bytes(Bytes::copy_from_slice(data)).await
    }

    /// Like `write`, but queues `data` without copying it
    ///
    /// # Errors
    /// Same as `write`.
    pub async fn write_bytes(&mut self, data: Bytes) -> Result<(), PipeBufError> {
        if self.fd.is_none() {
            return Err(PipeBufError::Closed);
        }

        self.deque.push(data);
        while self.deque.len() > self.threshold {
            self.partial_flush(self.threshold).await?;
        }
        Ok(())
    }

    /// Push queued bytes to the kernel until at most `max_retain` remain
    ///
    /// All queued bytes are coalesced into one buffer first, so each kernel
    /// write is as large as possible. On error the unwritten bytes stay queued.
    ///
    /// # Errors
    /// - `PipeBufError::Closed` if the writer was closed
    /// - `PipeBufError::Io` for any descriptor fault
    pub async fn partial_flush(&mut self, max_retain: usize) -> Result<(), PipeBufError> {
        let fd = self.fd.as_ref().ok_or(PipeBufError::Closed)?;

        let mut pending = self.deque.extract_all();
        while pending.len() > max_retain {
            match nonblock::write_some(fd, &pending).await {
                Ok(n) => pending.advance(n),
                Err(e) => {
                    self.deque.push(pending);
                    return Err(e.into());
                }
            }
        }

        debug_assert!(self.deque.is_empty());
        self.deque.push(pending);
        Ok(())
    }

    /// Push every queued byte to the kernel
    ///
    /// # Errors
    /// Same as `partial_flush`.
    pub async fn flush(&mut self) -> Result<(), PipeBufError> {
        if self.fd.is_none() {
            return Err(PipeBufError::Closed);
        }
        while !self.deque.is_empty() {
            self.partial_flush(0).await?;
        }
        Ok(())
    }

    /// Bytes accepted by `write` but not yet given to the kernel
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.deque.len()
    }

    /// Buffered byte count above which `write` flushes
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
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

    /// Close the descriptor. Queued bytes are discarded, call `flush()` first.
    ///
    /// Closing twice only logs a warning.
    ///
    /// # Errors
    /// Returns the `close(2)` error, if any.
    pub fn close(&mut self) -> Result<(), PipeBufError> {
        let Some(fd) = self.fd.take() else {
            log::warn!("BufferedWriter::close() called on already closed writer: {self:?}");
            return Ok(());
        };
        if !self.deque.is_empty() {
            log::warn!(
                "BufferedWriter::close() discards {} unflushed bytes",
                self.deque.len()
            );
            self.deque.clear();
        }
        nonblock::close(fd)
    }
}

impl fmt::Debug for BufferedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferedWriter(fd={:?}, buffered={}, threshold={})",
            self.fileno(),
            self.deque.len(),
            self.threshold
        )
    }
}

impl Drop for BufferedWriter {
    fn drop(&mut self) {
        if !self.deque.is_empty() {
            log::warn!("{self:?} dropped with unflushed bytes");
        }
    }
}
