//! Descriptor set-up shared by the reader and writer

use std::os::fd::RawFd;

use nix::fcntl::{fcntl, FcntlArg, OFlag};

use crate::capacity::{PipeCapacity, DEFAULT_PIPE_BUF_BYTES};
use crate::error::PipeBufError;

/// Prepare a pipe descriptor for use by this crate.
///
/// Switching to non-blocking mode is required and its failure is returned.
/// Growing the kernel buffer is an optimization, so its failure is only logged.
///
/// Returns the chunk size to use on this descriptor. When a resize was
/// requested this is what the kernel actually granted; if the resize was
/// refused it is the buffer size the kernel kept, or the 64 KiB default
/// where that can't be queried.
///
/// # Errors
/// Returns an error if the descriptor flags can't be read or updated.
pub fn tune(fd: RawFd, capacity: &PipeCapacity) -> Result<usize, PipeBufError> {
    set_nonblocking(fd)?;
    let Some(size) = capacity.os_pipe_size() else {
        return Ok(capacity.buf_bytes());
    };
    let granted = set_pipe_size(fd, size)
        .or_else(|| pipe_size(fd))
        .unwrap_or(DEFAULT_PIPE_BUF_BYTES);
    Ok(granted.max(1))
}

/// Add `O_NONBLOCK`, keeping the other status flags
///
/// # Errors
/// Returns the `fcntl` error.
pub fn set_nonblocking(fd: RawFd) -> Result<(), PipeBufError> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    if !flags.contains(OFlag::O_NONBLOCK) {
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    }
    Ok(())
}

/// Ask the kernel to grow the pipe buffer. Returns the size it granted.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_pipe_size(fd: RawFd, size: usize) -> Option<usize> {
    let Ok(size) = i32::try_from(size) else {
        log::debug!("pipe size {size} out of range for fd {fd}");
        return None;
    };
    match fcntl(fd, FcntlArg::F_SETPIPE_SZ(size)) {
        Ok(granted) => usize::try_from(granted).ok(),
        Err(e) => {
            log::debug!("F_SETPIPE_SZ({size}) on fd {fd} failed: {e}");
            None
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn set_pipe_size(_fd: RawFd, _size: usize) -> Option<usize> {
    None
}

/// Current kernel buffer size of a pipe
#[cfg(any(target_os = "linux", target_os = "android"))]
#[must_use]
pub fn pipe_size(fd: RawFd) -> Option<usize> {
    fcntl(fd, FcntlArg::F_GETPIPE_SZ)
        .ok()
        .and_then(|size| usize::try_from(size).ok())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
#[must_use]
pub fn pipe_size(_fd: RawFd) -> Option<usize> {
    None
}
