//! Kernel I/O on a non-blocking descriptor registered with the tokio reactor
//!
//! Each call first tries the system call. Only if the kernel reports that
//! it would block does the task wait for readiness, then it tries again.
//! Any other error is returned to the caller unchanged.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use bytes::BytesMut;
use tokio::io::unix::AsyncFd;

use crate::capacity::PipeCapacity;
use crate::error::PipeBufError;
use crate::tune::tune;

/// Tune `fd` and register it with the reactor.
///
/// Returns the registered descriptor and the chunk size to use on it.
/// On failure the descriptor is closed before returning.
pub(crate) fn register(
    fd: OwnedFd,
    capacity: &PipeCapacity,
) -> Result<(AsyncFd<File>, usize), PipeBufError> {
    let chunk = tune(fd.as_raw_fd(), capacity)?;
    Ok((AsyncFd::new(File::from(fd))?, chunk))
}

/// One `read(2)` of up to `max` bytes appended to `buf`
///
/// The kernel writes straight into the spare capacity of `buf`, so the
/// bytes can be split off and frozen without another copy.
pub(crate) async fn read_into(
    fd: &AsyncFd<File>,
    buf: &mut BytesMut,
    max: usize,
) -> io::Result<usize> {
    buf.reserve(max);
    loop {
        match read_spare(fd.as_raw_fd(), buf, max) {
            Ok(n) => {
                tracing::trace!(fd = fd.as_raw_fd(), n, "read");
                return Ok(n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::trace!(fd = fd.as_raw_fd(), "read would block");
                let mut guard = fd.readable().await?;
                guard.clear_ready();
            }
            Err(e) => return Err(e),
        }
    }
}

fn read_spare(fd: RawFd, buf: &mut BytesMut, max: usize) -> io::Result<usize> {
    let spare = buf.spare_capacity_mut();
    let len = spare.len().min(max);
    // SAFETY: the kernel writes at most `len` bytes into the spare capacity,
    // which is valid for writes of that length.
    let ret = unsafe { nix::libc::read(fd, spare.as_mut_ptr().cast(), len) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    #[allow(clippy::cast_sign_loss)]
    let n = ret as usize;
    // SAFETY: the first `n` spare bytes were just initialized by `read(2)`.
    unsafe { buf.set_len(buf.len() + n) };
    Ok(n)
}

/// One `write(2)`, waiting for writability only when the pipe is full
///
/// The kernel may accept fewer bytes than offered.
pub(crate) async fn write_some(fd: &AsyncFd<File>, buf: &[u8]) -> io::Result<usize> {
    loop {
        match fd.get_ref().write(buf) {
            Ok(0) if !buf.is_empty() => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "pipe accepted zero bytes",
                ));
            }
            Ok(n) => {
                tracing::trace!(fd = fd.as_raw_fd(), n, offered = buf.len(), "write");
                return Ok(n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::trace!(fd = fd.as_raw_fd(), "write would block");
                let mut guard = fd.writable().await?;
                guard.clear_ready();
            }
            Err(e) => return Err(e),
        }
    }
}

/// Deregister and close, reporting the `close(2)` result
pub(crate) fn close(fd: AsyncFd<File>) -> Result<(), PipeBufError> {
    let raw = fd.into_inner().into_raw_fd();
    nix::unistd::close(raw)?;
    Ok(())
}
