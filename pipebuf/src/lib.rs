//! Buffered, non-blocking pipe I/O
//!
//! Data moving between this process and external filter processes
//! (compressors, encryptors) goes through OS pipes. This crate keeps the
//! number of system calls on those pipes low:
//!
//! - reads and writes are issued in chunks as large as the kernel pipe buffer
//! - on Linux the pipe buffer is grown to `/proc/sys/fs/pipe-max-size`
//! - bytes are queued as separate chunks and only copied together when a
//!   caller asks for an exact amount
//!
//! Descriptors are non-blocking and registered with the tokio reactor, so
//! many streams can run on a single-threaded runtime.
//!
//! ```text
//! ┌───────────────────────────┐   ┌───────────────────────────┐
//! │  BufferedWriter           │   │  BufferedReader           │
//! │  - write / flush          │   │  - read(Some(n))          │
//! │  - partial_flush          │   │  - read(None)             │
//! └───────────────────────────┘   └───────────────────────────┘
//!          │ ByteDeque                     ▲ ByteDeque
//!          ▼                               │
//!   write(2) ── pipe ── filter process ── read(2)
//! ```

pub mod capacity;
pub mod deque;
pub mod error;
pub mod files;
mod nonblock;
pub mod pipe;
pub mod reader;
pub mod tune;
pub mod writer;

pub use capacity::{PipeCapacity, DEFAULT_PIPE_BUF_BYTES};
pub use deque::ByteDeque;
pub use error::PipeBufError;
pub use files::DeleteOnError;
pub use pipe::buffered_pipe;
pub use reader::BufferedReader;
pub use writer::BufferedWriter;
