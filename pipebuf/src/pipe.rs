//! OS pipe with both ends wrapped

use crate::capacity::PipeCapacity;
use crate::error::PipeBufError;
use crate::reader::BufferedReader;
use crate::writer::BufferedWriter;

/// Create a pipe and wrap its ends
///
/// Returns `(reader, writer)`, in the same order as `pipe(2)`.
///
/// # Errors
/// Returns an error if the pipe can't be created or either end can't be
/// tuned and registered. Both descriptors are closed in that case.
pub fn buffered_pipe(
    capacity: &PipeCapacity,
) -> Result<(BufferedReader, BufferedWriter), PipeBufError> {
    let (rx, tx) = nix::unistd::pipe()?;
    let reader = BufferedReader::new(rx, capacity)?;
    let writer = BufferedWriter::new(tx, capacity)?;
    Ok((reader, writer))
}
