//! Filter Demo
//!
//! Pushes stdin through an external filter process and prints its output:
//!
//! ```text
//! echo hello | RUST_LOG=debug filter_demo gzip -c | gunzip
//! ```
//!
//! The filter command defaults to `cat`. Writing to the filter and reading
//! from it run as two tasks on one single-threaded runtime.

use std::io::{self, Read, Write};
use std::os::fd::OwnedFd;
use std::process::{Command, Stdio};

use pipebuf::{BufferedReader, BufferedWriter, PipeBufError, PipeCapacity};

/// Size of the slices stdin is fed to the writer in
const FEED_BYTES: usize = 4096;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let program = args.next().unwrap_or_else(|| "cat".to_string());
    let program_args: Vec<String> = args.collect();

    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input)?;

    let capacity = PipeCapacity::process();
    log::info!(
        "filter {program} {program_args:?}, chunk size {} bytes, kernel resize {:?}",
        capacity.buf_bytes(),
        capacity.os_pipe_size()
    );

    let mut child = Command::new(&program)
        .args(&program_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        return Err("filter stdio was not captured".into());
    };
    let mut writer = BufferedWriter::new(OwnedFd::from(stdin), capacity)?;
    let mut reader = BufferedReader::new(OwnedFd::from(stdout), capacity)?;

    let feed = async move {
        for piece in input.chunks(FEED_BYTES) {
            writer.write(piece).await?;
        }
        writer.flush().await?;
        writer.close()?;
        Ok::<usize, PipeBufError>(input.len())
    };

    let drain = async move {
        let output = reader.read_to_end().await?;
        reader.close()?;
        Ok::<_, PipeBufError>(output)
    };

    let (sent, output) = tokio::join!(feed, drain);
    let sent = sent?;
    let output = output?;

    let status = tokio::task::spawn_blocking(move || child.wait()).await??;
    log::info!(
        "sent {sent} bytes, received {} bytes, filter {status}",
        output.len()
    );

    io::stdout().write_all(&output)?;
    if !status.success() {
        return Err(format!("filter exited with {status}").into());
    }
    Ok(())
}
