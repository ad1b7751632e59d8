use std::os::fd::AsRawFd;
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg};
use pipebuf::{buffered_pipe, BufferedWriter, PipeBufError, PipeCapacity};

#[tokio::test]
async fn test_small_writes_are_buffered() {
    let (_reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(1024)).unwrap();

    writer.write(b"hello").await.unwrap();
    writer.write(b"").await.unwrap();
    writer.write(b" world").await.unwrap();

    assert_eq!(writer.buffered(), 11);
    assert_eq!(writer.threshold(), 1024);
}

#[tokio::test]
async fn test_crossing_threshold_flushes() {
    let threshold = 1024;
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(threshold)).unwrap();
    let data = vec![7u8; threshold + 1];

    writer.write(&data).await.unwrap();
    assert!(writer.buffered() <= threshold);

    // No flush: the bytes must already be in the kernel
    let got = reader.read(Some(threshold + 1 - writer.buffered())).await.unwrap();
    assert!(!got.is_empty());
    assert!(got.iter().all(|&b| b == 7));
}

#[tokio::test]
async fn test_buffered_count_is_monotonic() {
    let threshold = 100;
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(threshold)).unwrap();
    let mut written_to_kernel = 0;

    for len in [60usize, 30, 20, 5, 150, 1] {
        let before = writer.buffered();
        writer.write(&vec![b'x'; len]).await.unwrap();
        let after = writer.buffered();

        let flushed = before + len - after;
        assert!(after <= threshold);
        if before + len <= threshold {
            assert_eq!(flushed, 0);
        }
        written_to_kernel += flushed;
    }

    writer.flush().await.unwrap();
    assert_eq!(writer.buffered(), 0);
    writer.close().unwrap();

    let got = reader.read(None).await.unwrap();
    assert_eq!(got.len(), 60 + 30 + 20 + 5 + 150 + 1);
    assert!(written_to_kernel <= got.len());
}

#[tokio::test]
async fn test_partial_flush_retains_at_most_limit() {
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(1 << 20)).unwrap();

    writer.write(b"0123456789").await.unwrap();
    writer.partial_flush(4).await.unwrap();
    assert!(writer.buffered() <= 4);

    writer.flush().await.unwrap();
    writer.close().unwrap();
    assert_eq!(&reader.read(None).await.unwrap()[..], b"0123456789");
}

#[tokio::test]
async fn test_flush_preserves_order() {
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(8)).unwrap();

    for piece in [&b"ab"[..], b"cdefghij", b"", b"k", b"lmnopqrstuvwxyz"] {
        writer.write(piece).await.unwrap();
    }
    writer.flush().await.unwrap();
    writer.close().unwrap();

    assert_eq!(
        &reader.read(None).await.unwrap()[..],
        b"abcdefghijklmnopqrstuvwxyz"
    );
}

#[tokio::test]
async fn test_write_larger_than_pipe_suspends_until_drained() {
    // Kernel buffer stays at its default, far below the payload
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(64 * 1024)).unwrap();
    let data: Vec<u8> = (0..4 * 1024 * 1024).map(|i: u32| (i % 251) as u8).collect();
    let expected = data.clone();

    let produce = async move {
        for piece in data.chunks(4096) {
            writer.write(piece).await.unwrap();
        }
        writer.flush().await.unwrap();
        assert_eq!(writer.buffered(), 0);
        writer.close().unwrap();
    };

    let (got, ()) = tokio::join!(reader.read(None), produce);
    assert_eq!(got.unwrap(), expected);
}

#[tokio::test]
async fn test_close_does_not_flush() {
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::fixed(1024)).unwrap();

    writer.write(b"lost").await.unwrap();
    assert_eq!(writer.buffered(), 4);
    writer.close().unwrap();
    assert_eq!(writer.buffered(), 0);

    assert!(reader.read(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_twice_is_noop() {
    let (_rx, tx) = nix::unistd::pipe().unwrap();
    let raw = tx.as_raw_fd();

    let mut writer = BufferedWriter::new(tx, &PipeCapacity::default()).unwrap();
    assert_eq!(writer.fileno(), Some(raw));

    writer.close().unwrap();
    // The freed descriptor number is likely reused here
    let (other_rx, other_tx) = nix::unistd::pipe().unwrap();

    writer.close().unwrap();
    assert!(writer.is_closed());
    assert_eq!(writer.fileno(), None);

    // A second close(2) would have hit the new pipe
    assert!(fcntl(other_rx.as_raw_fd(), FcntlArg::F_GETFD).is_ok());
    assert!(fcntl(other_tx.as_raw_fd(), FcntlArg::F_GETFD).is_ok());
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let (_reader, mut writer) = buffered_pipe(&PipeCapacity::default()).unwrap();
    writer.close().unwrap();

    assert!(matches!(writer.write(b"x").await, Err(PipeBufError::Closed)));
    assert!(matches!(writer.flush().await, Err(PipeBufError::Closed)));
    assert!(matches!(
        writer.partial_flush(0).await,
        Err(PipeBufError::Closed)
    ));
}

#[tokio::test]
async fn test_broken_pipe_propagates_and_keeps_bytes() {
    let (mut reader, mut writer) = buffered_pipe(&PipeCapacity::default()).unwrap();
    reader.close().unwrap();

    writer.write(b"nobody listens").await.unwrap();
    let err = writer.flush().await.unwrap_err();

    assert_eq!(err.raw_os_error(), Some(nix::libc::EPIPE));
    assert_eq!(writer.buffered(), 14);
    writer.close().unwrap();
}

#[tokio::test]
async fn test_write_fault_propagates() {
    let (rx, _tx) = nix::unistd::pipe().unwrap();
    let mut writer = BufferedWriter::new(rx, &PipeCapacity::default()).unwrap();

    writer.write(b"wrong end").await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), writer.flush())
        .await
        .expect("write on a bad descriptor must not wait")
        .unwrap_err();

    assert_eq!(err.raw_os_error(), Some(nix::libc::EBADF));
    assert_eq!(writer.buffered(), 9);
    writer.close().unwrap();
}
