//! Byte chunk queue with delayed defragmentation
//!
//! Chunks are stored as `Bytes` views and never merged on insertion.
//! Copying happens only in `extract`, and only when the requested range
//! spans more than one chunk. On reads this lets the un-requested tail of
//! a kernel read stay at the front of the queue; on writes it lets many
//! small submissions be coalesced into one large kernel write.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// Ordered queue of byte chunks with a running length
#[derive(Debug, Default)]
pub struct ByteDeque {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl ByteDeque {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk at the tail. Empty chunks are dropped.
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Remove exactly `n` bytes from the head.
    ///
    /// If the head chunk alone holds `n` bytes, the result is a view into it
    /// and nothing is copied. Otherwise the bytes are gathered into a new
    /// buffer. If `n` ends inside a chunk, the rest of that chunk stays at
    /// the head.
    ///
    /// # Panics
    /// Panics if `n` is larger than `len()`. Callers check the length first.
    pub fn extract(&mut self, n: usize) -> Bytes {
        assert!(
            n <= self.len,
            "ByteDeque::extract({n}) with only {} bytes buffered",
            self.len
        );
        if n == 0 {
            return Bytes::new();
        }

        let out = match self.chunks.pop_front() {
            Some(mut head) if head.len() >= n => {
                let out = head.split_to(n);
                if !head.is_empty() {
                    self.chunks.push_front(head);
                }
                out
            }
            Some(head) => {
                self.chunks.push_front(head);
                self.gather(n)
            }
            None => unreachable!("ByteDeque is empty but reports {} bytes", self.len),
        };

        self.len -= n;
        debug_assert_eq!(out.len(), n);
        out
    }

    /// Remove everything
    pub fn extract_all(&mut self) -> Bytes {
        self.extract(self.len)
    }

    /// Copy `n` bytes spread over several chunks into one buffer
    fn gather(&mut self, n: usize) -> Bytes {
        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            let remaining = n - out.len();
            let Some(mut part) = self.chunks.pop_front() else {
                unreachable!("ByteDeque length out of sync with its chunks");
            };
            if part.len() <= remaining {
                out.extend_from_slice(&part);
            } else {
                out.extend_from_slice(&part.split_to(remaining));
                self.chunks.push_front(part);
            }
        }
        out.freeze()
    }

    /// Total number of buffered bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of separate chunks currently held
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}
