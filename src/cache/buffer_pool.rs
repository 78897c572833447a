use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use crossbeam::queue::ArrayQueue;

use crate::constants::{BLOCK_SIZE, BUFFER_POOL_BLOCKS, BUFFER_POOL_PIECES};

/// Pool of reusable read buffers.
///
/// Buffers are allocated on demand and kept for reuse once handed back, up to
/// a fixed number of block-sized and piece-sized buffers. The pool counts how
/// many buffers are currently handed out so leaks show up in
/// [`BufferPool::outstanding`].
pub struct BufferPool {
    block_buffers: ArrayQueue<BytesMut>,
    piece_buffers: ArrayQueue<BytesMut>,
    outstanding: AtomicUsize,
}

impl BufferPool {
    pub fn new() -> Arc<Self> {
        Self::with_limits(BUFFER_POOL_BLOCKS, BUFFER_POOL_PIECES)
    }

    /// Creates a pool that keeps at most `block_buffers` idle block buffers
    /// and `piece_buffers` idle piece buffers.
    pub fn with_limits(block_buffers: usize, piece_buffers: usize) -> Arc<Self> {
        Arc::new(Self {
            block_buffers: ArrayQueue::new(block_buffers.max(1)),
            piece_buffers: ArrayQueue::new(piece_buffers.max(1)),
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Hands out a zero-filled buffer of exactly `len` bytes.
    pub fn get_buffer(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let piece = len > BLOCK_SIZE;
        let mut buf = if !piece {
            self.block_buffers
                .pop()
                .unwrap_or_else(|| BytesMut::with_capacity(BLOCK_SIZE))
        } else {
            match self.piece_buffers.pop() {
                Some(mut buf) => {
                    if buf.capacity() < len {
                        buf.reserve(len - buf.capacity());
                    }
                    buf
                }
                None => BytesMut::with_capacity(len),
            }
        };
        buf.resize(len, 0);
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        PooledBuffer {
            buf,
            piece,
            pool: Arc::clone(self),
        }
    }

    fn return_buffer(&self, mut buf: BytesMut, piece: bool) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        if buf.capacity() == 0 {
            return;
        }
        buf.clear();
        if piece {
            let _ = self.piece_buffers.push(buf);
        } else {
            let _ = self.block_buffers.push(buf);
        }
    }

    /// Number of buffers handed out and not yet returned or frozen.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn block_buffers_available(&self) -> usize {
        self.block_buffers.len()
    }

    pub fn piece_buffers_available(&self) -> usize {
        self.piece_buffers.len()
    }
}

/// A buffer borrowed from a [`BufferPool`].
///
/// Dropping it hands the allocation back to the pool. [`PooledBuffer::freeze`]
/// detaches the bytes instead.
pub struct PooledBuffer {
    buf: BytesMut,
    piece: bool,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Detaches the contents from the pool as immutable bytes.
    pub fn freeze(mut self) -> Bytes {
        std::mem::take(&mut self.buf).freeze()
    }

    /// Hands the buffer back to its pool.
    pub fn return_to_pool(self) {
        drop(self);
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.return_buffer(std::mem::take(&mut self.buf), self.piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_reused() {
        let pool = BufferPool::with_limits(4, 2);
        let buf = pool.get_buffer(100);
        assert_eq!(buf.len(), 100);
        assert_eq!(pool.outstanding(), 1);

        drop(buf);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.block_buffers_available(), 1);

        let _again = pool.get_buffer(BLOCK_SIZE);
        assert_eq!(pool.block_buffers_available(), 0);
    }

    #[test]
    fn test_large_buffer_goes_to_piece_queue() {
        let pool = BufferPool::with_limits(4, 2);
        let buf = pool.get_buffer(BLOCK_SIZE * 2);
        assert!(buf.iter().all(|b| *b == 0));
        buf.return_to_pool();
        assert_eq!(pool.piece_buffers_available(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_freeze_detaches() {
        let pool = BufferPool::with_limits(4, 2);
        let mut buf = pool.get_buffer(3);
        buf.copy_from_slice(&[1, 2, 3]);
        let bytes = buf.freeze();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.block_buffers_available(), 0);
    }
}
