//! Pooled buffers for disk reads.
//!
//! Reads hand their result back in a [`PooledBuffer`] taken from a shared
//! [`BufferPool`]. The buffer returns to the pool when dropped, so a failed
//! read never leaks its allocation.
//!
//! # Examples
//!
//! ```
//! use piecefile::cache::BufferPool;
//!
//! let pool = BufferPool::with_limits(8, 2);
//! let buf = pool.get_buffer(16384);
//! assert_eq!(pool.outstanding(), 1);
//! drop(buf);
//! assert_eq!(pool.outstanding(), 0);
//! ```

mod buffer_pool;

pub use buffer_pool::{BufferPool, PooledBuffer};
