//! Storage constants and tuning parameters.
//!
//! This module contains the constants used throughout the per-file storage
//! layer, including buffer pool sizing and the attribute keys read from the
//! persisted download state.

// ============================================================================
// Block size
// ============================================================================

/// Standard block size (16KB)
pub const BLOCK_SIZE: usize = 16384;

// ============================================================================
// Buffer pool
// ============================================================================

/// Maximum number of idle block-sized buffers kept by the pool
pub const BUFFER_POOL_BLOCKS: usize = 1024;

/// Maximum number of idle piece-sized buffers kept by the pool
pub const BUFFER_POOL_PIECES: usize = 64;

// ============================================================================
// Download state attributes
// ============================================================================

/// Attribute key holding the do-not-download subfolder name
pub const ATTR_DND_SUBFOLDER: &str = "dnd_sf";

/// Attribute key holding the incomplete-file suffix
pub const ATTR_INCOMPLETE_FILE_SUFFIX: &str = "incompfilesuffix";
