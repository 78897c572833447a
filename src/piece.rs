//! Piece and block progress as seen by the storage layer.
//!
//! The piece tracker is an upstream collaborator: it decides when a block is
//! written and when a piece has passed verification. This module defines the
//! narrow query interface the storage layer reads, plus [`PieceProgress`], an
//! in-memory tracker suitable for owners that keep progress themselves.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::layout::TorrentLayout;

/// Read-only view of piece and block completion.
pub trait PieceStates: Send + Sync {
    /// Returns true if the piece is fully written and verified.
    fn is_done(&self, piece: u32) -> bool;

    /// Actual length of the piece in bytes.
    fn piece_length(&self, piece: u32) -> u64;

    /// Number of blocks the piece is split into.
    fn block_count(&self, piece: u32) -> usize;

    /// Size of block `block` of `piece`; the last block may be short.
    fn block_size(&self, piece: u32, block: usize) -> u32;

    /// Returns true if block `block` of `piece` has been written.
    fn is_written(&self, piece: u32, block: usize) -> bool;
}

/// In-memory piece tracker.
///
/// Done pieces are kept in a bitfield numbered from the high bit of the first
/// byte. Written blocks are only tracked for pieces that are not done yet.
pub struct PieceProgress {
    piece_length: u64,
    total_length: u64,
    piece_count: u32,
    block_size: u32,
    done: RwLock<Vec<u8>>,
    written: RwLock<HashMap<u32, Vec<bool>>>,
}

impl PieceProgress {
    pub fn new(layout: &TorrentLayout, block_size: u32) -> Self {
        let piece_count = layout.piece_count();
        Self {
            piece_length: layout.piece_length(),
            total_length: layout.total_length(),
            piece_count,
            block_size: block_size.max(1),
            done: RwLock::new(vec![0; (piece_count as usize).div_ceil(8)]),
            written: RwLock::new(HashMap::new()),
        }
    }

    pub fn piece_count(&self) -> u32 {
        self.piece_count
    }

    /// Marks a piece as written and verified.
    pub fn set_done(&self, piece: u32) {
        if piece >= self.piece_count {
            return;
        }
        let (byte, bit) = bit_position(piece);
        self.done.write()[byte] |= 1 << bit;
        self.written.write().remove(&piece);
    }

    /// Marks one block of an unfinished piece as written.
    pub fn set_written(&self, piece: u32, block: usize) {
        if piece >= self.piece_count || self.is_done(piece) {
            return;
        }
        let count = self.block_count(piece);
        if block >= count {
            return;
        }
        let mut written = self.written.write();
        let blocks = written.entry(piece).or_insert_with(|| vec![false; count]);
        blocks[block] = true;
    }

    /// Forgets everything known about a piece, e.g. after a failed hash check.
    pub fn reset(&self, piece: u32) {
        if piece >= self.piece_count {
            return;
        }
        let (byte, bit) = bit_position(piece);
        self.done.write()[byte] &= !(1 << bit);
        self.written.write().remove(&piece);
    }
}

fn bit_position(piece: u32) -> (usize, u32) {
    let index = piece as usize;
    (index / 8, 7 - (piece % 8))
}

impl PieceStates for PieceProgress {
    fn is_done(&self, piece: u32) -> bool {
        if piece >= self.piece_count {
            return false;
        }
        let (byte, bit) = bit_position(piece);
        (self.done.read()[byte] >> bit) & 1 == 1
    }

    fn piece_length(&self, piece: u32) -> u64 {
        let start = self.piece_length * u64::from(piece);
        if start >= self.total_length {
            return 0;
        }
        self.piece_length.min(self.total_length - start)
    }

    fn block_count(&self, piece: u32) -> usize {
        self.piece_length(piece).div_ceil(u64::from(self.block_size)) as usize
    }

    fn block_size(&self, piece: u32, block: usize) -> u32 {
        let start = block as u64 * u64::from(self.block_size);
        let length = self.piece_length(piece);
        if start >= length {
            return 0;
        }
        (length - start).min(u64::from(self.block_size)) as u32
    }

    fn is_written(&self, piece: u32, block: usize) -> bool {
        if self.is_done(piece) {
            return true;
        }
        self.written
            .read()
            .get(&piece)
            .and_then(|blocks| blocks.get(block).copied())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn progress() -> PieceProgress {
        let layout = TorrentLayout::new(100, vec![(PathBuf::from("f"), 250)]);
        PieceProgress::new(&layout, 40)
    }

    #[test]
    fn test_block_geometry() {
        let progress = progress();
        assert_eq!(progress.piece_count(), 3);
        assert_eq!(progress.block_count(0), 3);
        assert_eq!(progress.block_size(0, 0), 40);
        assert_eq!(progress.block_size(0, 2), 20);
        assert_eq!(progress.piece_length(2), 50);
        assert_eq!(progress.block_count(2), 2);
        assert_eq!(progress.block_size(2, 1), 10);
    }

    #[test]
    fn test_done_and_written() {
        let progress = progress();
        progress.set_written(1, 1);
        assert!(progress.is_written(1, 1));
        assert!(!progress.is_written(1, 0));
        assert!(!progress.is_done(1));

        progress.set_done(1);
        assert!(progress.is_done(1));
        assert!(progress.is_written(1, 0));

        progress.reset(1);
        assert!(!progress.is_done(1));
        assert!(!progress.is_written(1, 1));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let progress = progress();
        progress.set_done(10);
        progress.set_written(0, 9);
        assert!(!progress.is_done(10));
        assert!(!progress.is_written(0, 9));
    }
}
