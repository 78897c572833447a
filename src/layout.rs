//! Byte-range mapping between pieces, blocks and files.
//!
//! A transfer is one contiguous byte stream cut into fixed-size pieces; files
//! are laid end to end over that stream. A piece at the edge of a file may
//! therefore cover bytes of its neighbours, and every range reported for a
//! file has to be clipped to that file's own bytes.

use std::ops::Range;
use std::path::PathBuf;

/// Returns the transfer-absolute offset of a byte inside a piece.
pub fn piece_offset(piece_length: u64, piece_index: u32, block_offset: u64) -> u64 {
    piece_length * u64::from(piece_index) + block_offset
}

/// Intersects `interval` with the file range `file_start..file_end`.
///
/// Returns `None` when the two are disjoint or the intersection is empty.
pub fn clip_to_file(interval: Range<u64>, file_start: u64, file_end: u64) -> Option<Range<u64>> {
    let start = interval.start.max(file_start);
    let end = interval.end.min(file_end);
    (start < end).then_some(start..end)
}

/// One file of a transfer and its position in the transfer's byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub index: usize,
    /// Path relative to the transfer's root directory.
    pub path: PathBuf,
    pub length: u64,
    /// Transfer-absolute offset of the first byte.
    pub offset: u64,
    pub first_piece: u32,
    pub last_piece: u32,
}

impl TorrentFile {
    pub fn byte_range(&self) -> Range<u64> {
        self.offset..self.offset + self.length
    }

    pub fn contains_offset(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.offset + self.length
    }

    pub fn piece_count(&self) -> u32 {
        self.last_piece - self.first_piece + 1
    }

    /// Clips a transfer-absolute range to this file and converts it to
    /// `(file_relative_offset, length)`.
    pub fn relative(&self, interval: Range<u64>) -> Option<(u64, u64)> {
        let range = self.byte_range();
        clip_to_file(interval, range.start, range.end)
            .map(|clipped| (clipped.start - self.offset, clipped.end - clipped.start))
    }
}

/// Piece geometry and file placement for a whole transfer.
#[derive(Debug, Clone)]
pub struct TorrentLayout {
    piece_length: u64,
    total_length: u64,
    files: Vec<TorrentFile>,
}

impl TorrentLayout {
    /// Lays `files` (relative path, length) end to end over pieces of
    /// `piece_length` bytes.
    pub fn new(piece_length: u64, files: Vec<(PathBuf, u64)>) -> Self {
        let piece_length = piece_length.max(1);
        let total_length: u64 = files.iter().map(|(_, len)| len).sum();
        let piece_count = total_length.div_ceil(piece_length).max(1);
        let last_valid = (piece_count - 1) as u32;

        let mut offset = 0u64;
        let files = files
            .into_iter()
            .enumerate()
            .map(|(index, (path, length))| {
                let first_piece = ((offset / piece_length) as u32).min(last_valid);
                let last_piece = if length == 0 {
                    first_piece
                } else {
                    (((offset + length - 1) / piece_length) as u32).min(last_valid)
                };
                let file = TorrentFile {
                    index,
                    path,
                    length,
                    offset,
                    first_piece,
                    last_piece,
                };
                offset += length;
                file
            })
            .collect();

        Self {
            piece_length,
            total_length,
            files,
        }
    }

    /// Nominal piece length; only the last piece may be shorter.
    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn piece_count(&self) -> u32 {
        self.total_length.div_ceil(self.piece_length) as u32
    }

    /// Actual length of piece `index`, or 0 if out of range.
    pub fn piece_size(&self, index: u32) -> u64 {
        let start = piece_offset(self.piece_length, index, 0);
        if start >= self.total_length {
            return 0;
        }
        self.piece_length.min(self.total_length - start)
    }

    pub fn piece_range(&self, index: u32) -> Range<u64> {
        let start = piece_offset(self.piece_length, index, 0);
        start..start + self.piece_size(index)
    }

    pub fn files(&self) -> &[TorrentFile] {
        &self.files
    }

    pub fn file(&self, index: usize) -> Option<&TorrentFile> {
        self.files.get(index)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_files() -> TorrentLayout {
        TorrentLayout::new(
            100,
            vec![
                (PathBuf::from("a.bin"), 250),
                (PathBuf::from("b.bin"), 300),
                (PathBuf::from("c.bin"), 30),
            ],
        )
    }

    #[test]
    fn test_piece_offset() {
        assert_eq!(piece_offset(100, 0, 0), 0);
        assert_eq!(piece_offset(100, 4, 50), 450);
        assert_eq!(piece_offset(16384, 2, 16384), 49152);
    }

    #[test]
    fn test_clip_to_file() {
        assert_eq!(clip_to_file(200..300, 250, 550), Some(250..300));
        assert_eq!(clip_to_file(500..600, 250, 550), Some(500..550));
        assert_eq!(clip_to_file(300..400, 250, 550), Some(300..400));
        assert_eq!(clip_to_file(0..250, 250, 550), None);
        assert_eq!(clip_to_file(550..600, 250, 550), None);
    }

    #[test]
    fn test_file_placement() {
        let layout = three_files();
        assert_eq!(layout.total_length(), 580);
        assert_eq!(layout.piece_count(), 6);

        let a = layout.file(0).unwrap();
        assert_eq!((a.offset, a.first_piece, a.last_piece), (0, 0, 2));

        let b = layout.file(1).unwrap();
        assert_eq!((b.offset, b.first_piece, b.last_piece), (250, 2, 5));
        assert_eq!(b.piece_count(), 4);

        let c = layout.file(2).unwrap();
        assert_eq!((c.offset, c.first_piece, c.last_piece), (550, 5, 5));
    }

    #[test]
    fn test_last_piece_is_short() {
        let layout = three_files();
        assert_eq!(layout.piece_size(0), 100);
        assert_eq!(layout.piece_size(5), 80);
        assert_eq!(layout.piece_size(6), 0);
        assert_eq!(layout.piece_range(5), 500..580);
    }

    #[test]
    fn test_relative_range() {
        let layout = three_files();
        let b = layout.file(1).unwrap();
        assert_eq!(b.relative(200..300), Some((0, 50)));
        assert_eq!(b.relative(500..600), Some((250, 50)));
        assert_eq!(b.relative(0..100), None);
        assert!(b.contains_offset(250));
        assert!(!b.contains_offset(550));
    }

    #[test]
    fn test_empty_file_keeps_valid_pieces() {
        let layout = TorrentLayout::new(
            100,
            vec![(PathBuf::from("a"), 100), (PathBuf::from("empty"), 0)],
        );
        let empty = layout.file(1).unwrap();
        assert_eq!((empty.first_piece, empty.last_piece), (0, 0));
    }
}
