use super::{BlockIndex, PieceIndex};
use std::ops::RangeInclusive;
use thiserror::Error;

/// The largest block a peer is asked for in a single request, i.e 16 KiB
pub const MAX_BLOCK_SIZE: u64 = 1 << 14;

/// Errors while laying out the pieces and blocks of a torrent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("torrent doesn't contain any data")]
    EmptyTorrent,

    #[error("piece size must be greater than zero")]
    ZeroPieceSize,

    #[error("block size must be greater than zero")]
    ZeroBlockSize,

    #[error("block size {block_size} is larger than the piece size {piece_size}")]
    BlockLargerThanPiece { block_size: u64, piece_size: u64 },

    #[error("block size {block_size} doesn't evenly divide the piece size {piece_size}")]
    UnalignedBlockSize { block_size: u64, piece_size: u64 },
}

/// Where a single file lives inside the contiguous byte stream of the torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSpan {
    /// Byte offset of the first byte of the file
    pub offset: u64,

    /// Size of the file in bytes, might be zero
    pub length: u64,
}

impl FileSpan {
    /// Lays out files of the given lengths one after the other, in the order they appear
    pub fn layout(lengths: impl IntoIterator<Item = u64>) -> Vec<FileSpan> {
        let mut offset = 0;
        lengths
            .into_iter()
            .map(|length| {
                let span = FileSpan { offset, length };
                offset += length;
                span
            })
            .collect()
    }

    /// Byte offset one past the last byte of the file
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Maps the byte stream of a torrent onto pieces and blocks.
///
/// Every piece is `piece_size` bytes and every block is `block_size` bytes, except for the final
/// piece and the final block, which hold whatever is left over. The block size always divides the
/// piece size, so the blocks of a piece form a contiguous range that no other piece shares.
///
/// [Geometry::default] is the layout of a torrent whose metadata hasn't been fetched yet, it has
/// neither pieces nor blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    total_size: u64,
    piece_size: u64,
    block_size: u64,
    piece_count: usize,
    block_count: usize,
    last_piece_size: u64,
    last_block_size: u64,
}

impl Geometry {
    pub fn new(total_size: u64, piece_size: u64, block_size: u64) -> Result<Self, GeometryError> {
        if total_size == 0 {
            return Err(GeometryError::EmptyTorrent);
        }
        if piece_size == 0 {
            return Err(GeometryError::ZeroPieceSize);
        }
        if block_size == 0 {
            return Err(GeometryError::ZeroBlockSize);
        }
        if block_size > piece_size {
            return Err(GeometryError::BlockLargerThanPiece { block_size, piece_size });
        }
        if piece_size % block_size != 0 {
            return Err(GeometryError::UnalignedBlockSize { block_size, piece_size });
        }

        Ok(Self {
            total_size,
            piece_size,
            block_size,
            piece_count: total_size.div_ceil(piece_size) as usize,
            block_count: total_size.div_ceil(block_size) as usize,
            last_piece_size: leftover(total_size, piece_size),
            last_block_size: leftover(total_size, block_size),
        })
    }

    /// Picks the block size out of the piece size, halving it until it fits in a single request
    pub fn with_default_block_size(total_size: u64, piece_size: u64) -> Result<Self, GeometryError> {
        let mut block_size = piece_size;
        while block_size > MAX_BLOCK_SIZE {
            block_size /= 2;
        }
        Self::new(total_size, piece_size, block_size)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn piece_size(&self) -> u64 {
        self.piece_size
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn last_piece_size(&self) -> u64 {
        self.last_piece_size
    }

    pub fn last_block_size(&self) -> u64 {
        self.last_block_size
    }

    /// Size in bytes of the given piece
    pub fn piece_byte_size(&self, piece: PieceIndex) -> u64 {
        self.check_piece(piece);
        if piece + 1 == self.piece_count {
            self.last_piece_size
        } else {
            self.piece_size
        }
    }

    /// Size in bytes of the given block
    pub fn block_byte_size(&self, block: BlockIndex) -> u64 {
        self.check_block(block);
        if block + 1 == self.block_count {
            self.last_block_size
        } else {
            self.block_size
        }
    }

    /// The piece the given block belongs to
    pub fn block_piece(&self, block: BlockIndex) -> PieceIndex {
        self.check_block(block);
        (block as u64 * self.block_size / self.piece_size) as PieceIndex
    }

    /// The first and the last block of the given piece
    pub fn piece_block_range(&self, piece: PieceIndex) -> RangeInclusive<BlockIndex> {
        let offset = piece as u64 * self.piece_size;
        let last_byte = offset + self.piece_byte_size(piece) - 1;
        self.block_of(offset)..=self.block_of(last_byte)
    }

    /// The first and the last block holding bytes of the given file.
    ///
    /// A zero length file holds no bytes, it maps onto the single block its offset falls in.
    pub fn file_block_range(&self, file: &FileSpan) -> RangeInclusive<BlockIndex> {
        self.check_file(file);
        let first = self.block_of(file.offset).min(self.block_count - 1);
        match file.length {
            0 => first..=first,
            length => first..=self.block_of(file.offset + length - 1),
        }
    }

    /// The first and the last piece holding bytes of the given file, following the same rule as
    /// [Geometry::file_block_range] for zero length files
    pub fn file_piece_range(&self, file: &FileSpan) -> RangeInclusive<PieceIndex> {
        self.check_file(file);
        let first = ((file.offset / self.piece_size) as PieceIndex).min(self.piece_count - 1);
        match file.length {
            0 => first..=first,
            length => first..=((file.offset + length - 1) / self.piece_size) as PieceIndex,
        }
    }

    fn block_of(&self, byte: u64) -> BlockIndex {
        (byte / self.block_size) as BlockIndex
    }

    fn check_piece(&self, piece: PieceIndex) {
        assert!(
            piece < self.piece_count,
            "piece {} out of range for torrent of {} pieces",
            piece,
            self.piece_count
        );
    }

    fn check_block(&self, block: BlockIndex) {
        assert!(
            block < self.block_count,
            "block {} out of range for torrent of {} blocks",
            block,
            self.block_count
        );
    }

    fn check_file(&self, file: &FileSpan) {
        assert!(
            self.piece_count > 0 && file.end() <= self.total_size,
            "file at {}..{} lies outside of torrent of {} bytes",
            file.offset,
            file.end(),
            self.total_size
        );
    }
}

/// Size of the final chunk when `total` is cut into chunks of `size`
fn leftover(total: u64, size: u64) -> u64 {
    match total % size {
        0 => size,
        rest => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Geometry {
        // 900 bytes => pieces of 400, 400, 100 and blocks of 200, 200, 200, 200, 100
        Geometry::new(900, 400, 200).unwrap()
    }

    #[test]
    fn counts_and_final_sizes() {
        let geometry = small();
        assert_eq!(geometry.piece_count(), 3);
        assert_eq!(geometry.block_count(), 5);
        assert_eq!(geometry.last_piece_size(), 100);
        assert_eq!(geometry.last_block_size(), 100);
        assert_eq!(geometry.piece_byte_size(0), 400);
        assert_eq!(geometry.piece_byte_size(2), 100);
        assert_eq!(geometry.block_byte_size(3), 200);
        assert_eq!(geometry.block_byte_size(4), 100);
    }

    #[test]
    fn evenly_divided_torrent_has_full_final_sizes() {
        let geometry = Geometry::new(1000, 500, 250).unwrap();
        assert_eq!(geometry.piece_count(), 2);
        assert_eq!(geometry.block_count(), 4);
        assert_eq!(geometry.last_piece_size(), 500);
        assert_eq!(geometry.last_block_size(), 250);
    }

    #[test]
    fn piece_block_ranges_partition_the_blocks() {
        let geometry = small();
        assert_eq!(geometry.piece_block_range(0), 0..=1);
        assert_eq!(geometry.piece_block_range(1), 2..=3);
        assert_eq!(geometry.piece_block_range(2), 4..=4);

        let mut next = 0;
        for piece in 0..geometry.piece_count() {
            let range = geometry.piece_block_range(piece);
            assert_eq!(*range.start(), next);
            for block in range.clone() {
                assert_eq!(geometry.block_piece(block), piece);
            }
            let bytes: u64 = range.clone().map(|b| geometry.block_byte_size(b)).sum();
            assert_eq!(bytes, geometry.piece_byte_size(piece));
            next = range.end() + 1;
        }
        assert_eq!(next, geometry.block_count());
    }

    #[test]
    fn file_ranges() {
        let geometry = small();
        let files = FileSpan::layout([450, 0, 450]);
        assert_eq!(files[1], FileSpan { offset: 450, length: 0 });
        assert_eq!(geometry.file_block_range(&files[0]), 0..=2);
        assert_eq!(geometry.file_block_range(&files[1]), 2..=2);
        assert_eq!(geometry.file_block_range(&files[2]), 2..=4);
        assert_eq!(geometry.file_piece_range(&files[0]), 0..=1);
        assert_eq!(geometry.file_piece_range(&files[2]), 1..=2);
    }

    #[test]
    fn trailing_empty_file_maps_onto_last_block() {
        let geometry = small();
        let file = FileSpan { offset: 900, length: 0 };
        assert_eq!(geometry.file_block_range(&file), 4..=4);
        assert_eq!(geometry.file_piece_range(&file), 2..=2);
    }

    #[test]
    fn default_block_size_fits_in_a_request() {
        let geometry = Geometry::with_default_block_size(1 << 20, 1 << 18).unwrap();
        assert_eq!(geometry.block_size(), MAX_BLOCK_SIZE);
        assert_eq!(geometry.block_count(), 64);

        let geometry = Geometry::with_default_block_size(10_000, 8192).unwrap();
        assert_eq!(geometry.block_size(), 8192);
        assert_eq!(geometry.last_block_size(), 10_000 - 8192);
    }

    #[test]
    fn rejects_invalid_layouts() {
        assert_eq!(Geometry::new(0, 16, 16), Err(GeometryError::EmptyTorrent));
        assert_eq!(Geometry::new(10, 0, 16), Err(GeometryError::ZeroPieceSize));
        assert_eq!(Geometry::new(10, 16, 0), Err(GeometryError::ZeroBlockSize));
        assert_eq!(
            Geometry::new(10, 16, 32),
            Err(GeometryError::BlockLargerThanPiece {
                block_size: 32,
                piece_size: 16
            })
        );
        assert_eq!(
            Geometry::new(1000, 500, 200),
            Err(GeometryError::UnalignedBlockSize {
                block_size: 200,
                piece_size: 500
            })
        );
    }

    #[test]
    fn pending_metadata_has_nothing() {
        let geometry = Geometry::default();
        assert_eq!(geometry.piece_count(), 0);
        assert_eq!(geometry.block_count(), 0);
        assert_eq!(geometry.total_size(), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_piece_panics() {
        small().piece_block_range(3);
    }
}
