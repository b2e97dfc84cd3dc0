use super::{Bitfield, BlockIndex, FileSpan, Geometry, PieceIndex, TorrentView};
use std::cell::Cell;
use strum_macros::Display;
use tracing::{debug, trace};

/// Coarse classification of how far along a torrent is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Completeness {
    /// Some wanted bytes are still missing
    #[strum(serialize = "downloading")]
    Leech,

    /// Every block of the torrent is present, regardless of what is wanted
    #[strum(serialize = "seeding")]
    Seed,

    /// Every wanted block is present, but not every block
    #[strum(serialize = "partial seed")]
    PartialSeed,

    /// The piece table isn't known yet, so neither is how much is left
    #[strum(serialize = "metadata pending")]
    MetadataPending,
}

impl Completeness {
    /// Whether there's nothing left that we want to download
    pub fn is_done(&self) -> bool {
        matches!(self, Completeness::Seed | Completeness::PartialSeed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Cached {
    value: u64,
    dirty: bool,
}

/// A byte count derived from the block bitfield that is only recomputed on demand, after some
/// mutation marked it dirty
#[derive(Debug, Clone)]
struct LazyBytes(Cell<Cached>);

impl LazyBytes {
    fn dirty() -> Self {
        Self(Cell::new(Cached { value: 0, dirty: true }))
    }

    fn invalidate(&self) {
        self.0.set(Cached { value: 0, dirty: true });
    }

    fn is_dirty(&self) -> bool {
        self.0.get().dirty
    }

    fn get_or_update(&self, compute: impl FnOnce() -> u64) -> u64 {
        let cached = self.0.get();
        if !cached.dirty {
            return cached.value;
        }
        let value = compute();
        self.0.set(Cached { value, dirty: false });
        value
    }
}

/// Keeps track of which blocks of a single torrent have been received and verified, and derives
/// from them how much of the torrent we have and how much we still need.
///
/// `size_now` is kept up to date on every mutation. The bytes we need (`size_when_done`) and the
/// bytes belonging to complete pieces (`have_valid`) need a scan over every piece, so they're
/// memoized and only recomputed once a mutation that could change them has happened:
///
/// - adding a block dirties `have_valid`, and `size_when_done` only if the block's piece isn't
///   wanted, as a wanted piece counts in full whether we have its bytes or not
/// - removing a piece dirties both
/// - a change in the wanted flags dirties `size_when_done`, see [Completion::invalidate_wanted]
///
/// The results are point in time snapshots, query again after mutating instead of holding on to
/// them. The tracker doesn't synchronize anything itself, whoever owns it has to serialize the
/// access to it.
#[derive(Debug, Clone)]
pub struct Completion {
    geometry: Geometry,

    /// Bit i is set once block i has been received and verified
    blocks: Bitfield,

    /// Bytes of all the blocks we have
    size_now: u64,

    /// Bytes of the wanted pieces plus whatever we have of the unwanted ones
    size_when_done: LazyBytes,

    /// Bytes of the pieces we have every block of
    have_valid: LazyBytes,
}

impl Completion {
    /// Creates a tracker with no block present
    pub fn new(geometry: Geometry) -> Self {
        let mut completion = Self {
            geometry,
            blocks: Bitfield::new(geometry.block_count()),
            size_now: 0,
            size_when_done: LazyBytes::dirty(),
            have_valid: LazyBytes::dirty(),
        };
        completion.reset();
        completion
    }

    /// Forgets every block we have
    pub fn reset(&mut self) {
        self.size_now = 0;
        self.size_when_done.invalidate();
        self.have_valid.invalidate();
        self.blocks.set_has_none();
    }

    /// Replaces the blocks we have with the ones set in `blocks`, e.g a block bitfield that was
    /// saved earlier on.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` doesn't have exactly one bit per block of the torrent
    pub fn block_init(&mut self, blocks: &Bitfield) {
        self.reset();
        self.blocks.set_from_bitfield(blocks);

        let block_count = self.geometry.block_count();
        self.size_now = self.blocks.count() as u64 * self.geometry.block_size();
        if block_count > 0 && self.blocks.get(block_count - 1) {
            self.size_now -= self.geometry.block_size() - self.geometry.last_block_size();
        }

        assert!(
            self.size_now <= self.geometry.total_size(),
            "{} bytes present in a torrent of {} bytes",
            self.size_now,
            self.geometry.total_size()
        );
        debug!(blocks = self.blocks.count(), bytes = self.size_now, "initialized completion");
    }

    /// Marks the block as received and verified, adding a block we already have does nothing
    pub fn add_block(&mut self, tor: &impl TorrentView, block: BlockIndex) {
        if self.block_is_complete(block) {
            return;
        }

        let piece = self.geometry.block_piece(block);
        self.blocks.set(block);
        self.size_now += self.geometry.block_byte_size(block);
        trace!(block, piece, size_now = self.size_now, "added block");

        self.have_valid.invalidate();
        if !tor.is_piece_wanted(piece) {
            self.size_when_done.invalidate();
        }
    }

    /// Marks every block of the piece as received and verified
    pub fn add_piece(&mut self, tor: &impl TorrentView, piece: PieceIndex) {
        for block in self.geometry.piece_block_range(piece) {
            self.add_block(tor, block);
        }
    }

    /// Drops every block of the piece, e.g after the piece failed its hash check and has to be
    /// downloaded again
    pub fn remove_piece(&mut self, piece: PieceIndex) {
        let blocks = self.geometry.piece_block_range(piece);
        let (first, last) = (*blocks.start(), *blocks.end());

        for block in blocks {
            if self.blocks.get(block) {
                self.size_now -= self.geometry.block_byte_size(block);
            }
        }

        self.have_valid.invalidate();
        self.size_when_done.invalidate();
        self.blocks.clear_range(first, last + 1);
        debug!(piece, size_now = self.size_now, "removed piece");
    }

    /// Has to be called whenever the wanted flag of any piece changes
    pub fn invalidate_wanted(&self) {
        self.size_when_done.invalidate();
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The raw block bitfield, bit i being set iff we have block i
    pub fn blocks(&self) -> &Bitfield {
        &self.blocks
    }

    /// Whether we have every block, i.e we're a seed
    pub fn has_all(&self) -> bool {
        self.blocks.has_all()
    }

    /// Whether we don't have a single block
    pub fn has_none(&self) -> bool {
        self.blocks.has_none()
    }

    pub fn block_is_complete(&self, block: BlockIndex) -> bool {
        self.blocks.get(block)
    }

    pub fn piece_is_complete(&self, piece: PieceIndex) -> bool {
        self.missing_blocks_in_piece(piece) == 0
    }

    /// Bytes of every block we have, complete pieces or not
    pub fn size_now(&self) -> u64 {
        self.size_now
    }

    /// Bytes we'll have once every wanted piece is downloaded. An unwanted piece still counts for
    /// whatever blocks of it we happen to have.
    pub fn size_when_done(&self, tor: &impl TorrentView) -> u64 {
        self.size_when_done.get_or_update(|| {
            let size = if self.has_all() {
                self.geometry.total_size()
            } else {
                (0..self.geometry.piece_count())
                    .map(|piece| {
                        if tor.is_piece_wanted(piece) {
                            self.geometry.piece_byte_size(piece)
                        } else {
                            self.present_bytes_in_piece(piece)
                        }
                    })
                    .sum::<u64>()
            };

            debug_assert!(size <= self.geometry.total_size());
            debug_assert!(size >= self.size_now);
            debug!(size, "recomputed size when done");
            size
        })
    }

    /// Bytes still missing out of the wanted ones
    pub fn left_until_done(&self, tor: &impl TorrentView) -> u64 {
        let size_when_done = self.size_when_done(tor);
        assert!(
            size_when_done >= self.size_now,
            "have {} bytes but only {} are needed",
            self.size_now,
            size_when_done
        );
        size_when_done - self.size_now
    }

    /// Bytes of the pieces we have every block of.
    ///
    /// # Panics
    ///
    /// Panics if the torrent doesn't have its metadata yet
    pub fn have_valid(&self, tor: &impl TorrentView) -> u64 {
        assert!(tor.has_metadata(), "valid bytes asked for before the metadata is known");
        self.have_valid.get_or_update(|| {
            let size = (0..self.geometry.piece_count())
                .filter(|&piece| self.piece_is_complete(piece))
                .map(|piece| self.geometry.piece_byte_size(piece))
                .sum::<u64>();
            debug!(size, "recomputed valid bytes");
            size
        })
    }

    /// Share of the entire torrent we have, between 0 and 1
    pub fn percent_complete(&self) -> f64 {
        ratio(self.size_now, self.geometry.total_size())
    }

    /// Share of the wanted bytes we have, between 0 and 1
    pub fn percent_done(&self, tor: &impl TorrentView) -> f64 {
        ratio(self.size_now, self.size_when_done(tor))
    }

    pub fn status(&self, tor: &impl TorrentView) -> Completeness {
        if self.has_all() {
            Completeness::Seed
        } else if !tor.has_metadata() {
            Completeness::MetadataPending
        } else if self.size_now == self.size_when_done(tor) {
            Completeness::PartialSeed
        } else {
            Completeness::Leech
        }
    }

    /// No of blocks of the piece we don't have yet
    pub fn missing_blocks_in_piece(&self, piece: PieceIndex) -> usize {
        if self.has_all() {
            return 0;
        }
        let blocks = self.geometry.piece_block_range(piece);
        let (first, last) = (*blocks.start(), *blocks.end());
        (last + 1 - first) - self.blocks.count_range(first, last + 1)
    }

    /// Bytes of the piece we don't have yet
    pub fn missing_bytes_in_piece(&self, piece: PieceIndex) -> u64 {
        if self.has_all() {
            return 0;
        }
        let piece_size = self.geometry.piece_byte_size(piece);
        let blocks = self.geometry.piece_block_range(piece);
        let (first, last) = (*blocks.start(), *blocks.end());

        // every block but the last one of the piece is a full block
        let mut have = self.blocks.count_range(first, last) as u64 * self.geometry.block_size();
        if self.blocks.get(last) {
            have += self.geometry.block_byte_size(last);
        }

        debug_assert!(have <= piece_size);
        piece_size - have
    }

    /// Whether we have every block the file has bytes in, an empty file is always complete
    pub fn file_is_complete(&self, file: &FileSpan) -> bool {
        if file.length == 0 {
            return true;
        }
        let blocks = self.geometry.file_block_range(file);
        let (first, last) = (*blocks.start(), *blocks.end());
        self.blocks.count_range(first, last + 1) == last + 1 - first
    }

    /// Samples how complete the torrent is into `tabs` values between 0 and 1, meant for drawing
    /// a progress bar.
    ///
    /// Tab i shows the piece at `i * piece_count / tabs`, truncated, so when the pieces don't
    /// divide evenly into the tabs some pieces are never sampled and, with more tabs than pieces,
    /// some are sampled twice.
    pub fn amount_done(&self, tabs: usize) -> Vec<f32> {
        let piece_count = self.geometry.piece_count();
        let seed = self.has_all();
        let interval = piece_count as f32 / tabs as f32;

        (0..tabs)
            .map(|tab| {
                if seed {
                    1.0
                } else if piece_count == 0 {
                    0.0
                } else {
                    let piece = ((tab as f32 * interval) as PieceIndex).min(piece_count - 1);
                    let blocks = self.geometry.piece_block_range(piece);
                    let (first, last) = (*blocks.start(), *blocks.end());
                    self.blocks.count_range(first, last + 1) as f32 / (last + 1 - first) as f32
                }
            })
            .collect()
    }

    /// One bit per piece, set iff we have every block of that piece, as announced to peers in
    /// the "bitfield" message.
    ///
    /// # Panics
    ///
    /// Panics if the torrent doesn't have its metadata yet
    pub fn piece_bitfield(&self, tor: &impl TorrentView) -> Bitfield {
        assert!(tor.has_metadata(), "piece bitfield asked for before the metadata is known");
        let piece_count = self.geometry.piece_count();

        if self.has_all() {
            Bitfield::with_all(piece_count)
        } else if self.has_none() {
            Bitfield::new(piece_count)
        } else {
            let flags: Vec<bool> = (0..piece_count).map(|piece| self.piece_is_complete(piece)).collect();
            Bitfield::from_flags(&flags)
        }
    }

    fn present_bytes_in_piece(&self, piece: PieceIndex) -> u64 {
        let blocks = self.geometry.piece_block_range(piece);
        let (first, last) = (*blocks.start(), *blocks.end());

        let mut bytes = self.blocks.count_range(first, last + 1) as u64 * self.geometry.block_size();
        if last + 1 == self.geometry.block_count() && self.blocks.get(last) {
            bytes -= self.geometry.block_size() - self.geometry.last_block_size();
        }

        debug_assert!(bytes <= self.geometry.piece_byte_size(piece));
        bytes
    }
}

/// `numerator / denominator`, 0 when there's nothing to divide and 1 when something is divided
/// by nothing
fn ratio(numerator: u64, denominator: u64) -> f64 {
    match (numerator, denominator) {
        (0, 0) => 0.0,
        (_, 0) => 1.0,
        _ => numerator as f64 / denominator as f64,
    }
}
