use super::{Bitfield, FileSpan, Geometry, PieceIndex};

/// What the completion tracker reads from the torrent it belongs to, besides its geometry
pub trait TorrentView {
    /// Whether the piece table of the torrent is known, a torrent added through a magnet URI
    /// doesn't have one until the metadata arrives from peers
    fn has_metadata(&self) -> bool;

    /// Whether the bytes of the piece count towards what we need to download
    fn is_piece_wanted(&self, piece: PieceIndex) -> bool;
}

/// Per piece "wanted" flags derived from the files the user chose to download.
///
/// NOTE : Whenever a flag changes, the owner of the tracker must call
/// [Completion::invalidate_wanted](super::Completion::invalidate_wanted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceSelection {
    wanted: Bitfield,
    has_metadata: bool,
}

impl PieceSelection {
    /// Every piece is wanted
    pub fn all(piece_count: usize) -> Self {
        Self {
            wanted: Bitfield::with_all(piece_count),
            has_metadata: true,
        }
    }

    /// Selection of a torrent whose metadata is still being fetched
    pub fn pending() -> Self {
        Self {
            wanted: Bitfield::new(0),
            has_metadata: false,
        }
    }

    /// A piece is wanted as long as at least one wanted file has bytes in it, so a piece shared
    /// by a wanted and an unwanted file is still downloaded in full
    pub fn from_files(geometry: &Geometry, files: &[FileSpan], wanted_files: &[bool]) -> Self {
        let mut selection = Self::all(geometry.piece_count());
        selection.set_files_wanted(geometry, files, wanted_files);
        selection
    }

    /// Recomputes every flag out of the per file flags, returns whether any piece flag changed
    pub fn set_files_wanted(&mut self, geometry: &Geometry, files: &[FileSpan], wanted_files: &[bool]) -> bool {
        assert_eq!(
            files.len(),
            wanted_files.len(),
            "{} files but {} wanted flags",
            files.len(),
            wanted_files.len()
        );

        let mut wanted = Bitfield::new(geometry.piece_count());
        for (file, _) in files
            .iter()
            .zip(wanted_files)
            .filter(|(file, keep)| **keep && file.length > 0)
        {
            let pieces = geometry.file_piece_range(file);
            wanted.set_range(*pieces.start(), pieces.end() + 1);
        }

        let changed = wanted != self.wanted;
        self.wanted = wanted;
        changed
    }

    /// Returns whether the flag changed
    pub fn set_piece_wanted(&mut self, piece: PieceIndex, wanted: bool) -> bool {
        if self.wanted.get(piece) == wanted {
            return false;
        }
        if wanted {
            self.wanted.set(piece);
        } else {
            self.wanted.clear_range(piece, piece + 1);
        }
        true
    }

    /// No of wanted pieces
    pub fn wanted_count(&self) -> usize {
        self.wanted.count()
    }

    pub fn wanted(&self) -> &Bitfield {
        &self.wanted
    }
}

impl TorrentView for PieceSelection {
    fn has_metadata(&self) -> bool {
        self.has_metadata
    }

    fn is_piece_wanted(&self, piece: PieceIndex) -> bool {
        self.wanted.get(piece)
    }
}
