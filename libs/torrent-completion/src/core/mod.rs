pub mod bitfield;
pub mod completion;
pub mod geometry;
pub mod selection;

pub use bitfield::Bitfield;
pub use completion::{Completeness, Completion};
pub use geometry::{FileSpan, Geometry};
pub use selection::{PieceSelection, TorrentView};

/// Zero based index of a piece, the unit over which the data is verified
pub type PieceIndex = usize;

/// Zero based index of a block, the unit requested from the peers
pub type BlockIndex = usize;

/// Zero based index of a file in the file table of the torrent
pub type FileIndex = usize;
