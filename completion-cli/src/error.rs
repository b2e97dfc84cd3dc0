use thiserror::Error;
use torrent_completion::parser::{magnet_uri_parser::MagnetURIMetaError, torrent_parser::FileMetaError};

/// Everything that can go wrong while checking the data of a torrent
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("provide either a torrent file (-f) or a magnet URI (-m)")]
    MissingSource,

    #[error("provide only one of a torrent file (-f) and a magnet URI (-m)")]
    ConflictingSources,

    #[error("file index {index} is out of range, the torrent has {count} files")]
    NoSuchFile { index: usize, count: usize },

    #[error(transparent)]
    Meta(#[from] FileMetaError),

    #[error(transparent)]
    Magnet(#[from] MagnetURIMetaError),

    #[error("piece check task failed")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
