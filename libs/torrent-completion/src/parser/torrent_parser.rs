use crate::core::{
    geometry::{FileSpan, Geometry, GeometryError},
    PieceSelection,
};
use serde_derive::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// Error types while using FileMeta DataStructure
#[derive(Debug, Error)]
pub enum FileMetaError {
    /// Error thrown when there is some issue while reading the file path provided
    #[error("couldn't read the torrent file {path:?}")]
    FileError {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    /// Error thrown when deserializing the ".torrent" bencode encoded data into FileMeta struct
    #[error("invalid bencode data")]
    InvalidEncoding(#[from] serde_bencode::Error),

    #[error("piece hashes take {0} bytes, which isn't a multiple of 20")]
    InvalidPieceHashes(usize),

    #[error("torrent doesn't have a piece length")]
    MissingPieceLength,

    #[error("torrent has neither a length nor a list of files")]
    MissingLength,

    #[error("negative length {0} in the torrent")]
    NegativeLength(i64),

    #[error("torrent has {hashes} piece hashes but its data spans {pieces} pieces")]
    PieceCountMismatch { hashes: usize, pieces: usize },

    /// A name or a path component that would land the file outside of the download directory
    #[error("file path {0:?} escapes the download directory")]
    UnsafePath(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// DataStructure that maps all the data inside of bencode encoded ".torrent" file
/// into something rust program can use.
#[derive(Debug, Deserialize, Serialize)]
pub struct FileMeta {
    /// **(Required)** It's a URL that specifies the location of the tracker
    pub announce: String,

    /// **(Optional)** It's a list of backup trackers in case the primary tracker is unavailable
    #[serde(rename = "announce-list", skip_serializing_if = "Option::is_none")]
    pub announce_list: Option<Vec<Vec<String>>>,

    /// **(Required)** It's a  dictionary that contains metadata about the file or group of files.
    pub info: Info,

    /// **(Optional)** UNIX timestamp that indicates when the file was created
    #[serde(rename = "creation date", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<i64>,

    /// **(Optional)** A comment about the torrent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// **(Optional)** String indicating the name and version of the software that was used to create the torrent file
    #[serde(rename = "created by", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// The fields within the Info DataStructure are used to build "info hash", so it must the required
/// fields and its data must not be missed
#[derive(Debug, Deserialize, Serialize)]
pub struct Info {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Size of the only file, in single file mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,

    /// Every file, in multiple file mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<File>>,

    #[serde(rename = "piece length", skip_serializing_if = "Option::is_none")]
    pub piece_length: Option<i64>,

    /// Consists of byte string of concatenation of all 20-byte SHA1 hash values, one per piece
    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct File {
    pub length: i64,
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5sum: Option<String>,
}

impl FileMeta {
    /// Just pass in your path to the torrent file, it will try to return a
    /// DataStructure[FileMeta] that contains all the metadata that was within the ".torrent" file
    pub fn from_torrent_file(path: impl AsRef<Path>) -> Result<FileMeta, FileMetaError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|cause| FileMetaError::FileError {
            path: path.to_path_buf(),
            cause,
        })?;
        Self::from_raw_torrent_file(&bytes)
    }

    /// Passing the bytes of the ".torrent" file will try to generate a DataStructure[FileMeta] from the given bencode encoded data
    pub fn from_raw_torrent_file(bytes: &[u8]) -> Result<FileMeta, FileMetaError> {
        Ok(serde_bencode::de::from_bytes::<FileMeta>(bytes)?)
    }

    /// InfoHash is the SHA1 hash of all the fields within the "info" field of bencode encoded
    /// torrent file
    pub fn info_hash(&self) -> Result<[u8; 20], FileMetaError> {
        let info_bytes = serde_bencode::ser::to_bytes(&self.info)?;
        let mut hasher = Sha1::new();
        hasher.update(info_bytes);
        Ok(hasher.finalize().into())
    }

    /// Splits the "pieces" field into the expected hash of every piece, by its index
    pub fn pieces_hash(&self) -> Result<Vec<[u8; 20]>, FileMetaError> {
        let pieces = &self.info.pieces;
        if pieces.len() % 20 != 0 {
            return Err(FileMetaError::InvalidPieceHashes(pieces.len()));
        }
        Ok(pieces
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }

    /// Length of every file in the order they're laid out in the torrent, a single file torrent
    /// has exactly one
    pub fn file_lengths(&self) -> Result<Vec<u64>, FileMetaError> {
        let lengths: Vec<i64> = match (&self.info.files, self.info.length) {
            (Some(files), _) => files.iter().map(|file| file.length).collect(),
            (None, Some(length)) => vec![length],
            (None, None) => return Err(FileMetaError::MissingLength),
        };
        lengths
            .into_iter()
            .map(|length| u64::try_from(length).map_err(|_| FileMetaError::NegativeLength(length)))
            .collect()
    }

    /// Total size of the entire torrent in bytes
    pub fn total_size(&self) -> Result<u64, FileMetaError> {
        Ok(self.file_lengths()?.iter().sum())
    }

    /// Where every file lives within the byte stream of the torrent
    pub fn file_spans(&self) -> Result<Vec<FileSpan>, FileMetaError> {
        Ok(FileSpan::layout(self.file_lengths()?))
    }

    /// Relative path of every file, rooted at the name of the torrent in multiple file mode.
    ///
    /// Every component must be a plain name, anything like ".." or an absolute path is rejected
    pub fn file_paths(&self) -> Result<Vec<PathBuf>, FileMetaError> {
        let name = self.info.name.clone().unwrap_or_else(|| "download".to_owned());
        let root = relative_path(std::iter::once(&name))?;
        match self.info.files {
            Some(ref files) => files
                .iter()
                .map(|file| relative_path(&file.path).map(|path| root.join(path)))
                .collect(),
            None => Ok(vec![root]),
        }
    }

    /// Lays out the pieces and blocks of the torrent, making sure there's exactly one hash per
    /// piece
    pub fn geometry(&self) -> Result<Geometry, FileMetaError> {
        let piece_length = self.info.piece_length.ok_or(FileMetaError::MissingPieceLength)?;
        let piece_length = u64::try_from(piece_length).map_err(|_| FileMetaError::NegativeLength(piece_length))?;
        let geometry = Geometry::with_default_block_size(self.total_size()?, piece_length)?;

        let hashes = self.pieces_hash()?.len();
        if hashes != geometry.piece_count() {
            return Err(FileMetaError::PieceCountMismatch {
                hashes,
                pieces: geometry.piece_count(),
            });
        }
        Ok(geometry)
    }

    /// Piece selection that skips the files whose index is in `skipped_files`
    pub fn selection(&self, geometry: &Geometry, skipped_files: &[usize]) -> Result<PieceSelection, FileMetaError> {
        let files = self.file_spans()?;
        let wanted: Vec<bool> = (0..files.len()).map(|index| !skipped_files.contains(&index)).collect();
        Ok(PieceSelection::from_files(geometry, &files, &wanted))
    }
}

/// Joins the components, making sure each one of them is a plain name
fn relative_path<'a>(components: impl IntoIterator<Item = &'a String>) -> Result<PathBuf, FileMetaError> {
    let mut path = PathBuf::new();
    for component in components {
        let plain = Path::new(component)
            .components()
            .all(|part| matches!(part, Component::Normal(_) | Component::CurDir));
        if !plain {
            return Err(FileMetaError::UnsafePath(component.clone()));
        }
        path.push(component);
    }
    Ok(path)
}
