use crate::{error::CheckError, state::Progress};
use futures::stream::{self, StreamExt};
use sha1::{Digest, Sha1};
use std::{
    fs,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use torrent_completion::{
    core::{Completion, FileSpan, Geometry, PieceIndex, PieceSelection},
    parser::torrent_parser::FileMeta,
};
use tracing::{debug, trace, warn};

/// Everything known about a torrent whose data is expected in some local directory
#[derive(Debug)]
pub struct LocalTorrent {
    /// Name of the torrent
    pub name: String,

    pub geometry: Geometry,

    /// Where each file lives within the byte stream of the torrent
    pub files: Vec<FileSpan>,

    /// Path of each file relative to the download directory
    pub paths: Vec<PathBuf>,

    /// The directory the data was downloaded into
    pub directory: PathBuf,

    /// Expected hash of each piece
    pub pieces_hash: Vec<[u8; 20]>,

    /// Per file "do-not-download" flags
    pub skipped: Vec<bool>,

    pub selection: PieceSelection,
}

/// Outcome of checking one piece against the data on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceVerdict {
    /// The data matches the expected hash
    Valid(PieceIndex),
    /// The data is there but doesn't match the expected hash
    Invalid(PieceIndex),
    /// Some file holding the piece is missing or too short
    Unavailable(PieceIndex),
}

/// How many pieces ended up with each verdict
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub valid: usize,
    pub invalid: usize,
    pub unavailable: usize,
}

impl LocalTorrent {
    /// Reads the ".torrent" file, the data is expected under `directory`
    pub fn load(path: &Path, directory: &Path, skip: &[usize]) -> Result<Self, CheckError> {
        let meta = FileMeta::from_torrent_file(path)?;
        Self::from_meta(&meta, directory, skip)
    }

    pub fn from_meta(meta: &FileMeta, directory: &Path, skip: &[usize]) -> Result<Self, CheckError> {
        let geometry = meta.geometry()?;
        let files = meta.file_spans()?;
        if let Some(&index) = skip.iter().find(|&&index| index >= files.len()) {
            return Err(CheckError::NoSuchFile {
                index,
                count: files.len(),
            });
        }

        let skipped = (0..files.len()).map(|index| skip.contains(&index)).collect();
        let selection = meta.selection(&geometry, skip)?;
        debug!(
            pieces = geometry.piece_count(),
            wanted = selection.wanted_count(),
            blocks = geometry.block_count(),
            "loaded torrent"
        );

        Ok(Self {
            name: meta.info.name.clone().unwrap_or_else(|| "download".to_owned()),
            geometry,
            files,
            paths: meta.file_paths()?,
            directory: directory.to_path_buf(),
            pieces_hash: meta.pieces_hash()?,
            skipped,
            selection,
        })
    }

    /// Reads the piece back from the files it spans and compares it with its expected hash
    pub fn verify_piece(&self, piece: PieceIndex, progress: &Progress) -> PieceVerdict {
        progress.add_pieces_checked(1);
        match self.hash_piece(piece, progress) {
            Ok(Some(hash)) if hash == self.pieces_hash[piece] => PieceVerdict::Valid(piece),
            Ok(Some(_)) => PieceVerdict::Invalid(piece),
            Ok(None) => {
                trace!(piece, "piece isn't on disk");
                PieceVerdict::Unavailable(piece)
            }
            Err(err) => {
                warn!(piece, %err, "couldn't read piece");
                PieceVerdict::Unavailable(piece)
            }
        }
    }

    /// Slices of the files holding the bytes of the piece, as (path, offset within the file,
    /// length)
    fn piece_slices(&self, piece: PieceIndex) -> impl Iterator<Item = (PathBuf, u64, u64)> + '_ {
        let start = piece as u64 * self.geometry.piece_size();
        let end = start + self.geometry.piece_byte_size(piece);

        self.files
            .iter()
            .zip(&self.paths)
            .filter(move |(span, _)| span.length > 0 && span.end() > start && span.offset < end)
            .map(move |(span, path)| {
                let from = start.max(span.offset);
                let to = end.min(span.end());
                (self.directory.join(path), from - span.offset, to - from)
            })
    }

    /// Streams the piece through SHA-1 straight from the files it spans. Gives back None when
    /// some of those files doesn't exist or is too short, which is found out before reading
    /// anything.
    fn hash_piece(&self, piece: PieceIndex, progress: &Progress) -> io::Result<Option<[u8; 20]>> {
        for (path, offset, length) in self.piece_slices(piece) {
            match fs::metadata(&path) {
                Ok(metadata) if metadata.len() >= offset + length => {}
                Ok(_) => return Ok(None),
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err),
            }
        }

        let mut hasher = Sha1::new();
        for (path, offset, length) in self.piece_slices(piece) {
            let mut file = fs::File::open(&path)?;
            file.seek(SeekFrom::Start(offset))?;
            let copied = io::copy(&mut file.take(length), &mut hasher)?;
            progress.add_bytes_read(copied);
            if copied < length {
                // Got shorter since its length was looked up
                return Ok(None);
            }
        }
        Ok(Some(hasher.finalize().into()))
    }
}

/// Hashes every piece of the torrent, at most `jobs` at a time, sending each verdict as soon as
/// it's known
async fn hash_pieces(
    torrent: Arc<LocalTorrent>,
    jobs: usize,
    progress: Arc<Progress>,
    verdicts_sender: UnboundedSender<PieceVerdict>,
) -> Result<(), CheckError> {
    let mut verdicts = stream::iter(0..torrent.geometry.piece_count())
        .map(|piece| {
            let torrent = torrent.clone();
            let progress = progress.clone();
            tokio::task::spawn_blocking(move || torrent.verify_piece(piece, &progress))
        })
        .buffer_unordered(jobs.max(1));

    while let Some(verdict) = verdicts.next().await {
        if verdicts_sender.send(verdict?).is_err() {
            // Nobody is listening for the verdicts anymore
            break;
        }
    }
    Ok(())
}

/// Checks the data of the torrent on disk and gives back the completion it adds up to.
///
/// Pieces are hashed concurrently, but every verdict is funneled through a channel into this
/// task, the only one that ever touches the [Completion]
pub async fn check(
    torrent: Arc<LocalTorrent>,
    jobs: usize,
    progress: Arc<Progress>,
) -> Result<(Completion, CheckSummary), CheckError> {
    let (verdicts_sender, mut verdicts_receiver) = unbounded_channel::<PieceVerdict>();
    let hasher = tokio::spawn(hash_pieces(torrent.clone(), jobs, progress, verdicts_sender));

    let mut completion = Completion::new(torrent.geometry);
    let mut summary = CheckSummary::default();
    while let Some(verdict) = verdicts_receiver.recv().await {
        match verdict {
            PieceVerdict::Valid(piece) => {
                summary.valid += 1;
                completion.add_piece(&torrent.selection, piece);
            }
            PieceVerdict::Invalid(piece) => {
                summary.invalid += 1;
                warn!(piece, "piece failed its hash check");
                completion.remove_piece(piece);
            }
            PieceVerdict::Unavailable(_) => summary.unavailable += 1,
        }
    }

    hasher.await??;
    debug!(?summary, size_now = completion.size_now(), "check finished");
    Ok((completion, summary))
}
