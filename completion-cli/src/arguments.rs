use crate::error::CheckError;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser, Default)]
#[clap(author = "Rishad Baniya", version, about = "Checks how much of a torrent is already on disk")]
pub struct Arguments {
    #[arg(short('f'))]
    /// Path to the torrent file whose data you wish to check
    pub torrent_file: Option<PathBuf>,

    /// URI of the torrent you wish to check
    #[arg(short('m'))]
    pub magnet_uri: Option<String>,

    /// Directory the data of the torrent was downloaded into
    #[arg(short('d'), default_value = ".")]
    pub directory: PathBuf,

    /// Index of a file that isn't wanted, can be given multiple times
    #[arg(short('s'), long = "skip")]
    pub skip: Vec<usize>,

    /// Width of the progress bar
    #[arg(short('b'), long, default_value_t = 40)]
    pub buckets: usize,

    /// No of pieces checked at the same time
    #[arg(short('j'), long, default_value_t = 4)]
    pub jobs: usize,

    /// Print the piece bitfield, as it would be announced to the peers
    #[arg(long)]
    pub bitfield: bool,
}

/// Where the metadata of the torrent comes from
#[derive(Debug, PartialEq, Eq)]
pub enum Source<'a> {
    TorrentFile(&'a Path),
    MagnetURI(&'a str),
}

impl Arguments {
    /// Checks that exactly one of the torrent file and the magnet URI is provided, and gives
    /// back that one
    pub fn check(&self) -> Result<Source<'_>, CheckError> {
        match (&self.torrent_file, &self.magnet_uri) {
            (Some(path), None) => Ok(Source::TorrentFile(path)),
            (None, Some(uri)) => Ok(Source::MagnetURI(uri)),
            (Some(_), Some(_)) => Err(CheckError::ConflictingSources),
            (None, None) => Err(CheckError::MissingSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_torrent_file_check() {
        let args = Arguments::parse_from(["completion-cli", "-f", "x.torrent", "-d", "/data", "-s", "1", "-s", "3"]);
        assert_eq!(args.skip, vec![1, 3]);
        assert_eq!(args.buckets, 40);
        assert_eq!(args.jobs, 4);
        assert_eq!(args.check().unwrap(), Source::TorrentFile(Path::new("x.torrent")));
    }

    #[test]
    fn needs_exactly_one_source() {
        let args = Arguments::default();
        assert!(matches!(args.check(), Err(CheckError::MissingSource)));

        let args = Arguments::parse_from(["completion-cli", "-f", "x.torrent", "-m", "magnet:?xt=urn:btih:00"]);
        assert!(matches!(args.check(), Err(CheckError::ConflictingSources)));
    }
}
