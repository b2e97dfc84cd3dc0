use magnet_url::Magnet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MagnetURIMetaError {
    #[error("{0} isn't a valid magnet URI")]
    URIError(String),

    #[error("magnet URI doesn't carry an info hash")]
    MissingInfoHash,
}

/// DataStructure that maps the data within a Magnet URI into something rust program can use.
///
/// Unlike a ".torrent" file, a magnet URI doesn't tell anything about the pieces or the files of
/// the torrent, those have to be fetched from the peers first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetURIMeta {
    /// **(Required)** Exact Topic : Info Hash of the torrent
    pub info_hash: String,

    /// **(Optional)** Display name : The filename to display to the user
    pub display_name: Option<String>,
}

impl MagnetURIMeta {
    pub fn from_magnet_uri(uri: &str) -> Result<MagnetURIMeta, MagnetURIMetaError> {
        let magnet = Magnet::new(uri).map_err(|_| MagnetURIMetaError::URIError(uri.to_owned()))?;
        let info_hash = magnet.xt.ok_or(MagnetURIMetaError::MissingInfoHash)?;
        Ok(MagnetURIMeta {
            info_hash,
            display_name: magnet.dn,
        })
    }
}
