/// Parses the bencode encoded ".torrent" file
pub mod torrent_parser;

/// Parses the magnet URI, which doesn't carry the piece table of the torrent
pub mod magnet_uri_parser;
