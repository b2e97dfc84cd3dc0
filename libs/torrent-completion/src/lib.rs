/// Contains items to let someone to simply provide a raw torrent input source and get the
/// layout of the torrent out of it
pub mod parser;

/// Contains the data structures that keep track of which blocks and pieces of a torrent we have
pub mod core;
