mod arguments;
mod check;
mod error;
mod report;
mod state;
mod utils;

use crate::{
    arguments::{Arguments, Source},
    check::LocalTorrent,
    error::CheckError,
    state::Progress,
    utils::bytes_to_human_readable,
};
use clap::Parser;
use std::{io, process, sync::Arc, time::Duration};
use torrent_completion::parser::magnet_uri_parser::MagnetURIMeta;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Arguments::parse();
    if let Err(err) = run(&args).await {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

async fn run(args: &Arguments) -> Result<(), CheckError> {
    match args.check()? {
        Source::TorrentFile(path) => {
            let torrent = Arc::new(LocalTorrent::load(path, &args.directory, &args.skip)?);
            info!(name = %torrent.name, directory = ?torrent.directory, "checking torrent");

            let progress = Arc::new(Progress::default());
            let ticker = tokio::spawn(show_progress(progress.clone(), torrent.geometry.piece_count()));
            let result = check::check(torrent.clone(), args.jobs, progress).await;
            ticker.abort();
            eprintln!();
            let (completion, summary) = result?;

            report::print_report(
                &mut io::stdout().lock(),
                &torrent,
                &completion,
                &summary,
                args.buckets,
                args.bitfield,
            )?;
        }
        Source::MagnetURI(uri) => {
            let meta = MagnetURIMeta::from_magnet_uri(uri)?;
            report::print_pending(&mut io::stdout().lock(), &meta, args.buckets)?;
        }
    }
    Ok(())
}

/// Keeps printing how far the check has gone, until it gets aborted
async fn show_progress(progress: Arc<Progress>, piece_count: usize) {
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    loop {
        interval.tick().await;
        eprint!(
            "\rchecked {}/{} pieces, {} read",
            progress.pieces_checked(),
            piece_count,
            bytes_to_human_readable(progress.bytes_read())
        );
    }
}
