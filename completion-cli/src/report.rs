use crate::{
    check::{CheckSummary, LocalTorrent},
    utils::{bytes_to_human_readable, percent},
};
use std::io::{self, Write};
use torrent_completion::{
    core::{Completion, Geometry, PieceSelection, TorrentView},
    parser::magnet_uri_parser::MagnetURIMeta,
};

/// Shades from an untouched tab to a complete one
const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Turns the per tab completion into a bar, any tab with some data in it is at least lightly shaded
pub fn progress_bar(amounts: &[f32]) -> String {
    amounts
        .iter()
        .map(|&amount| {
            let shade = (amount.clamp(0.0, 1.0) * 4.0).ceil() as usize;
            SHADES[shade.min(SHADES.len() - 1)]
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Prints what the check found out about the torrent
pub fn print_report(
    out: &mut impl Write,
    torrent: &LocalTorrent,
    completion: &Completion,
    summary: &CheckSummary,
    buckets: usize,
    show_bitfield: bool,
) -> io::Result<()> {
    let selection = &torrent.selection;
    let geometry = completion.geometry();

    writeln!(out, "{} : {}", torrent.name, completion.status(selection))?;
    writeln!(
        out,
        "pieces : {} of {} bytes, {} verified, {} corrupt, {} not on disk",
        geometry.piece_count(),
        geometry.piece_size(),
        summary.valid,
        summary.invalid,
        summary.unavailable
    )?;
    writeln!(
        out,
        "have   : {} of {} ({})",
        bytes_to_human_readable(completion.size_now()),
        bytes_to_human_readable(geometry.total_size()),
        percent(completion.percent_complete())
    )?;
    writeln!(
        out,
        "wanted : {} ({} done), {} left",
        bytes_to_human_readable(completion.size_when_done(selection)),
        percent(completion.percent_done(selection)),
        bytes_to_human_readable(completion.left_until_done(selection))
    )?;
    writeln!(out, "valid  : {}", bytes_to_human_readable(completion.have_valid(selection)))?;

    let incomplete: Vec<_> = (0..geometry.piece_count())
        .filter(|&piece| selection.is_piece_wanted(piece) && !completion.piece_is_complete(piece))
        .collect();
    writeln!(
        out,
        "missing: {} in {} wanted pieces ({} blocks)",
        bytes_to_human_readable(incomplete.iter().map(|&piece| completion.missing_bytes_in_piece(piece)).sum()),
        incomplete.len(),
        incomplete
            .iter()
            .map(|&piece| completion.missing_blocks_in_piece(piece))
            .sum::<usize>()
    )?;

    for (index, (file, path)) in torrent.files.iter().zip(&torrent.paths).enumerate() {
        let mark = if completion.file_is_complete(file) { 'x' } else { ' ' };
        let skipped = if torrent.skipped[index] { " (skipped)" } else { "" };
        writeln!(
            out,
            "[{mark}] {index} {} ({}){skipped}",
            path.display(),
            bytes_to_human_readable(file.length)
        )?;
    }

    if buckets > 0 {
        writeln!(out, "|{}|", progress_bar(&completion.amount_done(buckets)))?;
    }
    if show_bitfield {
        writeln!(out, "bitfield : {}", hex(&completion.piece_bitfield(selection).to_bytes()))?;
    }
    Ok(())
}

/// Prints what can be told about a torrent known only through its magnet URI, which isn't much
/// until its metadata is fetched
pub fn print_pending(out: &mut impl Write, meta: &MagnetURIMeta, buckets: usize) -> io::Result<()> {
    let selection = PieceSelection::pending();
    let completion = Completion::new(Geometry::default());

    let name = meta.display_name.as_deref().unwrap_or("unnamed torrent");
    writeln!(out, "{name} : {}", completion.status(&selection))?;
    writeln!(out, "info hash : {}", meta.info_hash)?;
    writeln!(out, "have   : {}", bytes_to_human_readable(completion.size_now()))?;
    if buckets > 0 {
        writeln!(out, "|{}|", progress_bar(&completion.amount_done(buckets)))?;
    }
    Ok(())
}
