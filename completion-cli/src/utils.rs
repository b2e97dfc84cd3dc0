// Some shared code that is useful everywhere
//
pub fn bytes_to_human_readable(size: u64) -> String {
    let kibibytes = size as f64 / 1024_f64;
    if kibibytes < 1024_f64 {
        format!("{:.2} KiB", kibibytes)
    } else {
        let mibibytes = kibibytes / 1024_f64;
        if mibibytes < 1024_f64 {
            format!("{:.2} MiB", mibibytes)
        } else {
            let gibibytes = mibibytes / 1024_f64;
            format!("{:.2} GiB", gibibytes)
        }
    }
}

/// Formats a ratio between 0 and 1 as a percentage
pub fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100_f64)
}
