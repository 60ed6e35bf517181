use indicatif::{ProgressBar, ProgressStyle};

/// Terminal progress bar for the long per-energy and per-run loops. Hidden
/// when disabled so callers can tick it unconditionally.
pub fn progress_bar(len: usize, message: &'static str, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len as u64);
    match ProgressStyle::with_template("{msg} [{elapsed_precise}] {wide_bar} {pos}/{len}") {
        Ok(style) => bar.set_style(style),
        Err(e) => log::debug!("Using the default progress style: {e}"),
    }
    bar.set_message(message);
    bar
}
