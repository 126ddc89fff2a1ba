//! User-facing terminal messages
//!
//! Short coloured messages for the person running the tool, kept separate
//! from `log` output (which carries timestamps and module paths and is off
//! unless `-v` is given).

use owo_colors::OwoColorize;

use crate::models::IndexStats;

/// Print a warning in yellow, surrounded by blank lines
///
/// ```ignore
/// output::warn("Unable to write results results.json: permission denied");
/// ```
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Print an error in red, surrounded by blank lines
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}

/// Print the outcome of an indexing run
///
/// Green when every file was read, yellow when some failed.
pub fn index_summary(stats: &IndexStats) {
    let line = summary_line(stats);
    if stats.files_failed > 0 {
        warn(&line);
    } else {
        eprintln!("{}", line.green());
    }
}

fn summary_line(stats: &IndexStats) -> String {
    let mut line = format!(
        "Indexed {} files ({} locations, {} unique words)",
        stats.files_indexed, stats.locations, stats.unique_words
    );
    if stats.files_failed > 0 {
        line.push_str(&format!(
            "; {} of {} files could not be fully read, see log for details",
            stats.files_failed,
            stats.files_indexed + stats.files_failed
        ));
    }
    line
}
