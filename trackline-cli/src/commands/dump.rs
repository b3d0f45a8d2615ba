//! Dump command - print the records of a track file.

use std::path::Path;

use chrono::SecondsFormat;
use trackline::fix::Fix;
use trackline::persistence::{TrackFile, TrackStore};

use crate::error::CliError;

/// Run the dump command.
pub fn run(track_file: &Path) -> Result<(), CliError> {
    let track = TrackFile::new(track_file);
    let fixes = track.read_all()?;

    for fix in &fixes {
        println!("{}", format_record(fix));
    }
    println!("{} record(s) in {}", fixes.len(), track_file.display());

    Ok(())
}

/// One line per record: time, coordinate, accuracy.
pub fn format_record(fix: &Fix) -> String {
    format!(
        "{}  {:>11.6} {:>12.6}  ±{:.1} m",
        fix.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        fix.latitude,
        fix.longitude,
        fix.horizontal_accuracy
    )
}
