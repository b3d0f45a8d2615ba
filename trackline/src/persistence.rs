//! Durable, append-only storage of accepted fixes.
//!
//! # Track File Format
//!
//! A track file is a flat concatenation of fixed-size records with no header:
//!
//! ```text
//! offset  size  field
//! 0       8     latitude (f64, little-endian)
//! 8       8     longitude (f64, little-endian)
//! 16      8     horizontal accuracy in meters (f64, little-endian)
//! 24      8     unix timestamp in seconds (f64, little-endian)
//! ```
//!
//! The record count is the file length divided by [`RECORD_SIZE`]. A trailing
//! partial record (an interrupted append) is discarded on read. Appends never
//! rewrite earlier records.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::fix::{unix_seconds_to_datetime, Fix};

/// Size of one encoded fix in bytes.
pub const RECORD_SIZE: usize = 4 * std::mem::size_of::<f64>();

/// Append-only store for the accepted trajectory.
pub trait TrackStore: Send + Sync {
    /// Append fixes, in order, after every previously stored fix.
    fn append(&self, fixes: &[Fix]) -> Result<(), PersistenceError>;

    /// Read every stored fix in append order.
    fn read_all(&self) -> Result<Vec<Fix>, PersistenceError>;

    /// Remove every stored fix.
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// Binary track file on disk.
#[derive(Debug, Clone)]
pub struct TrackFile {
    path: PathBuf,
}

impl TrackFile {
    /// Create a track file handle. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of complete records in the file.
    pub fn len(&self) -> Result<usize, PersistenceError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() as usize / RECORD_SIZE),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Returns true if the file holds no complete record.
    pub fn is_empty(&self) -> Result<bool, PersistenceError> {
        Ok(self.len()? == 0)
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TrackStore for TrackFile {
    fn append(&self, fixes: &[Fix]) -> Result<(), PersistenceError> {
        if fixes.is_empty() {
            return Ok(());
        }

        let data = encode_records(fixes);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        file.write_all(&data).map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))?;

        debug!(
            path = %self.path.display(),
            records = fixes.len(),
            "Appended fixes to track file"
        );
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Fix>, PersistenceError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let trailing = data.len() % RECORD_SIZE;
        if trailing != 0 {
            warn!(
                path = %self.path.display(),
                trailing_bytes = trailing,
                "Discarding partial record at end of track file"
            );
        }

        Ok(decode_records(&data))
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Encode fixes into consecutive records.
pub fn encode_records(fixes: &[Fix]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(fixes.len() * RECORD_SIZE);
    for fix in fixes {
        buf.put_f64_le(fix.latitude);
        buf.put_f64_le(fix.longitude);
        buf.put_f64_le(fix.horizontal_accuracy);
        buf.put_f64_le(fix.unix_seconds());
    }
    buf
}

/// Decode every complete record, ignoring a trailing partial one.
///
/// Records whose timestamp cannot be represented are skipped.
pub fn decode_records(mut data: &[u8]) -> Vec<Fix> {
    let mut fixes = Vec::with_capacity(data.len() / RECORD_SIZE);
    while data.remaining() >= RECORD_SIZE {
        let latitude = data.get_f64_le();
        let longitude = data.get_f64_le();
        let horizontal_accuracy = data.get_f64_le();
        let unix_seconds = data.get_f64_le();

        match unix_seconds_to_datetime(unix_seconds) {
            Some(timestamp) => {
                fixes.push(Fix::new(latitude, longitude, horizontal_accuracy, timestamp))
            }
            None => warn!(unix_seconds, "Skipping track record with invalid timestamp"),
        }
    }
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fix(lat: f64, lon: f64, accuracy: f64, secs: f64) -> Fix {
        Fix::from_unix_seconds(lat, lon, accuracy, secs).unwrap()
    }

    fn track_in(dir: &TempDir) -> TrackFile {
        TrackFile::new(dir.path().join("track.bin"))
    }

    #[test]
    fn test_record_size() {
        assert_eq!(RECORD_SIZE, 32);
    }

    #[test]
    fn test_record_layout_is_little_endian() {
        let data = encode_records(&[fix(1.5, -2.25, 5.0, 1_477_000_000.0)]);
        assert_eq!(data.len(), RECORD_SIZE);
        assert_eq!(&data[0..8], &1.5f64.to_le_bytes());
        assert_eq!(&data[8..16], &(-2.25f64).to_le_bytes());
        assert_eq!(&data[16..24], &5.0f64.to_le_bytes());
        assert_eq!(&data[24..32], &1_477_000_000.0f64.to_le_bytes());
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let track = track_in(&dir);

        assert!(track.read_all().unwrap().is_empty());
        assert_eq!(track.len().unwrap(), 0);
        assert!(track.is_empty().unwrap());
    }

    #[test]
    fn test_appends_concatenate_in_order() {
        let dir = TempDir::new().unwrap();
        let track = track_in(&dir);

        let first = vec![
            fix(37.0, -122.0, 5.0, 1_477_000_000.0),
            fix(37.0001, -122.0, 4.0, 1_477_000_030.5),
        ];
        let second = vec![fix(37.0002, -122.0001, 3.0, 1_477_000_061.25)];

        track.append(&first).unwrap();
        track.append(&[]).unwrap();
        track.append(&second).unwrap();

        let mut expected = first.clone();
        expected.extend(second);
        assert_eq!(track.read_all().unwrap(), expected);
        assert_eq!(track.len().unwrap(), 3);
    }

    #[test]
    fn test_trailing_partial_record_discarded() {
        let dir = TempDir::new().unwrap();
        let track = track_in(&dir);
        let stored = fix(37.0, -122.0, 5.0, 1_477_000_000.0);
        track.append(&[stored]).unwrap();

        // Simulate an interrupted append
        let mut file = OpenOptions::new().append(true).open(track.path()).unwrap();
        file.write_all(&[0u8; 13]).unwrap();

        assert_eq!(track.read_all().unwrap(), vec![stored]);
        assert_eq!(track.len().unwrap(), 1);
    }

    #[test]
    fn test_clear_removes_records() {
        let dir = TempDir::new().unwrap();
        let track = track_in(&dir);
        track
            .append(&[fix(37.0, -122.0, 5.0, 1_477_000_000.0)])
            .unwrap();

        track.clear().unwrap();
        assert!(track.read_all().unwrap().is_empty());

        // Clearing a missing file is fine
        track.clear().unwrap();
    }

    #[test]
    fn test_append_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let track = TrackFile::new(dir.path().join("missing").join("track.bin"));

        let result = track.append(&[fix(37.0, -122.0, 5.0, 1_477_000_000.0)]);
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
    }
}
