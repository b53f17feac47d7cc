//! Segment naming and the writer for the active segment.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Operation, Result};

const SEGMENT_PREFIX: &str = "segment_";
const SEGMENT_SUFFIX: &str = ".log";

/// Generates the file name for a segment sequence number.
///
/// ```
/// assert_eq!(segmented_aof::segment_file_name(7), "segment_7.log");
/// ```
pub fn segment_file_name(sequence: u64) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, sequence, SEGMENT_SUFFIX)
}

/// Parses a sequence number from a segment file name.
///
/// Only names produced by [`segment_file_name`] are accepted, so
/// `segment_007.log` or `segment_+7.log` return `None`.
pub fn parse_segment_file_name(filename: &str) -> Option<u64> {
    let digits = filename
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    let sequence = digits.parse::<u64>().ok()?;
    (segment_file_name(sequence) == filename).then_some(sequence)
}

/// The single segment open for writing.
#[derive(Debug)]
pub(crate) struct ActiveSegment {
    file: File,
    path: PathBuf,
    sequence: u64,
    /// Bytes confirmed written since the segment was opened
    bytes_written: u64,
}

impl ActiveSegment {
    /// Creates a new, empty segment file for `sequence`.
    ///
    /// Fails if a file with that name already exists; segments are never
    /// reopened for writing.
    pub(crate) fn create(dir: &Path, sequence: u64) -> Result<Self> {
        let path = dir.join(segment_file_name(sequence));
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(Operation::Open, &path, e))?;

        debug!(sequence, path = %path.display(), "opened segment");

        Ok(Self {
            file,
            path,
            sequence,
            bytes_written: 0,
        })
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Writes `data` whole, then syncs if asked. If either step fails the
    /// counter is left untouched and the file is truncated back to the last
    /// confirmed length.
    pub(crate) fn append(&mut self, data: &[u8], sync: bool) -> Result<()> {
        let result = match self.file.write_all(data) {
            Ok(()) if sync => self.sync(),
            Ok(()) => Ok(()),
            Err(e) => Err(Error::io(Operation::Write, &self.path, e)),
        };

        match result {
            Ok(()) => {
                self.bytes_written += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.bytes_written) {
            warn!(
                sequence = self.sequence,
                error = %e,
                "failed to truncate unconfirmed bytes"
            );
        }
    }

    /// Wraps an already open file, such as a device that rejects writes or
    /// fsync.
    #[cfg(test)]
    pub(crate) fn on_device(path: &Path, sequence: u64) -> Self {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .expect("device opens for writing");
        Self {
            file,
            path: path.to_path_buf(),
            sequence,
            bytes_written: 0,
        }
    }

    pub(crate) fn sync(&mut self) -> Result<()> {
        self.file
            .flush()
            .and_then(|_| self.file.sync_data())
            .map_err(|e| Error::io(Operation::Sync, &self.path, e))
    }

    /// Flushes everything, metadata included, ahead of dropping the handle.
    pub(crate) fn finish(&mut self) -> Result<()> {
        self.file
            .flush()
            .and_then(|_| self.file.sync_all())
            .map_err(|e| Error::io(Operation::Close, &self.path, e))
    }
}
