//! A segmented append-only log (AOF) with size-based rotation and
//! count-based retention.
//!
//! Records are appended to a single active segment file. When the next
//! record would push the active segment past its size limit, the segment is
//! closed and a fresh one is opened under the next sequence number. Segments
//! that fall outside the retained window are deleted.
//!
//! # Features
//!
//! - Deterministic segment names (`segment_<seq>.log`) with contiguous sequences
//! - Records are never split across segments
//! - Bounded disk usage via a retained segment count
//! - Thread-safe: every method takes `&self` and serializes on one lock
//! - Resumes numbering after a restart instead of overwriting old segments
//!
//! # Examples
//!
//! ```no_run
//! use segmented_aof::{LogOptions, SegmentedLog};
//!
//! # fn main() -> Result<(), segmented_aof::Error> {
//! let options = LogOptions::default()
//!     .segment_size_limit(1024 * 1024)
//!     .retained_segment_count(4);
//! let log = SegmentedLog::open("./my_aof", options)?;
//!
//! log.append(b"SET key value\n")?;
//! log.append_batch([&b"INCR counter\n"[..], &b"DEL key\n"[..]])?;
//! log.close()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod options;
mod segment;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{error, info, warn};

pub use error::{Error, Operation, Result};
pub use options::LogOptions;
pub use segment::{parse_segment_file_name, segment_file_name};

use segment::ActiveSegment;

/// Sequence number of the first segment ever created in a directory.
pub const FIRST_SEQUENCE: u64 = 1;

/// Mutable state, guarded as one unit.
#[derive(Debug)]
struct LogState {
    /// `None` only after a rotation failed to create the next segment.
    active: Option<ActiveSegment>,
    /// Sequence of the active segment, or of the segment that failed to open.
    active_sequence: u64,
    /// Sequences believed to be on disk: found at open, created since, or
    /// whose removal failed.
    segments: BTreeSet<u64>,
}

impl LogState {
    /// Builds the state for `dir` from the segments found there.
    ///
    /// A failed retention pass is logged, not returned; the stale segments
    /// stay tracked and are retried by the next pass.
    fn resume(
        dir: &Path,
        options: &LogOptions,
        existing: Vec<u64>,
        remove: impl FnMut(&Path) -> io::Result<()>,
    ) -> Result<Self> {
        let (oldest, newest) = match (existing.first(), existing.last()) {
            (Some(&oldest), Some(&newest)) => (oldest, newest),
            _ => {
                return Ok(Self {
                    active: None,
                    active_sequence: FIRST_SEQUENCE,
                    segments: BTreeSet::new(),
                })
            }
        };

        let active_sequence = newest.checked_add(1).ok_or_else(|| {
            Error::Config(format!("segment sequence space exhausted in {}", dir.display()))
        })?;
        info!(
            dir = %dir.display(),
            segments = existing.len(),
            oldest,
            newest,
            "resuming existing log"
        );

        let mut state = Self {
            active: None,
            active_sequence,
            segments: existing.into_iter().collect(),
        };
        // The new segment does not exist yet, so this only ever removes
        // segments outside the window that will be current once it opens.
        if let Err(e) = cleanup_window(dir, options, &mut state, remove) {
            warn!(error = %e, "stale segments left behind at open");
        }
        Ok(state)
    }
}

/// Segmented append-only log.
///
/// The `SegmentedLog` owns exactly one open segment at a time. Appends,
/// rotation and retention all run under a single mutex, so records from
/// concurrent callers land in segments in lock-acquisition order.
#[derive(Debug)]
pub struct SegmentedLog {
    dir: PathBuf,
    options: LogOptions,
    state: Mutex<LogState>,
}

impl SegmentedLog {
    /// Opens a log in `dir`, creating the directory if needed.
    ///
    /// In an empty directory the first segment is `segment_1.log`. If segment
    /// files already exist, numbering resumes after the highest one and a
    /// retention pass runs before the new segment is created. Only segments
    /// found by the directory scan are candidates for that pass; one that
    /// cannot be removed is logged and retried on the next rotation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if options are invalid or `dir` is not a
    /// writable directory. Options are checked before the filesystem is
    /// touched.
    /// Returns `Error::Io` if the directory cannot be created or scanned, or
    /// the first segment cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use segmented_aof::{LogOptions, SegmentedLog};
    ///
    /// let log = SegmentedLog::open("./my_aof", LogOptions::default())?;
    /// assert_eq!(log.active_sequence(), 1);
    /// # Ok::<(), segmented_aof::Error>(())
    /// ```
    pub fn open(dir: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        options.validate()?;

        let dir = dir.as_ref().to_path_buf();
        prepare_directory(&dir)?;

        let existing = scan_segments(&dir)?;
        let mut state = LogState::resume(&dir, &options, existing, remove_segment_file)?;

        state.active = Some(ActiveSegment::create(&dir, state.active_sequence)?);
        state.segments.insert(state.active_sequence);

        Ok(Self {
            dir,
            options,
            state: Mutex::new(state),
        })
    }

    /// Appends one record to the active segment.
    ///
    /// If the record does not fit in the active segment's remaining space and
    /// the segment already holds data, the segment is rotated first. A record
    /// larger than the size limit is still written whole, alone in its
    /// segment. Empty records write nothing and never rotate.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if rotation, retention, the write, or the sync
    /// fails, and for every append once a rotation has failed to create its
    /// new segment. A failed write or sync truncates the segment back to its
    /// length before the call, so a retry does not duplicate the record.
    pub fn append(&self, data: impl AsRef<[u8]>) -> Result<()> {
        let mut state = self.state.lock();
        self.append_locked(&mut state, data.as_ref(), self.options.sync_on_append)
    }

    /// Appends several records under one lock acquisition.
    ///
    /// Each record follows the same rotation rule as [`append`](Self::append),
    /// so no record is split. With `sync_on_append` the active segment is
    /// synced once after the last record.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; records before it remain
    /// persisted. If only the final sync fails, every record has been written
    /// but may not be durable.
    pub fn append_batch<I, B>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut state = self.state.lock();
        for record in records {
            self.append_locked(&mut state, record.as_ref(), false)?;
        }
        if self.options.sync_on_append {
            active_mut(&self.dir, &mut state)?.sync()?;
        }
        Ok(())
    }

    fn append_locked(&self, state: &mut LogState, data: &[u8], sync: bool) -> Result<()> {
        let written = active_mut(&self.dir, state)?.bytes_written();
        let len = data.len() as u64;

        if len > 0 && written > 0 && written.saturating_add(len) > self.options.segment_size_limit {
            self.rotate(state)?;
        }

        active_mut(&self.dir, state)?.append(data, sync)
    }

    /// Closes the active segment, opens the next one and prunes old segments.
    fn rotate(&self, state: &mut LogState) -> Result<()> {
        let next = state
            .active_sequence
            .checked_add(1)
            .ok_or_else(|| Error::Config("segment sequence space exhausted".to_string()))?;

        // A failed close keeps the old segment active.
        active_mut(&self.dir, state)?.finish()?;
        state.active = None;
        state.active_sequence = next;

        match ActiveSegment::create(&self.dir, next) {
            Ok(segment) => {
                state.active = Some(segment);
                state.segments.insert(next);
            }
            Err(e) => {
                error!(sequence = next, error = %e, "rotation failed, log is degraded");
                return Err(e);
            }
        }

        cleanup_window(&self.dir, &self.options, state, remove_segment_file)
    }

    /// Removes segments below the retained window.
    ///
    /// Idempotent: with an unchanged active sequence a second pass deletes
    /// nothing. Files already missing are not errors.
    ///
    /// # Errors
    ///
    /// Returns the first deletion error after attempting every candidate.
    pub fn cleanup(&self) -> Result<()> {
        let mut state = self.state.lock();
        cleanup_window(&self.dir, &self.options, &mut state, remove_segment_file)
    }

    /// Flushes and fsyncs the active segment.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        active_mut(&self.dir, &mut state)?.sync()
    }

    /// Syncs and releases the active segment, surfacing any error.
    ///
    /// Dropping the log performs the same sync but can only log failures.
    pub fn close(self) -> Result<()> {
        let active = self.state.lock().active.take();
        match active {
            Some(mut segment) => segment.finish(),
            None => Ok(()),
        }
    }

    /// Returns the sequence number of the active segment.
    pub fn active_sequence(&self) -> u64 {
        self.state.lock().active_sequence
    }

    /// Returns the bytes written to the active segment since it was opened.
    ///
    /// Zero while the log is degraded.
    pub fn active_segment_bytes(&self) -> u64 {
        self.state
            .lock()
            .active
            .as_ref()
            .map_or(0, ActiveSegment::bytes_written)
    }

    /// Returns the lowest sequence number that may still exist on disk.
    pub fn oldest_sequence(&self) -> u64 {
        let state = self.state.lock();
        state
            .segments
            .first()
            .copied()
            .unwrap_or(state.active_sequence)
    }

    /// Returns true once a rotation has failed to create its new segment.
    pub fn is_degraded(&self) -> bool {
        self.state.lock().active.is_none()
    }

    /// Returns the directory holding the segment files.
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Returns the options the log was opened with.
    pub fn options(&self) -> &LogOptions {
        &self.options
    }

    /// Returns the path a segment with `sequence` has, whether or not it exists.
    pub fn segment_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(segment_file_name(sequence))
    }

    /// Lists sequence numbers of the segment files on disk, ascending.
    ///
    /// Files that are not named like segments are ignored.
    pub fn segments(&self) -> Result<Vec<u64>> {
        scan_segments(&self.dir)
    }
}

impl Drop for SegmentedLog {
    fn drop(&mut self) {
        if let Some(segment) = self.state.get_mut().active.as_mut() {
            if let Err(e) = segment.finish() {
                warn!(sequence = segment.sequence(), error = %e, "failed to sync segment on drop");
            }
        }
    }
}

fn active_mut<'a>(dir: &Path, state: &'a mut LogState) -> Result<&'a mut ActiveSegment> {
    let sequence = state.active_sequence;
    state.active.as_mut().ok_or_else(|| {
        Error::io(
            Operation::Open,
            dir.join(segment_file_name(sequence)),
            io::Error::new(
                io::ErrorKind::NotConnected,
                "no active segment after a failed rotation",
            ),
        )
    })
}

fn remove_segment_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Deletes every tracked segment below `active - retained + 1`.
///
/// Only tracked sequences are attempted, so the cost is bounded by the number
/// of stale segments, not by gaps in the numbering.
fn cleanup_window(
    dir: &Path,
    options: &LogOptions,
    state: &mut LogState,
    mut remove: impl FnMut(&Path) -> io::Result<()>,
) -> Result<()> {
    // active_sequence >= 1 and retained >= 1, so the window always holds the
    // active segment.
    let min_retained = state
        .active_sequence
        .saturating_add(1)
        .saturating_sub(options.retained_segment_count);

    let retained = state.segments.split_off(&min_retained);
    let stale = std::mem::replace(&mut state.segments, retained);

    let mut first_error = None;
    for sequence in stale {
        let path = dir.join(segment_file_name(sequence));
        match remove(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(sequence, path = %path.display(), error = %e, "failed to remove segment");
                state.segments.insert(sequence);
                first_error.get_or_insert(Error::io(Operation::Remove, path, e));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn prepare_directory(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => {
            return Err(Error::Config(format!("{} is not a directory", dir.display())));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| Error::io(Operation::CreateDir, dir, e))?;
        }
        Err(e) => return Err(Error::io(Operation::CreateDir, dir, e)),
    }

    let meta = fs::metadata(dir).map_err(|e| Error::io(Operation::CreateDir, dir, e))?;
    if meta.permissions().readonly() {
        return Err(Error::Config(format!("{} is not writable", dir.display())));
    }
    Ok(())
}

/// Scans a directory for segment files and returns their sequences, sorted.
fn scan_segments(dir: &Path) -> Result<Vec<u64>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(Operation::Scan, dir, e))?;

    let mut sequences = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(Operation::Scan, dir, e))?;
        if let Some(sequence) = entry.file_name().to_str().and_then(parse_segment_file_name) {
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                sequences.push(sequence);
            }
        }
    }

    sequences.sort_unstable();
    Ok(sequences)
}
