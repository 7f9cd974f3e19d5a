use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::RwLock;

use codeq::error_context_ext::ErrorContextExt;
use log::error;
use log::info;
use log::warn;

use crate::commit_log::log_reader::LogReader;
use crate::commit_log::stat::SegmentStat;
use crate::commit_log::stat::Stat;
use crate::errors::LogError;
use crate::errors::OffsetOutOfRange;
use crate::file_lock::FileLock;
use crate::num::format_pad_u64;
use crate::segment::Segment;
use crate::Config;
use crate::Record;
use crate::SegmentId;

/// CommitLog is a durable, append-only log of opaque records addressed by a
/// monotonically increasing offset.
///
/// Records are stored in a list of segments, each covering a contiguous range
/// of offsets; the last segment is the active one and receives all appends.
/// When it reaches the configured store or index size, a new segment starting
/// at the next offset takes its place.
///
/// All methods take `&self`; a `CommitLog` can be shared between threads with
/// an `Arc`. Appends, truncation and close are serialized, reads run
/// concurrently.
#[derive(Debug)]
pub struct CommitLog {
    pub(crate) config: Arc<Config>,

    /// Held until the log is dropped.
    _dir_lock: FileLock,

    /// Ordered by base offset; never empty.
    segments: RwLock<Vec<Segment>>,

    /// Set by `close()`, under the write lock of `segments`.
    closed: AtomicBool,
}

impl CommitLog {
    /// Opens a CommitLog in the configured directory.
    ///
    /// This operation:
    /// 1. Creates the directory if needed and locks it
    /// 2. Opens the existing segments in offset order
    /// 3. Creates the first segment at the initial offset if there is none
    ///
    /// # Errors
    /// Returns an error if:
    /// - The config is invalid
    /// - The directory is locked by another log
    /// - There are gaps between segment offsets
    /// - A segment has incomplete records and truncating them is disabled
    pub fn open(config: Arc<Config>) -> Result<Self, io::Error> {
        config.validate()?;

        std::fs::create_dir_all(&config.dir)
            .context(|| format!("create dir '{}'", config.dir))?;

        let dir_lock = FileLock::new(&config.dir)
            .context(|| format!("open CommitLog in '{}'", config.dir))?;

        let segment_ids = Self::segment_ids(&config)?;

        let mut segments: Vec<Segment> = Vec::with_capacity(segment_ids.len());

        for segment_id in segment_ids {
            let prev_next_offset = segments.last().map(|s| s.next_offset());
            Self::ensure_consecutive_segments(prev_next_offset, segment_id)?;

            let segment = Segment::open(config.clone(), segment_id)?;
            segments.push(segment);
        }

        if segments.is_empty() {
            let segment_id = SegmentId(config.initial_offset());
            segments.push(Segment::create(config.clone(), segment_id)?);
        }

        info!(
            "CommitLog opened in '{}': {} segments, offsets [{}, {})",
            config.dir,
            segments.len(),
            segments[0].base_offset(),
            segments[segments.len() - 1].next_offset()
        );

        Ok(Self {
            config,
            _dir_lock: dir_lock,
            segments: RwLock::new(segments),
            closed: AtomicBool::new(false),
        })
    }

    /// Verifies that a segment starts where the previous one ends.
    ///
    /// A gap would indicate data loss, an overlap a duplicated segment.
    fn ensure_consecutive_segments(
        prev_next_offset: Option<u64>,
        segment_id: SegmentId,
    ) -> Result<(), io::Error> {
        let Some(prev_next) = prev_next_offset else {
            return Ok(());
        };

        if prev_next != segment_id.base_offset() {
            let message = format!(
                "Gap between segments: {} -> {}; Can not open, \
                        fix this error and re-open",
                format_pad_u64(prev_next),
                format_pad_u64(segment_id.base_offset()),
            );
            return Err(io::Error::new(io::ErrorKind::InvalidData, message));
        }

        Ok(())
    }

    /// Scan the log directory for segment files and return their ids in
    /// ascending order.
    pub fn segment_ids(config: &Config) -> Result<Vec<SegmentId>, io::Error> {
        let entries = std::fs::read_dir(&config.dir)
            .context(|| format!("read dir '{}'", config.dir))?;

        let mut file_names = vec![];
        for entry in entries {
            let entry = entry?;
            file_names.push(entry.file_name().to_string_lossy().to_string());
        }

        Ok(Self::segment_ids_from_file_names(file_names))
    }

    /// Parse segment ids out of file names, sorted and deduplicated: a store
    /// and an index file share one id.
    ///
    /// Names that are not segment files are ignored.
    pub fn segment_ids_from_file_names<I, S>(file_names: I) -> Vec<SegmentId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segment_ids = vec![];

        for file_name in file_names {
            let file_name = file_name.as_ref();
            if file_name == FileLock::LOCK_FILE_NAME {
                continue;
            }

            match Config::parse_segment_file_name(file_name) {
                Ok(base_offset) => segment_ids.push(SegmentId(base_offset)),
                Err(err) => {
                    warn!("Ignore invalid segment file name: {}", err);
                }
            }
        }

        segment_ids.sort();
        segment_ids.dedup();
        segment_ids
    }

    /// Get a reference to the CommitLog configuration.
    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    /// Append a record and return the offset assigned to it.
    ///
    /// The offset in `record` is ignored. When the active segment is full a
    /// new one is created; this is invisible to the caller.
    pub fn append(&self, mut record: Record) -> Result<u64, LogError> {
        let mut segments = self.segments.write().unwrap();
        self.ensure_open("append")?;

        if Self::active(&segments).is_maxed() {
            self.roll(&mut segments)?;
        }

        let res = Self::active_mut(&mut segments).append(&mut record);

        let offset = match res {
            Ok(offset) => offset,
            Err(LogError::SegmentFull(full)) => {
                info!("{}; roll over and retry", full);
                self.roll(&mut segments)?;
                Self::active_mut(&mut segments).append(&mut record)?
            }
            Err(e) => return Err(e),
        };

        if Self::active(&segments).is_maxed() {
            // The record is stored: a failure to roll over here is left to
            // the next append.
            if let Err(e) = self.roll(&mut segments) {
                warn!("Failed to roll over after appending {}: {}", offset, e);
            }
        }

        Ok(offset)
    }

    /// Read the record at `offset`.
    ///
    /// Returns [`LogError::OffsetOutOfRange`] if no segment holds it: it was
    /// truncated or not appended yet.
    pub fn read(&self, offset: u64) -> Result<Record, LogError> {
        let segments = self.segments.read().unwrap();

        let i = segments.partition_point(|s| s.next_offset() <= offset);

        match segments.get(i) {
            Some(segment) if segment.contains(offset) => segment.read(offset),
            _ => Err(OffsetOutOfRange::new(offset).into()),
        }
    }

    /// The offset of the first record of the oldest segment.
    pub fn lowest_offset(&self) -> u64 {
        let segments = self.segments.read().unwrap();
        segments[0].base_offset()
    }

    /// The offset of the last appended record.
    ///
    /// If the log has no record, it is the initial offset minus one, or 0.
    pub fn highest_offset(&self) -> u64 {
        let segments = self.segments.read().unwrap();
        Self::active(&segments).next_offset().saturating_sub(1)
    }

    /// Remove every segment whose records are all at or below `lowest`.
    ///
    /// Records above `lowest` stay readable at their offsets. A segment is
    /// removed as a whole: records at or below `lowest` in a segment that also
    /// holds newer records are kept.
    ///
    /// If the active segment is removed, an empty segment starting at its
    /// next offset replaces it.
    ///
    /// Removal stops at the first failure, which is returned; segments removed
    /// before it stay removed.
    pub fn truncate(&self, lowest: u64) -> Result<(), io::Error> {
        let mut segments = self.segments.write().unwrap();
        self.ensure_open("truncate")?;

        let upto = lowest.saturating_add(1);
        let last = segments.len() - 1;

        let mut removed = 0;
        let mut res = Ok(());

        for (i, segment) in segments.iter().enumerate() {
            if segment.next_offset() > upto {
                break;
            }

            if i == last && segment.records_count() == 0 {
                break;
            }

            if let Err(e) = segment.remove() {
                error!("Failed to remove {}: {}", segment.segment_id(), e);
                res = Err(e);
                break;
            }

            info!(
                "CommitLog truncate upto {}: removed {}",
                lowest,
                segment.segment_id()
            );
            removed += 1;
        }

        let mut drained = removed;

        if removed == segments.len() {
            let next = SegmentId(segments[last].next_offset());
            match Segment::create(self.config.clone(), next) {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    // Keep the removed active segment as a placeholder: the
                    // log is never empty. Appends fail until it is reopened.
                    error!("Failed to create {} after truncate: {}", next, e);
                    drained -= 1;
                    if res.is_ok() {
                        res = Err(e);
                    }
                }
            }
        }

        segments.drain(..drained);

        res
    }

    /// Returns a reader over the raw bytes of every segment store, oldest
    /// first.
    ///
    /// The stream is the concatenation of the store files: length-prefixed
    /// encoded records. It is meant for copying a whole log to a peer; decode
    /// it with [`RecordIterator`](crate::RecordIterator).
    pub fn reader(&self) -> LogReader {
        let segments = self.segments.read().unwrap();
        LogReader::new(segments.iter().map(|s| s.store.clone()))
    }

    /// Write buffered records of the active segment to disk and fsync them.
    pub fn flush(&self) -> Result<(), io::Error> {
        let segments = self.segments.read().unwrap();
        Self::active(&segments).sync()
    }

    /// Close every segment: flush buffered records and truncate index files
    /// to their used size.
    ///
    /// All segments are closed even if some fail; the first error is
    /// returned. Appends and truncation fail after close. Closing again is
    /// harmless.
    pub fn close(&self) -> Result<(), io::Error> {
        let segments = self.segments.write().unwrap();
        self.closed.store(true, Ordering::Relaxed);

        let mut res = Ok(());
        for segment in segments.iter() {
            if let Err(e) = segment.close() {
                error!("Failed to close {}: {}", segment.segment_id(), e);
                if res.is_ok() {
                    res = Err(e);
                }
            }
        }

        info!("CommitLog closed: '{}'", self.config.dir);
        res
    }

    /// Close the log and delete its directory.
    pub fn remove(self) -> Result<(), io::Error> {
        self.close()?;
        std::fs::remove_dir_all(&self.config.dir)
            .context(|| format!("remove dir '{}'", self.config.dir))
    }

    /// Get a statistics of every segment.
    pub fn stat(&self) -> Stat {
        let segments = self.segments.read().unwrap();

        let segments = segments
            .iter()
            .map(|s| SegmentStat {
                segment_id: s.segment_id(),
                records_count: s.records_count(),
                base_offset: s.base_offset(),
                next_offset: s.next_offset(),
                store_size: s.store_size(),
                index_size: s.index_size(),
            })
            .collect();

        Stat { segments }
    }

    fn ensure_open(&self, action: &str) -> Result<(), io::Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} on closed CommitLog: '{}'", action, self.config.dir),
            ));
        }
        Ok(())
    }

    fn active(segments: &[Segment]) -> &Segment {
        &segments[segments.len() - 1]
    }

    fn active_mut(segments: &mut [Segment]) -> &mut Segment {
        let last = segments.len() - 1;
        &mut segments[last]
    }

    /// Sync the active segment and create a new one starting at its next
    /// offset.
    fn roll(&self, segments: &mut Vec<Segment>) -> Result<(), io::Error> {
        let active = Self::active(segments);
        let next = SegmentId(active.next_offset());

        info!(
            "Closing full segment: {}, open new: {}",
            active.segment_id(),
            next
        );

        active.sync()?;

        let segment = Segment::create(self.config.clone(), next)?;
        segments.push(segment);
        Ok(())
    }
}

impl Drop for CommitLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close CommitLog on drop: {}", e);
        }
    }
}
