//! A segment binds one store file and one index file to a contiguous range of
//! the log's offsets: `[base_offset, next_offset)`.
//!
//! Absolute offsets are translated to offsets relative to the base before
//! they reach the index, so that an index entry needs only 4 bytes for the
//! offset.

pub(crate) mod index;
pub(crate) mod record_iterator;
pub(crate) mod segment_id;
pub(crate) mod store;

use std::io;
use std::sync::Arc;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;
use codeq::Encode;
use log::info;
use log::warn;

use crate::errors::LogError;
use crate::errors::OffsetOutOfRange;
use crate::errors::SegmentFull;
use crate::segment::index::Index;
use crate::segment::index::LAST;
use crate::segment::segment_id::SegmentId;
use crate::segment::store::Store;
use crate::segment::store::LEN_WIDTH;
use crate::Config;
use crate::Record;

#[derive(Debug)]
pub(crate) struct Segment {
    config: Arc<Config>,

    base_offset: u64,

    /// The offset to assign to the next appended record.
    next_offset: u64,

    /// Shared with the readers streaming the raw log.
    pub(crate) store: Arc<Store>,

    index: Index,
}

impl Segment {
    /// Open the segment starting at `segment_id`, creating its files if they
    /// do not exist.
    pub(crate) fn open(
        config: Arc<Config>,
        segment_id: SegmentId,
    ) -> Result<Self, io::Error> {
        let store = Store::open(
            config.store_path(segment_id),
            config.write_buffer_size(),
        )?;
        let index =
            Index::open(config.index_path(segment_id), config.max_index_bytes())?;

        Self::recover(&config, segment_id, &store, &index)?;

        let next_offset = match index.read(LAST) {
            Ok((relative_offset, _position)) => {
                segment_id.base_offset() + relative_offset as u64 + 1
            }
            Err(LogError::EndOfData(_)) => segment_id.base_offset(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            config,
            base_offset: segment_id.base_offset(),
            next_offset,
            store: Arc::new(store),
            index,
        })
    }

    /// Make the store and the index agree after an unclean shutdown.
    ///
    /// Drops index entries whose record is not completely in the store, then
    /// drops store bytes that follow the last indexed record.
    fn recover(
        config: &Config,
        segment_id: SegmentId,
        store: &Store,
        index: &Index,
    ) -> Result<(), io::Error> {
        let store_size = store.size();

        // A pre-allocated index of a segment that never got a record: entry 0
        // is all zeros over an empty store. Not a torn record.
        if store_size == 0 && index.entries() == 1 && index.read(0)? == (0, 0) {
            index.truncate_entries(0);
        }

        let mut entries = index.entries();
        let mut end = 0;

        while entries > 0 {
            let (relative_offset, position) =
                index.read(entries as i64 - 1).map_err(io::Error::from)?;

            let record_end = Self::record_end(store, position, store_size)?;

            match record_end {
                Some(e) if relative_offset as u64 == entries - 1 => {
                    end = e;
                    break;
                }
                _ => entries -= 1,
            }
        }

        let dropped_entries = index.entries() - entries;
        let dropped_bytes = store_size - end;

        if dropped_entries == 0 && dropped_bytes == 0 {
            return Ok(());
        }

        if !config.truncate_incomplete_record() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "incomplete records in {}: {} index entries, {} store bytes; \
                    Can not open, fix this error and re-open",
                    segment_id, dropped_entries, dropped_bytes
                ),
            ));
        }

        warn!(
            "Incomplete records in {}: drop {} index entries, {} store bytes after {}",
            segment_id, dropped_entries, dropped_bytes, end
        );

        index.truncate_entries(entries);
        store.truncate(end)?;

        Ok(())
    }

    /// Returns the end position of the record at `position` if it is complete
    /// within `store_size` bytes.
    fn record_end(
        store: &Store,
        position: u64,
        store_size: u64,
    ) -> Result<Option<u64>, io::Error> {
        if position + LEN_WIDTH > store_size {
            return Ok(None);
        }

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        store.read_at(&mut len_buf, position)?;
        let len = BigEndian::read_u64(&len_buf);

        let end = position
            .checked_add(LEN_WIDTH)
            .and_then(|x| x.checked_add(len))
            .filter(|e| *e <= store_size);

        Ok(end)
    }

    /// Create an empty segment starting at `segment_id`.
    pub(crate) fn create(
        config: Arc<Config>,
        segment_id: SegmentId,
    ) -> Result<Self, io::Error> {
        info!("Create segment: {}", segment_id);
        Self::open(config, segment_id)
    }

    pub(crate) fn segment_id(&self) -> SegmentId {
        SegmentId(self.base_offset)
    }

    pub(crate) fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub(crate) fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub(crate) fn records_count(&self) -> u64 {
        self.next_offset - self.base_offset
    }

    /// Whether `offset` is stored in this segment.
    pub(crate) fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    pub(crate) fn store_size(&self) -> u64 {
        self.store.size()
    }

    pub(crate) fn index_size(&self) -> u64 {
        self.index.size()
    }

    /// Assign the next offset to `record` and append it.
    ///
    /// Returns the assigned offset, or [`SegmentFull`] if the index has no
    /// room for it; in that case nothing is written.
    pub(crate) fn append(&mut self, record: &mut Record) -> Result<u64, LogError> {
        let offset = self.next_offset;
        let relative_offset = offset - self.base_offset;

        if self.index.is_full() || relative_offset > u32::MAX as u64 {
            return Err(SegmentFull::new(self.segment_id(), offset).into());
        }

        record.offset = offset;

        let mut buf = Vec::with_capacity(record.encoded_size());
        record.encode(&mut buf)?;

        let (_n, position) = self.store.append(&buf)?;

        self.index.write(relative_offset as u32, position).map_err(|e| {
            match e {
                LogError::IndexFull(_) => {
                    SegmentFull::new(self.segment_id(), offset).into()
                }
                e => e,
            }
        })?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Read the record at absolute `offset`.
    pub(crate) fn read(&self, offset: u64) -> Result<Record, LogError> {
        let relative_offset = offset
            .checked_sub(self.base_offset)
            .ok_or_else(|| OffsetOutOfRange::new(offset))?;

        let ordinal = i64::try_from(relative_offset)
            .map_err(|_| OffsetOutOfRange::new(offset))?;

        let (_, position) =
            self.index.read(ordinal).map_err(|e| match e {
                LogError::EndOfData(_) => OffsetOutOfRange::new(offset).into(),
                e => e,
            })?;

        let payload = self.store.read(position).context(|| {
            format!("read offset {} in {}", offset, self.segment_id())
        })?;

        let record = Record::decode(payload.as_slice())?;
        debug_assert_eq!(offset, record.offset);

        Ok(record)
    }

    /// The store or the index reached the configured limit: the log should
    /// roll over to a new segment.
    pub(crate) fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes()
            || self.index.is_full()
    }

    /// Flush and fsync both files, keeping the segment open.
    pub(crate) fn sync(&self) -> Result<(), io::Error> {
        self.store.sync()?;
        self.index.sync()
    }

    /// Close the store then the index.
    ///
    /// The index file is truncated to the written entries. Closing twice is
    /// harmless.
    pub(crate) fn close(&self) -> Result<(), io::Error> {
        self.store.close()?;
        self.index.close()?;
        Ok(())
    }

    /// Close the segment and delete its files.
    pub(crate) fn remove(&self) -> Result<(), io::Error> {
        self.close()?;

        std::fs::remove_file(self.index.name())
            .context(|| format!("remove {}", self.index.name()))?;
        std::fs::remove_file(self.store.path())
            .context(|| format!("remove {}", self.store.path()))?;

        Ok(())
    }
}
