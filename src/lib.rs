//! Commit log:
//! A durable, append-only, segmented log of opaque records, the storage
//! primitive of a small distributed log service.
//!
//! ## Features
//!
//! - Records are addressed by a monotonically increasing offset assigned on
//!   append
//! - The log is split into segments, each a store file of length-prefixed
//!   records and a memory-mapped index file from offset to store position
//! - A new segment is started when the active one reaches the configured store
//!   or index size
//! - Old segments are dropped with [`CommitLog::truncate`]
//! - [`CommitLog::reader`] streams the raw bytes of the whole log, for copying
//!   it to a peer
//! - The segment list is rebuilt from the directory on open, records left
//!   incomplete by a crash are dropped
//!
//! ## On-disk layout
//!
//! Per segment, two files named by the decimal base offset of the segment:
//! - `<base>.store`: `(length: u64 BE, record)` entries, where a record is
//!   `(offset: u64 BE, value)`
//! - `<base>.index`: `(relative offset: u32 BE, store position: u64 BE)`
//!   entries
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use commit_log::{CommitLog, Config, Record, RecordIterator};
//!
//! let temp_dir = tempfile::tempdir().unwrap();
//! let config = Arc::new(Config {
//!     dir: temp_dir.path().to_str().unwrap().to_string(),
//!     max_store_bytes: Some(64),
//!     ..Default::default()
//! });
//!
//! let log = CommitLog::open(config).unwrap();
//!
//! let first = log.append(Record::new("first entry")).unwrap();
//! let second = log.append(Record::new("second entry")).unwrap();
//! assert_eq!((0, 1), (first, second));
//!
//! assert_eq!(b"second entry".to_vec(), log.read(1).unwrap().value);
//!
//! // Reading past the end is reported as a distinct error.
//! let err = log.read(2).unwrap_err();
//! assert_eq!(2, err.offset_out_of_range().unwrap().offset);
//!
//! // Stream every record, e.g. to replicate the log.
//! let records = RecordIterator::new(log.reader())
//!     .map(|res| res.map(|(_range, rec)| rec.value))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! assert_eq!(2, records.len());
//!
//! log.close().unwrap();
//! ```

mod config;
mod record;
mod segment;

pub(crate) mod commit_log;
pub(crate) mod file_lock;
pub(crate) mod num;
pub(crate) mod offset_reader;
pub(crate) mod testing;

pub mod dump_writer;
pub mod errors;

pub use codeq;
pub use config::Config;
pub use errors::LogError;
pub use errors::OffsetOutOfRange;
pub use record::Record;
pub use segment::index::ENTRY_WIDTH;
pub use segment::record_iterator::RecordIterator;
pub use segment::segment_id::SegmentId;
pub use segment::store::LEN_WIDTH;

pub use self::commit_log::commit_log::CommitLog;
pub use self::commit_log::dump::Dump;
pub use self::commit_log::log_reader::LogReader;
pub use self::commit_log::stat::SegmentStat;
pub use self::commit_log::stat::Stat;

#[cfg(test)]
mod tests;
