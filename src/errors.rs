mod storage_errors;

use std::io;

pub use storage_errors::InvalidSegmentFileName;

use crate::SegmentId;

/// Errors returned by the record-level operations of the log: append and
/// read.
///
/// Callers branch on the variant: [`LogError::OffsetOutOfRange`] is the
/// "no such record" answer, everything else is a storage fault.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum LogError {
    #[error(transparent)]
    OffsetOutOfRange(#[from] OffsetOutOfRange),

    #[error(transparent)]
    SegmentFull(#[from] SegmentFull),

    #[error(transparent)]
    IndexFull(#[from] IndexFull),

    #[error(transparent)]
    EndOfData(#[from] EndOfData),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LogError {
    /// Returns the out-of-range error if this is one.
    pub fn offset_out_of_range(&self) -> Option<&OffsetOutOfRange> {
        match self {
            LogError::OffsetOutOfRange(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LogError> for io::Error {
    fn from(value: LogError) -> Self {
        match value {
            LogError::Io(e) => e,
            LogError::OffsetOutOfRange(e) => {
                io::Error::new(io::ErrorKind::NotFound, e)
            }
            LogError::EndOfData(e) => {
                io::Error::new(io::ErrorKind::UnexpectedEof, e)
            }
            LogError::SegmentFull(e) => io::Error::new(io::ErrorKind::Other, e),
            LogError::IndexFull(e) => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

/// No segment of the log covers the requested offset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Offset out of range: {offset}")]
pub struct OffsetOutOfRange {
    pub offset: u64,
}

impl OffsetOutOfRange {
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }
}

/// The active segment can not accept another record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Segment is full: {segment_id}, next offset: {next_offset}")]
pub struct SegmentFull {
    pub segment_id: SegmentId,
    pub next_offset: u64,
}

impl SegmentFull {
    pub fn new(segment_id: SegmentId, next_offset: u64) -> Self {
        Self {
            segment_id,
            next_offset,
        }
    }
}

/// The index file has no room for another entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Index is full: {path}: used {size} bytes of {capacity}")]
pub struct IndexFull {
    pub path: String,
    pub size: u64,
    pub capacity: u64,
}

impl IndexFull {
    pub fn new(path: impl ToString, size: u64, capacity: u64) -> Self {
        Self {
            path: path.to_string(),
            size,
            capacity,
        }
    }
}

/// There is no index entry at the requested ordinal, yet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("No index entry at {ordinal}, entries: {entries}")]
pub struct EndOfData {
    pub ordinal: i64,
    pub entries: u64,
}

impl EndOfData {
    pub fn new(ordinal: i64, entries: u64) -> Self {
        Self { ordinal, entries }
    }
}
