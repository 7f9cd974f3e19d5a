use std::fmt;
use std::ops::Deref;

use crate::num::format_pad_u64;

/// SegmentId is the base offset of a segment: the offset of its first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentId({})", format_pad_u64(self.0))
    }
}

impl From<u64> for SegmentId {
    fn from(base_offset: u64) -> Self {
        SegmentId(base_offset)
    }
}

impl Deref for SegmentId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl SegmentId {
    /// Return the offset this segment starts at.
    pub fn base_offset(&self) -> u64 {
        self.0
    }
}
