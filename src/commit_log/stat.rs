use std::fmt;
use std::fmt::Formatter;

use crate::num::format_pad9_u64;
use crate::SegmentId;

/// Statistics about a commit log: one entry per segment, oldest first. The
/// last one is the active segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub segments: Vec<SegmentStat>,
}

impl Stat {
    /// Total number of records in all segments.
    pub fn records_count(&self) -> u64 {
        self.segments.iter().map(|s| s.records_count).sum()
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lb = if f.alternate() { "\n" } else { "" };
        let idt = if f.alternate() { "  " } else { "" };
        write!(
            f,
            "Stat{{{lb}{idt}segments: [{lb}{idt}{idt}{}{lb}{idt}]{lb}}}",
            self.segments
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<String>>()
                .join(&format!(",{lb}{idt}{idt}")),
        )
    }
}

/// Statistics about a single segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStat {
    pub segment_id: SegmentId,
    /// Number of records stored in this segment
    pub records_count: u64,
    /// Offset of the first record in this segment
    pub base_offset: u64,
    /// Offset of the last record in this segment plus one
    pub next_offset: u64,
    /// Size of the store in bytes, buffered data included
    pub store_size: u64,
    /// Bytes used in the index
    pub index_size: u64,
}

impl fmt::Display for SegmentStat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentStat({}){{records: {}, [{}, {}), store: {}, index: {}}}",
            self.segment_id,
            self.records_count,
            format_pad9_u64(self.base_offset),
            format_pad9_u64(self.next_offset),
            format_pad9_u64(self.store_size),
            format_pad9_u64(self.index_size),
        )
    }
}
