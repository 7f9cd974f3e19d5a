use std::io;
use std::ops::Range;

use crate::num::format_pad9_u64;
use crate::Record;
use crate::SegmentId;

/// Write one record of a segment as a line, preceded by the segment header
/// line if it is the first record.
pub fn multiline_string<W: io::Write>(
    w: &mut W,
    segment_id: SegmentId,
    record_index: u64,
    res: Result<(Range<u64>, Record), io::Error>,
) -> Result<(), io::Error> {
    if record_index == 0 {
        writeln!(w, "{}", segment_id)?;
    }

    match res {
        Ok((range, rec)) => {
            writeln!(
                w,
                "  R-{record_index:05}: [{}, {}) {}: {}",
                format_pad9_u64(range.start),
                format_pad9_u64(range.end),
                range.end - range.start,
                rec
            )?;
        }
        Err(io_err) => {
            writeln!(w, "  Error: {}", io_err)?;
        }
    }
    Ok(())
}
