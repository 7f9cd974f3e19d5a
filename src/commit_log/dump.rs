use std::fs::File;
use std::io;
use std::io::BufReader;
use std::ops::Range;
use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;

use crate::dump_writer;
use crate::CommitLog;
use crate::Config;
use crate::Record;
use crate::RecordIterator;
use crate::SegmentId;

/// Human-readable listing of the records in a log directory.
///
/// Only reads the store files: it does not lock the directory and does not
/// touch the index files, so it can inspect a directory in use by a log.
pub struct Dump {
    config: Arc<Config>,
}

impl Dump {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn write_to_string(&self) -> Result<String, io::Error> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    pub fn write<W: io::Write>(&self, mut w: W) -> Result<(), io::Error> {
        writeln!(&mut w, "CommitLog:")?;
        self.write_with(w, dump_writer::multiline_string)
    }

    /// Feed every record of every segment to `write_record`, with the
    /// segment id and the index of the record in its segment.
    pub fn write_with<W: io::Write, D>(
        &self,
        mut w: W,
        write_record: D,
    ) -> Result<(), io::Error>
    where
        D: Fn(
            &mut W,
            SegmentId,
            u64,
            Result<(Range<u64>, Record), io::Error>,
        ) -> Result<(), io::Error>,
    {
        let config = self.config.as_ref();
        let segment_ids = CommitLog::segment_ids(config)?;

        for segment_id in segment_ids {
            let path = config.store_path(segment_id);
            let f = match File::open(&path) {
                Ok(f) => f,
                // A segment that has only its index file so far
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).context(|| format!("open {}", path)),
            };

            let it = RecordIterator::new(BufReader::new(f));
            for (i, res) in it.enumerate() {
                write_record(&mut w, segment_id, i as u64, res)?;
            }
        }
        Ok(())
    }
}
