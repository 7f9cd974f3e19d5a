use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use crate::segment::store::Store;

/// A one-pass reader over the raw bytes of every store of a log, in segment
/// order.
///
/// The bytes are the store frames as they are on disk, length prefixes
/// included; decode them with [`RecordIterator`](crate::RecordIterator). The
/// set of segments is fixed when the reader is created, while the last store
/// is read up to its end at the time it is reached.
pub struct LogReader {
    stores: VecDeque<Arc<Store>>,

    /// Position in the front store.
    position: u64,
}

impl LogReader {
    pub(crate) fn new(stores: impl IntoIterator<Item = Arc<Store>>) -> Self {
        Self {
            stores: stores.into_iter().collect(),
            position: 0,
        }
    }
}

impl io::Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(store) = self.stores.front() {
            let n = store.read_at(buf, self.position)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }

            self.stores.pop_front();
            self.position = 0;
        }

        Ok(0)
    }
}
