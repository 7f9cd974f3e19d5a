//! The index file of a segment.
//!
//! A dense array of fixed width entries, one per record in the paired store:
//! - 4 bytes: offset relative to the segment base offset, big-endian
//! - 8 bytes: position of the record in the store, big-endian
//!
//! The file is grown to its capacity and memory-mapped while the index is
//! open; only the first `size` bytes are meaningful. Closing the index
//! truncates the file back to `size`.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::sync::RwLock;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use codeq::error_context_ext::ErrorContextExt;
use log::warn;
use memmap2::MmapMut;

use crate::errors::EndOfData;
use crate::errors::IndexFull;
use crate::errors::LogError;

const OFFSET_WIDTH: u64 = 4;
const POSITION_WIDTH: u64 = 8;

/// Size in bytes of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// Ordinal that addresses the last written entry.
pub const LAST: i64 = -1;

#[derive(Debug)]
pub(crate) struct Index {
    path: String,
    f: File,

    /// Allocated size of the file while it is open.
    capacity: u64,

    inner: RwLock<IndexInner>,
}

#[derive(Debug)]
struct IndexInner {
    /// `None` once the index is closed.
    mmap: Option<MmapMut>,

    /// Bytes used by written entries.
    size: u64,
}

impl Index {
    /// Open or create an index file and map it with `capacity` bytes.
    pub(crate) fn open(
        path: impl ToString,
        capacity: u64,
    ) -> Result<Self, io::Error> {
        let path = path.to_string();
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(|| format!("open index {}", path))?;

        let file_len = f.metadata()?.len();
        let mut size = file_len - file_len % ENTRY_WIDTH;
        if size != file_len {
            warn!(
                "Index {} has a partial entry: file size {}; ignore the last {} bytes",
                path,
                file_len,
                file_len - size
            );
        }

        // Never shrink below the entries already written, even if the
        // configured capacity is smaller now.
        let capacity = if size > capacity {
            warn!(
                "Index {} holds {} bytes, more than capacity {}",
                path, size, capacity
            );
            size
        } else {
            capacity
        };

        f.set_len(capacity)
            .context(|| format!("grow index {} to {}", path, capacity))?;

        let mmap = unsafe { MmapMut::map_mut(&f) }
            .context(|| format!("mmap index {}", path))?;

        let trailing_zero = Self::trailing_zero_entries(&mmap[..size as usize]);
        if trailing_zero > 0 {
            warn!(
                "Trailing zero entries detected in index {}: {}; Treat them as unwritten",
                path, trailing_zero
            );
            size -= trailing_zero * ENTRY_WIDTH;
        }

        Ok(Self {
            path,
            f,
            capacity,
            inner: RwLock::new(IndexInner {
                mmap: Some(mmap),
                size,
            }),
        })
    }

    /// Count the all-zero entries at the end of `data`, not counting entry 0.
    ///
    /// An entry at ordinal `i > 0` always has relative offset `i`, thus an
    /// all-zero entry there is pre-allocated space left by an unclean
    /// shutdown.
    fn trailing_zero_entries(data: &[u8]) -> u64 {
        let w = ENTRY_WIDTH as usize;
        let entries = data.len() / w;

        (1..entries)
            .rev()
            .take_while(|i| data[i * w..(i + 1) * w].iter().all(|b| *b == 0))
            .count() as u64
    }

    /// Returns the path of the index file.
    pub(crate) fn name(&self) -> &str {
        &self.path
    }

    /// Bytes used by written entries.
    pub(crate) fn size(&self) -> u64 {
        self.inner.read().unwrap().size
    }

    /// Number of written entries.
    pub(crate) fn entries(&self) -> u64 {
        self.size() / ENTRY_WIDTH
    }

    /// No room for another entry.
    pub(crate) fn is_full(&self) -> bool {
        self.size() + ENTRY_WIDTH > self.capacity
    }

    /// Write an entry at the end of the index.
    pub(crate) fn write(
        &self,
        relative_offset: u32,
        position: u64,
    ) -> Result<(), LogError> {
        let mut inner = self.inner.write().unwrap();
        let size = inner.size;

        if size + ENTRY_WIDTH > self.capacity {
            return Err(IndexFull::new(&self.path, size, self.capacity).into());
        }

        let mmap = inner.mmap.as_mut().ok_or_else(|| self.closed_error())?;

        let start = size as usize;
        let mid = start + OFFSET_WIDTH as usize;
        let end = start + ENTRY_WIDTH as usize;

        BigEndian::write_u32(&mut mmap[start..mid], relative_offset);
        BigEndian::write_u64(&mut mmap[mid..end], position);

        inner.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Read the entry at `ordinal`, or the last entry if it is [`LAST`].
    ///
    /// Returns `(relative_offset, position)`.
    pub(crate) fn read(&self, ordinal: i64) -> Result<(u32, u64), LogError> {
        let inner = self.inner.read().unwrap();
        let entries = inner.size / ENTRY_WIDTH;

        let i = match ordinal {
            LAST if entries > 0 => entries - 1,
            o if o >= 0 && (o as u64) < entries => o as u64,
            _ => return Err(EndOfData::new(ordinal, entries).into()),
        };

        let mmap = inner.mmap.as_ref().ok_or_else(|| self.closed_error())?;

        let start = (i * ENTRY_WIDTH) as usize;
        let mid = start + OFFSET_WIDTH as usize;
        let end = start + ENTRY_WIDTH as usize;

        let relative_offset = BigEndian::read_u32(&mmap[start..mid]);
        let position = BigEndian::read_u64(&mmap[mid..end]);

        Ok((relative_offset, position))
    }

    /// Drop entries after the first `entries`.
    ///
    /// Used only when opening a segment, to forget entries whose record did
    /// not reach the store. The dropped entries are zeroed so that a later
    /// open does not pick them up again.
    pub(crate) fn truncate_entries(&self, entries: u64) {
        let mut inner = self.inner.write().unwrap();

        let old_size = inner.size;
        let new_size = old_size.min(entries * ENTRY_WIDTH);

        if let Some(mmap) = inner.mmap.as_mut() {
            mmap[new_size as usize..old_size as usize].fill(0);
        }
        inner.size = new_size;
    }

    /// Flush the mapping to disk without closing.
    pub(crate) fn sync(&self) -> Result<(), io::Error> {
        let inner = self.inner.read().unwrap();
        if let Some(mmap) = inner.mmap.as_ref() {
            mmap.flush()
                .context(|| format!("flush index {}", self.path))?;
        }
        Ok(())
    }

    /// Flush the mapping, unmap it and truncate the file to the used size.
    pub(crate) fn close(&self) -> Result<(), io::Error> {
        let mut inner = self.inner.write().unwrap();

        let Some(mmap) = inner.mmap.take() else {
            return Ok(());
        };

        mmap.flush().context(|| format!("flush index {}", self.path))?;
        drop(mmap);

        self.f.set_len(inner.size).context(|| {
            format!("truncate index {} to {}", self.path, inner.size)
        })?;
        self.f.sync_all()?;

        Ok(())
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::Other,
            format!("index {} is closed", self.path),
        )
    }
}
