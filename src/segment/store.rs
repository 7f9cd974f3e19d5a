//! The store file of a segment: an append-only sequence of length-prefixed
//! records.
//!
//! Each entry is an 8-byte big-endian length followed by that many bytes. The
//! position of an entry is the file offset of its length prefix.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::sync::Mutex;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::WriteBytesExt;
use codeq::error_context_ext::ErrorContextExt;

/// Size of the length prefix of every store entry.
pub const LEN_WIDTH: u64 = 8;

#[derive(Debug)]
pub(crate) struct Store {
    path: String,

    /// Opened in append mode: writes always land at the end, positional
    /// reads do not depend on the cursor.
    f: File,

    /// Flush the pending data once it grows over this size.
    buffer_size: usize,

    w: Mutex<StoreWriter>,
}

#[derive(Debug)]
struct StoreWriter {
    /// Appended but not yet written to the file.
    pending_data: Vec<u8>,

    /// Number of bytes already in the file.
    flushed: u64,

    closed: bool,
}

impl StoreWriter {
    fn size(&self) -> u64 {
        self.flushed + self.pending_data.len() as u64
    }

    fn flush_to(&mut self, mut f: &File) -> Result<(), io::Error> {
        if self.pending_data.is_empty() {
            return Ok(());
        }

        f.write_all(&self.pending_data)?;
        self.flushed += self.pending_data.len() as u64;
        self.pending_data.clear();
        Ok(())
    }
}

impl Store {
    pub(crate) fn open(
        path: impl ToString,
        buffer_size: usize,
    ) -> Result<Self, io::Error> {
        let path = path.to_string();
        let f = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .context(|| format!("open store {}", path))?;

        let flushed = f.metadata()?.len();

        Ok(Self {
            path,
            f,
            buffer_size,
            w: Mutex::new(StoreWriter {
                pending_data: Vec::with_capacity(buffer_size),
                flushed,
                closed: false,
            }),
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Size of the store including the data not yet written to the file.
    pub(crate) fn size(&self) -> u64 {
        self.w.lock().unwrap().size()
    }

    /// Append one length-prefixed entry.
    ///
    /// Returns the number of bytes appended, prefix included, and the position
    /// the entry starts at.
    pub(crate) fn append(&self, payload: &[u8]) -> Result<(u64, u64), io::Error> {
        let mut w = self.w.lock().unwrap();

        if w.closed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("append to closed store {}", self.path),
            ));
        }

        let position = w.size();

        w.pending_data.write_u64::<BigEndian>(payload.len() as u64)?;
        w.pending_data.extend_from_slice(payload);

        if w.pending_data.len() >= self.buffer_size {
            w.flush_to(&self.f)
                .context(|| format!("flush store {}", self.path))?;
        }

        Ok((LEN_WIDTH + payload.len() as u64, position))
    }

    /// Read the payload of the entry starting at `position`.
    pub(crate) fn read(&self, position: u64) -> Result<Vec<u8>, io::Error> {
        let size = self.flush()?;

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        self.read_exact_at(&mut len_buf, position, size)
            .context(|| format!("read length at {} in {}", position, self.path))?;

        let len = BigEndian::read_u64(&len_buf);
        if len > size - position - LEN_WIDTH {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "entry at {} of {} bytes exceeds store {} of size {}",
                    position, len, self.path, size
                ),
            ));
        }

        let mut payload = vec![0u8; len as usize];
        self.read_exact_at(&mut payload, position + LEN_WIDTH, size)
            .context(|| {
                format!("read {} bytes at {} in {}", len, position, self.path)
            })?;

        Ok(payload)
    }

    /// Read raw bytes at `offset` into `buf`.
    ///
    /// Returns fewer bytes than `buf.len()` only when the end of the store is
    /// reached.
    pub(crate) fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize, io::Error> {
        self.flush()?;

        let mut n = 0;
        while n < buf.len() {
            let got = pread(&self.f, &mut buf[n..], offset + n as u64)?;
            if got == 0 {
                break;
            }
            n += got;
        }
        Ok(n)
    }

    /// Write the pending data to the file and return the store size.
    pub(crate) fn flush(&self) -> Result<u64, io::Error> {
        let mut w = self.w.lock().unwrap();
        w.flush_to(&self.f)
            .context(|| format!("flush store {}", self.path))?;
        Ok(w.size())
    }

    /// Flush and fsync the store.
    pub(crate) fn sync(&self) -> Result<(), io::Error> {
        self.flush()?;
        self.f.sync_data()
    }

    /// Discard everything after `len`.
    ///
    /// Used only when opening a segment, to drop a record a crash left
    /// incomplete.
    pub(crate) fn truncate(&self, len: u64) -> Result<(), io::Error> {
        let mut w = self.w.lock().unwrap();
        w.flush_to(&self.f)?;

        self.f
            .set_len(len)
            .context(|| format!("truncate store {} to {}", self.path, len))?;
        self.f.sync_all()?;

        w.flushed = len;
        Ok(())
    }

    /// Flush buffered data and sync the file. Further appends are refused,
    /// reads are still served.
    pub(crate) fn close(&self) -> Result<(), io::Error> {
        let mut w = self.w.lock().unwrap();
        if w.closed {
            return Ok(());
        }

        w.flush_to(&self.f)
            .context(|| format!("flush store {} on close", self.path))?;
        self.f.sync_all()?;
        w.closed = true;
        Ok(())
    }

    fn read_exact_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        size: u64,
    ) -> Result<(), io::Error> {
        if offset + buf.len() as u64 > size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read [{}, {}) beyond store size {}",
                    offset,
                    offset + buf.len() as u64,
                    size
                ),
            ));
        }

        let n = self.read_at(buf, offset)?;
        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read at {}: {} of {}", offset, n, buf.len()),
            ));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn pread(f: &File, buf: &mut [u8], offset: u64) -> Result<usize, io::Error> {
    std::os::unix::fs::FileExt::read_at(f, buf, offset)
}

#[cfg(windows)]
fn pread(f: &File, buf: &mut [u8], offset: u64) -> Result<usize, io::Error> {
    std::os::windows::fs::FileExt::seek_read(f, buf, offset)
}
