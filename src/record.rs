use std::fmt;
use std::io;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

/// A record in the commit log: an opaque payload and the offset the log
/// assigned to it.
///
/// The offset is filled in by [`CommitLog::append`](crate::CommitLog::append);
/// whatever a caller puts there before appending is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub offset: u64,
    pub value: Vec<u8>,
}

impl Record {
    /// Create a record that has not been assigned an offset yet.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            offset: 0,
            value: value.into(),
        }
    }

    /// Size of the encoded record, without the store's length prefix.
    pub fn encoded_size(&self) -> usize {
        8 + self.value.len()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record(offset: {}, value: {})",
            self.offset,
            String::from_utf8_lossy(&self.value)
        )
    }
}

/// A record is encoded as:
/// - 8 bytes: offset, big-endian
/// - the rest: value
///
/// The value carries no length of its own: the store frame around the record
/// bounds it.
impl codeq::Encode for Record {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        w.write_u64::<BigEndian>(self.offset)?;
        w.write_all(&self.value)?;
        Ok(self.encoded_size())
    }
}

impl codeq::Decode for Record {
    fn decode<R: io::Read>(mut r: R) -> Result<Self, io::Error> {
        let offset = r.read_u64::<BigEndian>()?;

        let mut value = Vec::new();
        r.read_to_end(&mut value)?;

        Ok(Self { offset, value })
    }
}
