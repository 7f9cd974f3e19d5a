use std::io;
use std::io::Read;
use std::ops::Range;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;

use crate::offset_reader::OffsetReader;
use crate::segment::store::LEN_WIDTH;
use crate::Record;

/// Decodes a stream of store frames into records.
///
/// The input is anything laid out like a store file: a single store, or the
/// concatenation of stores produced by
/// [`CommitLog::reader`](crate::CommitLog::reader). Each item is the byte
/// range of the frame in the stream, length prefix included, and the decoded
/// record.
///
/// Iteration ends at a clean end of stream. A frame cut short yields an
/// `UnexpectedEof` error, after which the iterator is exhausted.
pub struct RecordIterator<R> {
    r: OffsetReader<R>,
    error: bool,
}

impl<R> RecordIterator<R>
where R: io::Read
{
    pub fn new(r: R) -> Self {
        Self {
            r: OffsetReader::new(r),
            error: false,
        }
    }

    /// Read a length prefix; `None` if the stream ends before its first byte.
    fn read_len(&mut self) -> Result<Option<u64>, io::Error> {
        let mut buf = [0u8; LEN_WIDTH as usize];
        let mut n = 0;

        while n < buf.len() {
            match self.r.read(&mut buf[n..]) {
                Ok(0) => break,
                Ok(got) => n += got,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        if n == 0 {
            return Ok(None);
        }

        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("incomplete length prefix: {} bytes", n),
            ));
        }

        Ok(Some(BigEndian::read_u64(&buf)))
    }

    fn next_frame(&mut self) -> Result<Option<(Range<u64>, Record)>, io::Error> {
        let start = self.r.offset();

        let Some(len) = self.read_len()? else {
            return Ok(None);
        };

        // The length comes from the stream: read what is there instead of
        // allocating it up front.
        let mut payload = Vec::new();
        let n = (&mut self.r).take(len).read_to_end(&mut payload)?;
        if (n as u64) < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("incomplete frame: {} of {} bytes", n, len),
            ));
        }

        let record = Record::decode(payload.as_slice())?;

        Ok(Some((start..self.r.offset(), record)))
    }
}

impl<R> Iterator for RecordIterator<R>
where R: io::Read
{
    type Item = Result<(Range<u64>, Record), io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.error {
            return None;
        }

        let start = self.r.offset();

        let res = self
            .next_frame()
            .context(|| format!("decode frame at offset {}", start));

        match res {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.error = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use byteorder::BigEndian;
    use byteorder::WriteBytesExt;
    use pretty_assertions::assert_eq;

    use super::RecordIterator;
    use crate::testing::encode_record;
    use crate::Record;

    fn frame(offset: u64, value: &[u8]) -> Vec<u8> {
        let payload = encode_record(offset, value);
        let mut b = Vec::new();
        b.write_u64::<BigEndian>(payload.len() as u64).unwrap();
        b.extend_from_slice(&payload);
        b
    }

    #[test]
    fn test_record_iterator() -> Result<(), io::Error> {
        let mut data = frame(0, b"foo");
        data.extend(frame(1, b"hello"));

        let got = RecordIterator::new(data.as_slice())
            .collect::<Result<Vec<_>, _>>()?;

        assert_eq!(
            vec![
                (0..19, Record {
                    offset: 0,
                    value: b"foo".to_vec()
                }),
                (19..40, Record {
                    offset: 1,
                    value: b"hello".to_vec()
                }),
            ],
            got
        );

        Ok(())
    }

    #[test]
    fn test_record_iterator_empty() {
        let mut it = RecordIterator::new(&[0u8; 0][..]);
        assert!(it.next().is_none());
    }

    #[test]
    fn test_record_iterator_incomplete_frame() {
        let mut data = frame(0, b"foo");
        let full = data.len();
        data.extend(frame(1, b"hello"));

        for cut in [full + 3, full + 10, data.len() - 1] {
            let mut it = RecordIterator::new(&data[..cut]);

            assert!(it.next().unwrap().is_ok());

            let err = it.next().unwrap().unwrap_err();
            assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());

            assert!(it.next().is_none());
        }
    }

    #[test]
    fn test_record_iterator_huge_length() {
        for len in [u64::MAX - 0xFF, 1 << 40] {
            let mut data = Vec::new();
            data.write_u64::<BigEndian>(len).unwrap();
            data.extend_from_slice(&encode_record(0, b"foo"));

            let mut it = RecordIterator::new(data.as_slice());

            let err = it.next().unwrap().unwrap_err();
            assert_eq!(io::ErrorKind::UnexpectedEof, err.kind(), "len: {}", len);

            assert!(it.next().is_none());
        }
    }
}
