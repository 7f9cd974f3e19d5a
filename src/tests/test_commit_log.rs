use std::io;
use std::io::Read;
use std::sync::Arc;

use indoc::indoc;
use pretty_assertions::assert_eq;
use rand::Rng;

use crate::errors::LogError;
use crate::testing::rec;
use crate::tests::context::new_testing;
use crate::tests::context::TestContext;
use crate::CommitLog;
use crate::Dump;
use crate::Record;
use crate::RecordIterator;
use crate::SegmentId;

/// Size of the store frame of a record with a 12 byte value.
const FRAME: u64 = 8 + 8 + 12;

fn values(log: &CommitLog) -> Result<Vec<(u64, String)>, io::Error> {
    RecordIterator::new(log.reader())
        .map(|res| {
            res.map(|(_range, rec)| {
                (rec.offset, String::from_utf8_lossy(&rec.value).to_string())
            })
        })
        .collect()
}

fn segment_ids(log: &CommitLog) -> Vec<SegmentId> {
    log.stat().segments.iter().map(|s| s.segment_id).collect()
}

#[test]
fn test_append_read() -> Result<(), io::Error> {
    let (_ctx, log) = new_testing()?;

    let want = Record::new("hello world");

    let off = log.append(want.clone())?;
    assert_eq!(0, off);

    let got = log.read(off)?;
    assert_eq!(want.value, got.value);
    assert_eq!(off, got.offset);

    // The offset in the appended record is ignored.
    let off = log.append(Record {
        offset: 100,
        value: b"second".to_vec(),
    })?;
    assert_eq!(1, off);
    assert_eq!(1, log.read(1)?.offset);

    assert_eq!(0, log.lowest_offset());
    assert_eq!(1, log.highest_offset());

    Ok(())
}

#[test]
fn test_empty_value() -> Result<(), io::Error> {
    let (_ctx, log) = new_testing()?;

    let off = log.append(Record::new(Vec::<u8>::new()))?;
    assert_eq!(Record::default(), log.read(off)?);

    Ok(())
}

#[test]
fn test_read_out_of_range() -> Result<(), io::Error> {
    let (_ctx, log) = new_testing()?;

    let err = log.read(0).unwrap_err();
    assert_eq!(0, err.offset_out_of_range().unwrap().offset);

    log.append(rec("a"))?;

    let err = log.read(1).unwrap_err();
    assert!(matches!(&err, LogError::OffsetOutOfRange(e) if e.offset == 1));
    assert_eq!(
        "Offset out of range: 1",
        err.offset_out_of_range().unwrap().to_string()
    );
    assert_eq!(io::ErrorKind::NotFound, io::Error::from(err).kind());

    Ok(())
}

#[test]
fn test_initial_offset() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.initial_offset = Some(16);

    let log = ctx.new_log()?;

    assert_eq!(16, log.lowest_offset());
    assert_eq!(15, log.highest_offset());
    assert_eq!(vec![SegmentId(16)], segment_ids(&log));

    assert_eq!(16, log.append(rec("a"))?);
    assert_eq!(16, log.highest_offset());
    assert_eq!(b"a".to_vec(), log.read(16)?.value);

    assert!(log.read(15).is_err());

    Ok(())
}

#[test]
fn test_empty_log_offsets() -> Result<(), io::Error> {
    let (_ctx, log) = new_testing()?;

    assert_eq!(0, log.lowest_offset());
    assert_eq!(0, log.highest_offset());
    assert_eq!(0, log.stat().records_count());

    Ok(())
}

#[test]
fn test_rollover_by_store_size() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME * 3);

    let log = ctx.new_log()?;

    for i in 0..4 {
        let off = log.append(Record::new(format!("hello world{}", i)))?;
        assert_eq!(i, off);
    }

    assert_eq!(3, log.highest_offset());
    assert_eq!(b"hello world3".to_vec(), log.read(3)?.value);
    assert_eq!(vec![SegmentId(0), SegmentId(3)], segment_ids(&log));

    for i in 0..4 {
        assert_eq!(format!("hello world{}", i).into_bytes(), log.read(i)?.value);
    }

    Ok(())
}

#[test]
fn test_rollover_by_index_size() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_index_bytes = Some(crate::ENTRY_WIDTH * 3);

    let log = ctx.new_log()?;

    for i in 0..7 {
        log.append(rec(i))?;
    }

    assert_eq!(
        vec![SegmentId(0), SegmentId(3), SegmentId(6)],
        segment_ids(&log)
    );
    assert_eq!(6, log.highest_offset());
    assert_eq!(b"6".to_vec(), log.read(6)?.value);

    Ok(())
}

#[test]
fn test_stat() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME * 3);

    let log = ctx.new_log()?;

    for i in 0..4 {
        log.append(Record::new(format!("hello world{}", i)))?;
    }

    let stat = log.stat();
    assert_eq!(4, stat.records_count());

    assert_eq!(
        indoc! {"
        Stat{
          segments: [
            SegmentStat(SegmentId(00_000_000_000_000_000_000)){records: 3, [000_000_000, 000_000_003), store: 000_000_084, index: 000_000_036},
            SegmentStat(SegmentId(00_000_000_000_000_000_003)){records: 1, [000_000_003, 000_000_004), store: 000_000_028, index: 000_000_012}
          ]
        }"},
        format!("{:#}", stat)
    );

    Ok(())
}

#[test]
fn test_truncate() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME * 3);

    let log = ctx.new_log()?;

    for i in 0..6 {
        log.append(Record::new(format!("hello world{}", i)))?;
    }
    assert_eq!(
        vec![SegmentId(0), SegmentId(3), SegmentId(6)],
        segment_ids(&log)
    );

    // Segment 0 still holds offset 2
    log.truncate(1)?;
    assert_eq!(0, log.lowest_offset());

    log.truncate(2)?;
    assert_eq!(3, log.lowest_offset());
    assert_eq!(5, log.highest_offset());
    assert_eq!(vec![SegmentId(3), SegmentId(6)], segment_ids(&log));

    assert!(log.read(2).unwrap_err().offset_out_of_range().is_some());
    assert_eq!(b"hello world3".to_vec(), log.read(3)?.value);

    let dir = ctx.config.dir.clone();
    assert!(!std::path::Path::new(&format!("{}/0.store", dir)).exists());
    assert!(!std::path::Path::new(&format!("{}/0.index", dir)).exists());

    // The empty active segment is kept.
    log.truncate(100)?;
    assert_eq!(vec![SegmentId(6)], segment_ids(&log));
    assert_eq!(6, log.lowest_offset());
    assert_eq!(5, log.highest_offset());

    assert_eq!(6, log.append(rec("x"))?);

    Ok(())
}

#[test]
fn test_truncate_active_segment() -> Result<(), io::Error> {
    let (_ctx, log) = new_testing()?;

    log.append(rec("a"))?;
    log.append(rec("b"))?;

    log.truncate(1)?;

    assert_eq!(vec![SegmentId(2)], segment_ids(&log));
    assert_eq!(2, log.lowest_offset());
    assert_eq!(1, log.highest_offset());
    assert!(log.read(1).is_err());

    assert_eq!(2, log.append(rec("c"))?);
    assert_eq!(b"c".to_vec(), log.read(2)?.value);

    Ok(())
}

#[test]
fn test_reader() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME * 3);

    let log = ctx.new_log()?;

    for i in 0..6 {
        log.append(Record::new(format!("hello world{}", i)))?;
    }

    let got = values(&log)?;
    let want = (0..6)
        .map(|i| (i, format!("hello world{}", i)))
        .collect::<Vec<_>>();
    assert_eq!(want, got);

    // Raw bytes are the concatenated store frames.
    let mut buf = vec![];
    log.reader().read_to_end(&mut buf)?;
    assert_eq!(FRAME as usize * 6, buf.len());

    // A truncated log is streamed from its lowest offset.
    log.truncate(2)?;
    assert_eq!(3, values(&log)?[0].0);

    Ok(())
}

#[test]
fn test_reader_sees_fixed_segments() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME);

    let log = ctx.new_log()?;
    log.append(Record::new("hello world0"))?;

    // Segment 0 is full: the empty segment 1 is already active.
    let reader = log.reader();

    log.append(Record::new("hello world1"))?;
    // Goes to segment 2, created after the reader.
    log.append(Record::new("hello world2"))?;

    let got = RecordIterator::new(reader)
        .map(|r| r.map(|(_, rec)| rec.offset))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(vec![0, 1], got);

    Ok(())
}

#[test]
fn test_random_values() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(2048);
    ctx.config.write_buffer_size = Some(100);

    let log = ctx.new_log()?;

    let mut rng = rand::rng();
    let mut want = vec![];

    for i in 0..300u64 {
        let len = rng.random_range(0..200);
        let value = (0..len).map(|_| rng.random::<u8>()).collect::<Vec<_>>();

        assert_eq!(i, log.append(Record::new(value.clone()))?);
        want.push(value);
    }

    assert!(log.stat().segments.len() > 1);

    for (i, value) in want.iter().enumerate() {
        assert_eq!(value, &log.read(i as u64)?.value, "offset: {}", i);
    }

    Ok(())
}

#[test]
fn test_append_after_close() -> Result<(), io::Error> {
    let (_ctx, log) = new_testing()?;

    log.append(rec("a"))?;
    log.close()?;
    log.close()?;

    assert!(log.append(rec("b")).is_err());
    assert!(log.truncate(0).is_err());
    assert_eq!(0, log.highest_offset());

    Ok(())
}

/// A closed log whose active segment is maxed must not roll over to a new
/// segment on append.
#[test]
fn test_append_after_close_maxed_active() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;

    {
        let log = ctx.new_log()?;
        for i in 0..3 {
            log.append(Record::new(format!("hello world{}", i)))?;
        }
        log.close()?;
    }

    // Reopened with a smaller limit: the active segment is already maxed.
    ctx.config.max_store_bytes = Some(FRAME);

    let log = ctx.new_log()?;
    log.close()?;

    assert!(log.append(rec("after-close")).is_err());
    assert_eq!(vec![SegmentId(0)], segment_ids(&log));
    assert_eq!(2, log.highest_offset());

    let dir = ctx.config.dir.clone();
    assert!(!std::path::Path::new(&format!("{}/3.store", dir)).exists());

    Ok(())
}

/// Truncation stops at the first segment that fails to be removed: earlier
/// segments stay removed, the failed one and later ones stay listed.
#[test]
fn test_truncate_removal_failure() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME * 3);

    let log = ctx.new_log()?;

    for i in 0..7 {
        log.append(Record::new(format!("hello world{}", i)))?;
    }
    assert_eq!(
        vec![SegmentId(0), SegmentId(3), SegmentId(6)],
        segment_ids(&log)
    );

    // Segment 3 can not be removed: its store file is already gone.
    let config = ctx.config();
    std::fs::remove_file(config.store_path(SegmentId(3)))?;

    let res = log.truncate(5);
    assert!(res.is_err());

    assert_eq!(vec![SegmentId(3), SegmentId(6)], segment_ids(&log));
    assert_eq!(3, log.lowest_offset());
    assert!(!std::path::Path::new(&config.store_path(SegmentId(0))).exists());
    assert!(!std::path::Path::new(&config.index_path(SegmentId(0))).exists());

    // The segment after the failed one is untouched.
    assert_eq!(b"hello world6".to_vec(), log.read(6)?.value);

    Ok(())
}

#[test]
fn test_remove() -> Result<(), io::Error> {
    let (ctx, log) = new_testing()?;

    log.append(rec("a"))?;
    log.remove()?;

    assert!(!std::path::Path::new(&ctx.config.dir).exists());

    Ok(())
}

#[test]
fn test_dump() -> Result<(), io::Error> {
    let mut ctx = TestContext::new()?;
    ctx.config.max_store_bytes = Some(FRAME * 3);

    let log = ctx.new_log()?;

    for i in 0..4 {
        log.append(Record::new(format!("hello world{}", i)))?;
    }
    log.flush()?;

    let dump = Dump::new(Arc::new(ctx.config())).write_to_string()?;

    assert_eq!(
        indoc! {"
        CommitLog:
        SegmentId(00_000_000_000_000_000_000)
          R-00000: [000_000_000, 000_000_028) 28: Record(offset: 0, value: hello world0)
          R-00001: [000_000_028, 000_000_056) 28: Record(offset: 1, value: hello world1)
          R-00002: [000_000_056, 000_000_084) 28: Record(offset: 2, value: hello world2)
        SegmentId(00_000_000_000_000_000_003)
          R-00000: [000_000_000, 000_000_028) 28: Record(offset: 3, value: hello world3)
        "},
        dump
    );

    Ok(())
}
