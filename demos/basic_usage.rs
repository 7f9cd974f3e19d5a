//! This example demonstrates basic usage of CommitLog, including:
//! - Opening a CommitLog
//! - Appending records and reading them back by offset
//! - Rolling over to new segments and truncating old ones
//! - Streaming the whole log, as a replica would copy it

use std::io;
use std::sync::Arc;

use commit_log::CommitLog;
use commit_log::Config;
use commit_log::Record;
use commit_log::RecordIterator;

fn main() -> io::Result<()> {
    // Create a temporary directory for the log data
    let temp_dir = tempfile::tempdir()?;

    // Small segments, so that a few records span several of them.
    let config = Arc::new(Config::new_full(
        temp_dir.path().to_string_lossy(),
        Some(64),
        None,
        None,
    ));

    let log = CommitLog::open(config.clone())?;

    // Each append returns the offset assigned to the record.
    for value in ["first entry", "second entry", "third entry", "fourth entry"]
    {
        let offset = log.append(Record::new(value))?;
        println!("Appended offset {}: {}", offset, value);
    }

    let rec = log.read(2)?;
    println!("\nRead: {}", rec);

    // Reading an offset that is not in the log is a distinct error.
    if let Err(e) = log.read(100) {
        println!("Read 100: {}", e);
    }

    println!("\nSegments:\n{:#}", log.stat());

    // Drop the segments holding only offsets up to 1
    log.truncate(1)?;
    println!(
        "\nAfter truncate: offsets [{}, {}]",
        log.lowest_offset(),
        log.highest_offset()
    );

    // Stream every record left in the log
    println!("\nAll records:");
    for res in RecordIterator::new(log.reader()) {
        let (range, rec) = res?;
        println!("  {:?}: {}", range, rec);
    }

    log.close()?;

    // Reopening restores the offsets
    drop(log);
    let log = CommitLog::open(config)?;
    println!("\nReopened, highest offset: {}", log.highest_offset());

    Ok(())
}
