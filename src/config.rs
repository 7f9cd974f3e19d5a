use std::format;
use std::io;

use crate::errors::InvalidSegmentFileName;
use crate::segment::index::ENTRY_WIDTH;
use crate::SegmentId;

/// Extension of the file holding the length-prefixed records of a segment.
pub(crate) const STORE_SUFFIX: &str = ".store";

/// Extension of the file mapping relative offsets to store positions.
pub(crate) const INDEX_SUFFIX: &str = ".index";

/// Configuration for a commit log.
///
/// Optional parameters are `Option<T>` in this struct, and default values is
/// evaluated when a getter method is called.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Directory holding the segment files
    pub dir: String,

    /// Maximum size of a store file in bytes
    pub max_store_bytes: Option<u64>,

    /// Maximum size of an index file in bytes
    pub max_index_bytes: Option<u64>,

    /// Offset assigned to the first record of a new log
    pub initial_offset: Option<u64>,

    /// Size of the buffer collecting store writes before they reach the file
    pub write_buffer_size: Option<usize>,

    /// Whether to drop the records left incomplete by a crash.
    ///
    /// If truncate, the segment is considered successfully opened.
    /// Otherwise, an io::Error will be returned.
    pub truncate_incomplete_record: Option<bool>,
}

impl Config {
    /// Creates a new Config with the specified directory and default values for
    /// other fields
    pub fn new(dir: impl ToString) -> Self {
        Self {
            dir: dir.to_string(),
            ..Default::default()
        }
    }

    /// Creates a new Config with the segment limits and the initial offset
    pub fn new_full(
        dir: impl ToString,
        max_store_bytes: Option<u64>,
        max_index_bytes: Option<u64>,
        initial_offset: Option<u64>,
    ) -> Self {
        Self {
            dir: dir.to_string(),
            max_store_bytes,
            max_index_bytes,
            initial_offset,
            write_buffer_size: None,
            truncate_incomplete_record: None,
        }
    }

    /// Returns the maximum store size per segment (defaults to 1KB)
    pub fn max_store_bytes(&self) -> u64 {
        self.max_store_bytes.unwrap_or(1024)
    }

    /// Returns the maximum index size per segment (defaults to 1KB)
    pub fn max_index_bytes(&self) -> u64 {
        self.max_index_bytes.unwrap_or(1024)
    }

    /// Returns the offset of the first record of a new log (defaults to 0)
    pub fn initial_offset(&self) -> u64 {
        self.initial_offset.unwrap_or(0)
    }

    /// Returns the store write buffer size in bytes (defaults to 4KB)
    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size.unwrap_or(4096)
    }

    /// Returns whether to truncate incomplete records (defaults to true)
    pub fn truncate_incomplete_record(&self) -> bool {
        self.truncate_incomplete_record.unwrap_or(true)
    }

    /// Check that a segment built with this config can hold a record.
    pub fn validate(&self) -> Result<(), io::Error> {
        if self.max_index_bytes() < ENTRY_WIDTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "max_index_bytes {} can not hold one {} byte entry",
                    self.max_index_bytes(),
                    ENTRY_WIDTH
                ),
            ));
        }

        if self.max_store_bytes() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_store_bytes must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Returns the full path of the store file of a segment
    pub fn store_path(&self, segment_id: SegmentId) -> String {
        format!("{}/{}{}", self.dir, *segment_id, STORE_SUFFIX)
    }

    /// Returns the full path of the index file of a segment
    pub fn index_path(&self, segment_id: SegmentId) -> String {
        format!("{}/{}{}", self.dir, *segment_id, INDEX_SUFFIX)
    }

    /// Parses a segment file name and returns the base offset in it.
    ///
    /// # Arguments
    /// * `file_name` - Name of a store or index file (format:
    ///   "{base_offset}.store" or "{base_offset}.index")
    ///
    /// # Returns
    /// * `Ok(u64)` - The base offset if parsing succeeds
    /// * `Err(InvalidSegmentFileName)` - If the file name format is invalid
    pub(crate) fn parse_segment_file_name(
        file_name: &str,
    ) -> Result<u64, InvalidSegmentFileName> {
        let digits = file_name
            .strip_suffix(STORE_SUFFIX)
            .or_else(|| file_name.strip_suffix(INDEX_SUFFIX))
            .ok_or_else(|| {
                InvalidSegmentFileName::new(
                    file_name,
                    "has neither '.store' nor '.index' suffix",
                )
            })?;

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidSegmentFileName::new(
                file_name,
                "base offset is not a decimal number",
            ));
        }

        digits.parse::<u64>().map_err(|e| {
            InvalidSegmentFileName::new(
                file_name,
                format!("cannot parse as u64: {}", e),
            )
        })
    }
}
