use std::fs::File;
use std::fs::OpenOptions;
use std::io;

use fs2::FileExt;
use log::info;

/// Exclusive lock on a log directory, held as long as this value lives.
///
/// Two logs writing the same segment files would corrupt each other's index
/// pre-allocation, so a directory is owned by one log at a time.
#[derive(Debug)]
pub(crate) struct FileLock {
    path: String,
    f: File,
}

impl FileLock {
    pub const LOCK_FILE_NAME: &'static str = "LOCK";

    pub(crate) fn new(dir: &str) -> Result<Self, io::Error> {
        let path = Self::lock_path(dir);

        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        f.try_lock_exclusive().map_err(|e| {
            io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "Directory '{}' is already locked by another commit log, \
                    close it to continue; \
                    error:({})",
                    dir, e
                ),
            )
        })?;

        info!("Directory lock acquired: {}", path);

        Ok(Self { path, f })
    }

    pub(crate) fn lock_path(dir: &str) -> String {
        format!("{}/{}", dir, Self::LOCK_FILE_NAME)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.f.unlock();
        info!("Directory lock released: {}", self.path);
    }
}
