#[allow(clippy::module_inception)]
pub(crate) mod commit_log;
pub mod dump;
pub mod log_reader;
pub mod stat;
