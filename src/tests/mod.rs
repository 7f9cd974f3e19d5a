pub(crate) mod context;

mod test_commit_log;
