use std::io;
use std::sync::Arc;

use tempfile::TempDir;

use crate::CommitLog;
use crate::Config;

pub(crate) fn new_testing() -> Result<(TestContext, CommitLog), io::Error> {
    let ctx = TestContext::new()?;
    let log = ctx.new_log()?;

    Ok((ctx, log))
}

pub(crate) struct TestContext {
    pub(crate) config: Config,

    _temp_dir: TempDir,
}

impl TestContext {
    pub(crate) fn new() -> Result<TestContext, io::Error> {
        let temp_dir = tempfile::tempdir()?;

        let config = Config {
            dir: temp_dir.path().to_str().unwrap().to_string(),
            ..Default::default()
        };

        Ok(TestContext {
            config,
            _temp_dir: temp_dir,
        })
    }

    pub(crate) fn config(&self) -> Config {
        self.config.clone()
    }

    pub(crate) fn arc_config(&self) -> Arc<Config> {
        Arc::new(self.config.clone())
    }

    pub(crate) fn new_log(&self) -> Result<CommitLog, io::Error> {
        CommitLog::open(self.arc_config())
    }
}
