//! Tracing setup. The terminal belongs to the TUI, so events go to a log
//! file inside the data directory instead of stderr.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

pub const LOG_FILE_NAME: &str = "library-manager.log";

impl LoggingConfig {
    /// Install the global subscriber, appending to `dir/library-manager.log`.
    pub fn init(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).context("failed to create log directory")?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))
            .context("failed to open log file")?;

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init()
            .map_err(|err| anyhow!("{err}"))
            .context("failed to install tracing subscriber")
    }
}
