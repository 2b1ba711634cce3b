//! `rollcall start` — run the daemon in the foreground.

use anyhow::{Context, Result};

use rollcall_daemon::{start_blocking, DaemonConfig};

pub fn run() -> Result<()> {
    let config = DaemonConfig::from_env().context("invalid configuration")?;
    start_blocking(config).context("daemon exited with error")?;
    Ok(())
}
