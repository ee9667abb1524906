//! Latest command - prints the newest initialized snapshot.

use anyhow::{bail, Result};
use std::path::PathBuf;

use distkv_admin::config::Config;
use distkv_admin::snapshot;

/// Execute the latest command.
pub fn cmd_latest(config: &Config) -> Result<()> {
    println!("{}", latest_snapshot(config)?.display());
    Ok(())
}

/// Newest initialized snapshot, or an error pointing at `init`.
fn latest_snapshot(config: &Config) -> Result<PathBuf> {
    match snapshot::find_latest_snapshot(&config.dest)? {
        Some(path) => Ok(path),
        None => bail!(
            "No initialized snapshot under {}. Run 'distkv-admin init' first.",
            config.dest.display()
        ),
    }
}
