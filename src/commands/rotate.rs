//! Rotate command - concatenates fragments of the newest state directory.

use anyhow::Result;
use std::path::PathBuf;

use distkv_admin::config::Config;
use distkv_admin::rotate::{self, RotateRequest};

/// Execute the rotate command.
pub fn cmd_rotate(config: &Config, output: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    let request = RotateRequest { dir, output };
    let result = rotate::run_rotate(config, &request)?;

    println!(
        "Consolidated {} fragment(s), {} bytes -> {}",
        result.fragments,
        result.bytes,
        result.output.display()
    );
    println!("  sha256: {}", result.sha256);
    Ok(())
}
