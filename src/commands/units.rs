//! Install-units command - writes systemd and sysusers.d files.

use anyhow::Result;
use std::path::Path;

use distkv_admin::config::Config;
use distkv_admin::service;

/// Execute the install-units command.
pub fn cmd_install_units(
    config: &Config,
    systemd_dir: &Path,
    sysusers_dir: &Path,
    force: bool,
) -> Result<()> {
    let admin = std::env::current_exe()?;
    let units = service::render_units(&admin, config);
    let written = service::install_units(&units, systemd_dir, sysusers_dir, force)?;

    if written.is_empty() {
        println!("All unit files already present (use --force to overwrite).");
    }
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
