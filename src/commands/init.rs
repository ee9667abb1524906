//! Init command - prepares a node and (re)starts the daemon.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

use distkv_admin::setup::{self, InitOptions};

/// Execute the init command.
pub fn cmd_init(env_file: &Path, no_systemd: bool, no_chown: bool) -> Result<()> {
    let opts = InitOptions {
        systemd: !no_systemd,
        chown: !no_chown,
        ..InitOptions::default()
    };
    let env: HashMap<String, String> = std::env::vars().collect();

    let report = setup::run_init(env_file, &env, &opts)?;

    println!();
    println!("=== Init complete ===");
    println!("  Mode: {}", report.mode);
    match &report.snapshot {
        Some(path) if report.snapshot_created => println!("  Snapshot: {} (new)", path.display()),
        Some(path) => println!("  Snapshot: {}", path.display()),
        None => println!("  Snapshot: none"),
    }
    if let Some(pid) = report.restart_pid {
        println!("  Restart: dispatched (pid {})", pid);
    }
    Ok(())
}
