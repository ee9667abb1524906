//! Node initialization: service user, environment defaults, base snapshot,
//! and systemd units.
//!
//! Every step is safe to repeat. A second run finds the snapshot written by
//! the first, leaves the environment file alone, and only re-enables and
//! restarts the service.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{ensure_env_file, env_defaults, Config, Mode, SERVICE_USER};
use crate::process::Cmd;
use crate::service::{self, DISTKV_SERVICE, ENABLED_UNITS};
use crate::snapshot::{self, PreparedSnapshot};
use crate::timing::Timer;
use crate::users;

/// Knobs for [`run_init`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Run `systemd-sysusers` and manage units.
    pub systemd: bool,
    /// Hand the snapshot to the service user.
    pub chown: bool,
    /// Date used to name a fresh state directory.
    pub today: NaiveDate,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            systemd: true,
            chown: true,
            today: Local::now().date_naive(),
        }
    }
}

/// What [`run_init`] did.
#[derive(Debug, Clone)]
pub struct InitReport {
    pub mode: Mode,
    /// Keys appended to the environment file.
    pub env_keys_written: Vec<String>,
    /// Base snapshot in use; `None` on slave nodes.
    pub snapshot: Option<PathBuf>,
    /// True if `distkv dump init` populated the snapshot during this run.
    pub snapshot_created: bool,
    /// PID of the background `systemctl restart`, if one was dispatched.
    pub restart_pid: Option<u32>,
}

/// Initialize a DistKV node.
///
/// `overrides` take precedence over the environment file; the binary passes
/// the process environment here.
pub fn run_init(
    env_file: &Path,
    overrides: &HashMap<String, String>,
    opts: &InitOptions,
) -> Result<InitReport> {
    let initial = Config::load_with(env_file, overrides)?;

    if opts.systemd {
        println!("Ensuring service user '{}'...", SERVICE_USER);
        let timer = Timer::start("sysusers");
        users::ensure_system_user(&initial.sysusers)?;
        timer.finish();
    }

    let env_keys_written = ensure_env_file(env_file, &env_defaults())
        .with_context(|| format!("Failed to seed defaults into {}", env_file.display()))?;
    if !env_keys_written.is_empty() {
        println!(
            "Wrote defaults for {} to {}",
            env_keys_written.join(", "),
            env_file.display()
        );
    }

    // Reload so the freshly seeded values apply
    let config = Config::load_with(env_file, overrides)?;
    tracing::debug!(mode = %config.mode, name = %config.name, dest = %config.dest.display(), "configuration loaded");

    let mut snapshot = None;
    let mut snapshot_created = false;
    match config.mode {
        Mode::Slave => println!("MODE=slave: skipping local snapshot."),
        Mode::Master => {
            let timer = Timer::start("snapshot");
            let prepared = snapshot::prepare_snapshot(&config.dest, opts.today)?;
            snapshot_created = populate_snapshot(&config, &prepared)?;
            if opts.chown {
                fix_ownership(&config, &prepared.path)?;
            }
            timer.finish();
            snapshot = Some(prepared.path);
        }
    }

    let mut restart_pid = None;
    if opts.systemd {
        println!("Enabling {}...", ENABLED_UNITS.join(" "));
        service::enable_units(&config.systemctl, &ENABLED_UNITS)?;
        let child = service::restart_in_background(&config.systemctl, DISTKV_SERVICE)?;
        restart_pid = Some(child.id());
    }

    Ok(InitReport {
        mode: config.mode,
        env_keys_written,
        snapshot,
        snapshot_created,
        restart_pid,
    })
}

/// Run `distkv dump init` if the snapshot is missing or a stub.
///
/// Returns true if the snapshot was written.
fn populate_snapshot(config: &Config, prepared: &PreparedSnapshot) -> Result<bool> {
    if !prepared.needs_init {
        println!("Using snapshot {}", prepared.path.display());
        return Ok(false);
    }

    println!(
        "Initializing snapshot {} as node '{}'...",
        prepared.path.display(),
        config.name
    );
    Cmd::new(&config.distkv_bin)
        .args(["dump", "init"])
        .arg(&config.name)
        .arg_path(&prepared.path)
        .error_msg(format!(
            "distkv dump init failed for {}",
            prepared.path.display()
        ))
        .run()?;

    if !snapshot::is_initialized(&prepared.path) {
        tracing::warn!(path = %prepared.path.display(), "distkv dump init left the snapshot empty");
    }
    Ok(true)
}

fn fix_ownership(config: &Config, snapshot: &Path) -> Result<()> {
    if let Some(dir) = snapshot.parent() {
        users::chown_to_user(dir, &config.passwd, SERVICE_USER)?;
    }
    users::chown_to_user(snapshot, &config.passwd, SERVICE_USER)
}
