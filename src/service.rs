//! systemd integration: unit names, unit file rendering, enable/restart.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Child;

use crate::config::{Config, Mode, SERVICE_USER};
use crate::process::Cmd;

/// The DistKV daemon.
pub const DISTKV_SERVICE: &str = "distkv.service";
/// One-shot unit that consolidates the latest state directory.
pub const ROTATE_SERVICE: &str = "distkv-rotate.service";
/// Timer that fires [`ROTATE_SERVICE`].
pub const ROTATE_TIMER: &str = "distkv-rotate.timer";

/// Units `init` enables.
pub const ENABLED_UNITS: [&str; 2] = [DISTKV_SERVICE, ROTATE_TIMER];

/// Default install location for generated units.
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";
/// Default install location for the sysusers.d entry.
pub const SYSUSERS_DIR: &str = "/etc/sysusers.d";

/// Where a generated file belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Systemd,
    Sysusers,
}

/// A generated unit (or sysusers.d) file.
#[derive(Debug, Clone)]
pub struct UnitFile {
    pub name: &'static str,
    pub kind: UnitKind,
    pub contents: String,
}

/// `systemctl enable <units...>`
pub fn enable_units(systemctl: &str, units: &[&str]) -> Result<()> {
    Cmd::new(systemctl)
        .arg("enable")
        .args(units)
        .error_msg(format!("Failed to enable {}", units.join(", ")))
        .run()?;
    Ok(())
}

/// `systemctl restart <unit> &`
///
/// The restart runs detached; the caller gets the child handle but is not
/// expected to wait on it.
pub fn restart_in_background(systemctl: &str, unit: &str) -> Result<Child> {
    let child = Cmd::new(systemctl)
        .args(["restart", unit])
        .spawn()
        .with_context(|| format!("Failed to restart {}", unit))?;
    tracing::info!(unit, pid = child.id(), "restart dispatched");
    Ok(child)
}

/// Command line `distkv.service` starts the daemon with.
///
/// A master preloads the newest snapshot, resolved at start time through
/// `distkv-admin latest`; a slave starts empty and syncs from its peers.
/// `$$` is systemd's escape for a literal `$` handed to the shell.
pub fn daemon_exec_start(admin_bin: &Path, config: &Config) -> String {
    match config.mode {
        Mode::Master => format!(
            "/bin/sh -c 'exec {distkv} server -l \"$$({admin} --env-file {env} latest)\" \"$$NAME\"'",
            distkv = config.distkv_bin,
            admin = admin_bin.display(),
            env = config.env_file.display(),
        ),
        Mode::Slave => format!("{} server ${{NAME}}", config.distkv_bin),
    }
}

/// Render the unit files for a DistKV node.
pub fn render_units(admin_bin: &Path, config: &Config) -> Vec<UnitFile> {
    let admin = admin_bin.display();
    let env = config.env_file.display();
    let dest = config.dest.display();

    vec![
        UnitFile {
            name: DISTKV_SERVICE,
            kind: UnitKind::Systemd,
            contents: format!(
                "[Unit]\n\
                 Description=DistKV key-value store\n\
                 Wants=network-online.target\n\
                 After=network-online.target\n\
                 \n\
                 [Service]\n\
                 Type=simple\n\
                 User={user}\n\
                 Group={user}\n\
                 EnvironmentFile=-{env}\n\
                 WorkingDirectory={dest}\n\
                 ExecStart={exec_start}\n\
                 Restart=on-failure\n\
                 RestartSec=5\n\
                 \n\
                 [Install]\n\
                 WantedBy=multi-user.target\n",
                user = SERVICE_USER,
                env = env,
                dest = dest,
                exec_start = daemon_exec_start(admin_bin, config),
            ),
        },
        UnitFile {
            name: ROTATE_SERVICE,
            kind: UnitKind::Systemd,
            contents: format!(
                "[Unit]\n\
                 Description=Consolidate DistKV state fragments\n\
                 \n\
                 [Service]\n\
                 Type=oneshot\n\
                 User={user}\n\
                 Group={user}\n\
                 EnvironmentFile=-{env}\n\
                 ExecStart={admin} --env-file {env} rotate\n",
                user = SERVICE_USER,
                env = env,
                admin = admin,
            ),
        },
        UnitFile {
            name: ROTATE_TIMER,
            kind: UnitKind::Systemd,
            contents: format!(
                "[Unit]\n\
                 Description=Daily DistKV state consolidation\n\
                 \n\
                 [Timer]\n\
                 OnCalendar=daily\n\
                 Persistent=true\n\
                 Unit={}\n\
                 \n\
                 [Install]\n\
                 WantedBy=timers.target\n",
                ROTATE_SERVICE
            ),
        },
        UnitFile {
            name: "distkv.conf",
            kind: UnitKind::Sysusers,
            contents: format!(
                "u {user} - \"DistKV key-value store\" {dest}\n",
                user = SERVICE_USER,
                dest = dest,
            ),
        },
    ]
}

/// Write unit files, keeping any that already exist unless `force` is set.
///
/// Returns the paths actually written.
pub fn install_units(
    units: &[UnitFile],
    systemd_dir: &Path,
    sysusers_dir: &Path,
    force: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for unit in units {
        let dir = match unit.kind {
            UnitKind::Systemd => systemd_dir,
            UnitKind::Sysusers => sysusers_dir,
        };
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(unit.name);
        if path.exists() && !force {
            tracing::debug!(path = %path.display(), "unit exists, keeping");
            continue;
        }
        fs::write(&path, &unit.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}
