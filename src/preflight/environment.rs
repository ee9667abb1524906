//! Node environment checks (env file, state root, snapshot, service user).

use std::path::Path;

use crate::config::{Config, Mode, SERVICE_USER};
use crate::snapshot;
use crate::users;

use super::types::CheckResult;

/// Check the environment file and the state it points at.
pub fn check_node_environment(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if config.env_file.exists() {
        results.push(CheckResult::pass_with(
            "env file",
            &config.env_file.display().to_string(),
        ));
    } else {
        results.push(CheckResult::warn(
            "env file",
            &format!(
                "{} not found - 'distkv-admin init' will create it",
                config.env_file.display()
            ),
        ));
    }
    results.push(CheckResult::pass_with("MODE", &config.mode.to_string()));

    results.push(check_dest(&config.dest));

    match config.mode {
        Mode::Slave => results.push(CheckResult::skip("snapshot", "MODE=slave keeps no snapshot")),
        Mode::Master => match snapshot::find_latest_snapshot(&config.dest) {
            Ok(Some(path)) => {
                results.push(CheckResult::pass_with("snapshot", &path.display().to_string()))
            }
            Ok(None) => results.push(CheckResult::warn(
                "snapshot",
                "No initialized 0.dkv yet - run 'distkv-admin init'",
            )),
            Err(e) => results.push(CheckResult::fail("snapshot", &format!("{:#}", e))),
        },
    }

    match users::lookup_user(&config.passwd, SERVICE_USER) {
        Ok(Some((uid, gid))) => results.push(CheckResult::pass_with(
            "service user",
            &format!("{} ({}:{})", SERVICE_USER, uid, gid),
        )),
        Ok(None) => results.push(CheckResult::fail(
            "service user",
            &format!("'{}' missing from {}", SERVICE_USER, config.passwd.display()),
        )),
        Err(e) => results.push(CheckResult::fail("service user", &format!("{:#}", e))),
    }

    results
}

/// DEST must be a directory, or creatable by `init`.
fn check_dest(dest: &Path) -> CheckResult {
    if dest.is_dir() {
        return CheckResult::pass_with("DEST", &dest.display().to_string());
    }
    if dest.exists() {
        return CheckResult::fail("DEST", &format!("{} is not a directory", dest.display()));
    }

    // init creates DEST with all missing parents; the closest existing one
    // must accept new entries
    let Some(ancestor) = dest.ancestors().skip(1).find(|p| p.exists()) else {
        return CheckResult::fail("DEST", &format!("{} has no existing parent", dest.display()));
    };
    if !ancestor.is_dir() {
        return CheckResult::fail(
            "DEST",
            &format!("{} is not a directory", ancestor.display()),
        );
    }
    match tempfile::tempfile_in(ancestor) {
        Ok(_) => CheckResult::warn(
            "DEST",
            &format!("{} not found - 'distkv-admin init' will create it", dest.display()),
        ),
        Err(e) => CheckResult::fail(
            "DEST",
            &format!(
                "{} not found and {} is not writable: {}",
                dest.display(),
                ancestor.display(),
                e
            ),
        ),
    }
}
