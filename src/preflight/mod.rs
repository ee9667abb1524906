//! Preflight checks for a DistKV node.
//!
//! Read-only: reports what `init` and `rotate` would trip over without
//! changing anything. Run with `distkv-admin preflight`.

mod environment;
mod host_tools;
mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};

use crate::config::Config;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(env_file: &Path, overrides: &HashMap<String, String>) -> PreflightReport {
    let mut checks = Vec::new();

    let config = match Config::load_with(env_file, overrides) {
        Ok(config) => config,
        Err(e) => {
            checks.push(CheckResult::fail("configuration", &format!("{:#}", e)));
            return PreflightReport { checks };
        }
    };

    checks.extend(host_tools::check_host_tools(&config));
    checks.extend(environment::check_node_environment(&config));

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(
    env_file: &Path,
    overrides: &HashMap<String, String>,
) -> Result<PreflightReport> {
    let report = run_preflight(env_file, overrides);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before running init.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn overrides(pairs: &[(&str, String)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_bad_mode_reported_as_failure() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("distkv.env");
        fs::write(&env, "MODE=primary\n").unwrap();

        let report = run_preflight(&env, &HashMap::new());
        assert!(!report.all_passed());
        let check = report.get("configuration").unwrap();
        assert!(check.details.as_deref().unwrap().contains("primary"));
    }

    #[test]
    fn test_ready_master_node_passes() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("distkv.env");
        let dest = tmp.path().join("dest");
        fs::create_dir_all(dest.join("2024-01-01")).unwrap();
        fs::write(dest.join("2024-01-01/0.dkv"), b"snapshot").unwrap();
        fs::write(&env, "MODE=master\nNAME=n1\n").unwrap();
        let passwd = tmp.path().join("passwd");
        fs::write(&passwd, "distkv:x:900:900::/var/lib/distkv:/bin/false\n").unwrap();

        let report = run_preflight(
            &env,
            &overrides(&[
                ("DEST", dest.display().to_string()),
                ("PASSWD", passwd.display().to_string()),
                ("DISTKV", "sh".to_string()),
                ("SYSTEMCTL", "sh".to_string()),
                ("SYSUSERS", "sh".to_string()),
            ]),
        );
        assert!(report.all_passed(), "unexpected failures: {:?}", report.checks);
        assert_eq!(report.get("snapshot").unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn test_slave_skips_snapshot_check() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("distkv.env");
        fs::write(&env, "MODE=slave\n").unwrap();

        let report = run_preflight(
            &env,
            &overrides(&[("DEST", tmp.path().display().to_string())]),
        );
        assert_eq!(report.get("snapshot").unwrap().status, CheckStatus::Skip);
    }
}
