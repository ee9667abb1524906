//! Host tool availability checks.

use crate::config::Config;
use crate::process;

use super::types::CheckResult;

/// Check the programs init and rotate shell out to.
pub fn check_host_tools(config: &Config) -> Vec<CheckResult> {
    let tools = [
        (
            config.distkv_bin.as_str(),
            "distkv",
            "Required to write the initial snapshot",
        ),
        (
            config.systemctl.as_str(),
            "systemd",
            "Required to enable and restart distkv.service",
        ),
        (
            config.sysusers.as_str(),
            "systemd",
            "Required to create the distkv user",
        ),
    ];

    tools
        .into_iter()
        .map(|(tool, package, purpose)| check_tool_exists(tool, package, purpose))
        .collect()
}

/// Check if a tool exists in PATH (or at the configured path).
fn check_tool_exists(tool: &str, package: &str, purpose: &str) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, &path.display().to_string()),
        None => CheckResult::fail(
            tool,
            &format!("Not found. Install the '{}' package. {}", package, purpose),
        ),
    }
}
