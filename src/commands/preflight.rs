//! Preflight command - runs preflight checks.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

use distkv_admin::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(env_file: &Path, strict: bool) -> Result<()> {
    let env: HashMap<String, String> = std::env::vars().collect();
    if strict {
        preflight::run_preflight_or_fail(env_file, &env)?;
    } else {
        let report = preflight::run_preflight(env_file, &env);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to exit non-zero.");
        }
    }
    Ok(())
}
