//! Rotation: fold the newest state directory into a single file.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::snapshot::{self, Consolidation, FRAGMENT_EXT};

/// Where to read fragments from and where to write the result.
#[derive(Debug, Clone, Default)]
pub struct RotateRequest {
    /// State directory to consolidate; defaults to the newest under DEST.
    pub dir: Option<PathBuf>,
    /// Output file; defaults to `TEMP/<state-dir-name>.dkv`.
    pub output: Option<PathBuf>,
}

/// State directory a rotation will read.
pub fn resolve_state_dir(config: &Config, request: &RotateRequest) -> Result<PathBuf> {
    if let Some(dir) = &request.dir {
        if !dir.is_dir() {
            bail!("State directory {} does not exist", dir.display());
        }
        return Ok(dir.clone());
    }

    match snapshot::latest_state_dir(&config.dest)? {
        Some(dir) => Ok(dir),
        None => bail!(
            "No state directory with .{} files under {}",
            FRAGMENT_EXT,
            config.dest.display()
        ),
    }
}

/// Default output path for consolidating `dir`.
pub fn default_output(config: &Config, dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "distkv".to_string());
    config.temp.join(format!("{}.{}", name, FRAGMENT_EXT))
}

/// Concatenate every fragment of the selected state directory, in numeric
/// order, into the requested output.
pub fn run_rotate(config: &Config, request: &RotateRequest) -> Result<Consolidation> {
    let dir = resolve_state_dir(config, request)?;
    let fragments = snapshot::list_fragments(&dir)?;
    if fragments.is_empty() {
        bail!("No .{} fragments in {}", FRAGMENT_EXT, dir.display());
    }

    let output = request
        .output
        .clone()
        .unwrap_or_else(|| default_output(config, &dir));

    tracing::info!(
        dir = %dir.display(),
        fragments = fragments.len(),
        output = %output.display(),
        "consolidating"
    );
    snapshot::consolidate(&fragments, &output)
}
