//! State directory layout: dated directories of numbered `.dkv` files.
//!
//! ```text
//! $DEST/
//!   2024-03-01/0.dkv 1.dkv 2.dkv
//!   2024-03-09/0.dkv 1.dkv ... 10.dkv
//! ```
//!
//! Directory names sort chronologically as plain strings. `0.dkv` is the
//! full snapshot and the higher numbers are incremental fragments; all of
//! them are opaque blobs here.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Base snapshot inside every state directory.
pub const SNAPSHOT_FILE: &str = "0.dkv";

/// Extension shared by the snapshot and its fragments.
pub const FRAGMENT_EXT: &str = "dkv";

/// Anything this small is a placeholder, not a snapshot.
pub const STUB_MAX_BYTES: u64 = 1;

/// A numbered `.dkv` file inside a state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: u64,
    pub path: PathBuf,
    pub size: u64,
}

/// Where `init` should put the base snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSnapshot {
    /// Path of `0.dkv`.
    pub path: PathBuf,
    /// True if the file is missing or a stub and must be populated.
    pub needs_init: bool,
    /// True if the state directory was created by this call.
    pub created_dir: bool,
}

/// Outcome of concatenating fragments.
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub output: PathBuf,
    pub fragments: usize,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the output file.
    pub sha256: String,
}

/// Name of the state directory for a given day.
pub fn dated_dir_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// True if `path` is a regular file larger than a stub.
pub fn is_initialized(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > STUB_MAX_BYTES)
        .unwrap_or(false)
}

/// State directories under `dest`, newest (reverse name order) first.
///
/// A missing `dest` has no state directories.
pub fn state_dirs(dest: &Path) -> Result<Vec<PathBuf>> {
    if !dest.exists() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in WalkDir::new(dest).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to scan {}", dest.display()))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(dirs)
}

/// Newest initialized `0.dkv` under `dest`, if any.
pub fn find_latest_snapshot(dest: &Path) -> Result<Option<PathBuf>> {
    for dir in state_dirs(dest)? {
        let snapshot = dir.join(SNAPSHOT_FILE);
        if is_initialized(&snapshot) {
            return Ok(Some(snapshot));
        }
        tracing::debug!(dir = %dir.display(), "no initialized snapshot");
    }
    Ok(None)
}

/// Newest state directory that holds at least one fragment.
pub fn latest_state_dir(dest: &Path) -> Result<Option<PathBuf>> {
    for dir in state_dirs(dest)? {
        if !list_fragments(&dir)?.is_empty() {
            return Ok(Some(dir));
        }
    }
    Ok(None)
}

/// Pick the snapshot `init` should use, creating today's directory if needed.
pub fn prepare_snapshot(dest: &Path, today: NaiveDate) -> Result<PreparedSnapshot> {
    if let Some(path) = find_latest_snapshot(dest)? {
        return Ok(PreparedSnapshot {
            path,
            needs_init: false,
            created_dir: false,
        });
    }

    let dir = dest.join(dated_dir_name(today));
    let created_dir = !dir.is_dir();
    if created_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
    }

    let path = dir.join(SNAPSHOT_FILE);
    Ok(PreparedSnapshot {
        needs_init: !is_initialized(&path),
        path,
        created_dir,
    })
}

/// Fragment number encoded in a file name like `12.dkv`.
pub fn fragment_index(path: &Path) -> Option<u64> {
    if path.extension()? != FRAGMENT_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// All fragments in `dir`, in numeric order.
pub fn list_fragments(dir: &Path) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match fragment_index(path) {
            Some(index) => {
                let size = entry
                    .metadata()
                    .with_context(|| format!("Failed to stat {}", path.display()))?
                    .len();
                fragments.push(Fragment {
                    index,
                    path: path.to_path_buf(),
                    size,
                });
            }
            None if path.extension().is_some_and(|e| e == FRAGMENT_EXT) => {
                tracing::warn!(file = %path.display(), "skipping .dkv file without a numeric name");
            }
            None => {}
        }
    }

    fragments.sort_by_key(|f| f.index);
    Ok(fragments)
}

/// Concatenate `fragments` in order into `output`.
///
/// The data is staged in a temp file next to `output` and renamed into
/// place, so readers never see a half-written file.
pub fn consolidate(fragments: &[Fragment], output: &Path) -> Result<Consolidation> {
    if fragments.is_empty() {
        bail!("No fragments to consolidate into {}", output.display());
    }

    let target = resolve(output);
    for fragment in fragments {
        if resolve(&fragment.path) == target {
            bail!(
                "Output {} is one of the fragments being consolidated",
                output.display()
            );
        }
    }

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    let mut writer = HashingWriter::new(BufWriter::new(tmp.as_file()));
    for fragment in fragments {
        let mut src = File::open(&fragment.path)
            .with_context(|| format!("Failed to open {}", fragment.path.display()))?;
        io::copy(&mut src, &mut writer)
            .with_context(|| format!("Failed to copy {}", fragment.path.display()))?;
    }
    let (bytes, sha256) = writer.finish()?;

    tmp.as_file()
        .sync_all()
        .context("Failed to sync consolidated output")?;
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
    tmp.persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move output into {}", output.display()))?;

    Ok(Consolidation {
        output: output.to_path_buf(),
        fragments: fragments.len(),
        bytes,
        sha256,
    })
}

/// Best-effort absolute form of a path that may not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Writer that counts and hashes what passes through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    bytes: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    fn finish(mut self) -> Result<(u64, String)> {
        self.inner.flush().context("Failed to flush consolidated output")?;
        Ok((self.bytes, format!("{:x}", self.hasher.finalize())))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
