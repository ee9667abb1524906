//! Service user management.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::chown;
use std::path::Path;

use crate::process::Cmd;

/// Create the system users declared in sysusers.d (including `distkv`).
pub fn ensure_system_user(sysusers: &str) -> Result<()> {
    Cmd::new(sysusers)
        .error_msg("systemd-sysusers failed to create the service user")
        .run()?;
    Ok(())
}

/// Read a user's UID and primary GID from a passwd file.
///
/// Returns:
/// - Ok(Some((uid, gid))) if user found
/// - Ok(None) if user not found or file doesn't exist
/// - Err if file exists but is corrupted/unreadable
pub fn lookup_user(passwd_path: &Path, username: &str) -> Result<Option<(u32, u32)>> {
    if !passwd_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(passwd_path)
        .with_context(|| format!("Failed to read passwd file at {}", passwd_path.display()))?;
    parse_passwd_ids(&content, username)
        .with_context(|| format!("Corrupted passwd file at {}", passwd_path.display()))
}

/// Find `username` in passwd-format `content` and return its `(uid, gid)`.
///
/// Blank lines and `#` comments are skipped. The first matching entry wins.
pub fn parse_passwd_ids(content: &str, username: &str) -> Result<Option<(u32, u32)>> {
    let entry = content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.len() >= 4 && fields[0] == username);

    let Some(fields) = entry else {
        return Ok(None);
    };
    let id = |field: &str, what: &str| -> Result<u32> {
        field
            .parse()
            .with_context(|| format!("invalid {} '{}' for user '{}'", what, field, username))
    };
    Ok(Some((id(fields[2], "UID")?, id(fields[3], "GID")?)))
}

/// Hand `path` to `username` (`chown user:group path`).
pub fn chown_to_user(path: &Path, passwd_path: &Path, username: &str) -> Result<()> {
    let Some((uid, gid)) = lookup_user(passwd_path, username)? else {
        bail!(
            "User '{}' not found in {}; cannot chown {}",
            username,
            passwd_path.display(),
            path.display()
        );
    };

    chown(path, Some(uid), Some(gid)).with_context(|| {
        format!(
            "Failed to chown {} to {}:{} ({})",
            path.display(),
            uid,
            gid,
            username
        )
    })?;
    tracing::debug!(path = %path.display(), uid, gid, "ownership fixed");
    Ok(())
}
