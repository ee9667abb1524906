//! Configuration management for distkv-admin.
//!
//! Reads configuration from the DistKV environment file (`/etc/distkv.env`
//! by default) and process environment variables. Environment variables
//! take precedence over the file.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default location of the environment file shared with `distkv.service`.
pub const DEFAULT_ENV_FILE: &str = "/etc/distkv.env";

/// Default root under which dated state directories live.
pub const DEFAULT_DEST: &str = "/var/lib/distkv";

/// System user that owns the state files and runs the daemon.
pub const SERVICE_USER: &str = "distkv";

/// Keys `init` guarantees are present in the environment file.
pub const DEFAULT_KEYS: [&str; 2] = ["MODE", "NAME"];

/// Replication role of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Owns a local snapshot and serves it.
    #[default]
    Master,
    /// Pulls state from its peers; never keeps a local snapshot.
    Slave,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" => Ok(Mode::Master),
            "slave" => Ok(Mode::Slave),
            other => bail!("Invalid MODE '{}': expected 'master' or 'slave'", other),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Master => f.write_str("master"),
            Mode::Slave => f.write_str("slave"),
        }
    }
}

/// distkv-admin configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Environment file this configuration was loaded from.
    pub env_file: PathBuf,
    /// Node role (MODE).
    pub mode: Mode,
    /// Node name handed to `distkv dump init` (NAME).
    pub name: String,
    /// Destination root of dated state directories (DEST).
    pub dest: PathBuf,
    /// Default output directory for rotation (TEMP).
    pub temp: PathBuf,
    /// `distkv` binary (DISTKV).
    pub distkv_bin: String,
    /// `systemctl` binary (SYSTEMCTL).
    pub systemctl: String,
    /// `systemd-sysusers` binary (SYSUSERS).
    pub sysusers: String,
    /// passwd database used to resolve the service user (PASSWD).
    pub passwd: PathBuf,
}

impl Config {
    /// Load configuration from the environment file and the process environment.
    ///
    /// A missing environment file is not an error; every key has a default.
    pub fn load(env_file: &Path) -> Result<Self> {
        // Environment variables override the file
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with(env_file, &env)
    }

    /// Load the environment file and overlay `overrides` on top of it.
    pub fn load_with(env_file: &Path, overrides: &HashMap<String, String>) -> Result<Self> {
        let mut vars = read_env_file(env_file)?;
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::from_vars(env_file, &vars)
    }

    /// Build a configuration from an explicit set of variables.
    ///
    /// Empty values count as unset, like `${VAR:-default}` in sh.
    pub fn from_vars(env_file: &Path, vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mode = match get("MODE") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Bad configuration in {}", env_file.display()))?,
            None => Mode::default(),
        };

        Ok(Self {
            env_file: env_file.to_path_buf(),
            mode,
            name: get("NAME").unwrap_or_else(hostname),
            dest: get("DEST")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST)),
            temp: get("TEMP")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            distkv_bin: get("DISTKV").unwrap_or_else(|| "distkv".to_string()),
            systemctl: get("SYSTEMCTL").unwrap_or_else(|| "systemctl".to_string()),
            sysusers: get("SYSUSERS").unwrap_or_else(|| "systemd-sysusers".to_string()),
            passwd: get("PASSWD")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/etc/passwd")),
        })
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  ENV FILE:  {}", self.env_file.display());
        println!("  MODE:      {}", self.mode);
        println!("  NAME:      {}", self.name);
        println!("  DEST:      {}", self.dest.display());
        println!("  TEMP:      {}", self.temp.display());
        println!("  DISTKV:    {}", self.distkv_bin);
        println!("  SYSTEMCTL: {}", self.systemctl);
        println!("  SYSUSERS:  {}", self.sysusers);
        println!("  PASSWD:    {}", self.passwd.display());
        if self.env_file.exists() {
            println!("  Env file: FOUND");
        } else {
            println!("  Env file: NOT FOUND (run 'distkv-admin init' to create it)");
        }
    }
}

/// Parse an environment file into a map. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }

    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("Failed to parse {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Defaults `init` seeds into a fresh environment file.
pub fn env_defaults() -> Vec<(&'static str, String)> {
    vec![("MODE", Mode::default().to_string()), ("NAME", hostname())]
}

/// Make sure every default key is present in the environment file.
///
/// Creates the file (and its parent) when missing and appends only the keys
/// it lacks; values already set are never rewritten. Returns the keys that
/// were written.
pub fn ensure_env_file(path: &Path, defaults: &[(&str, String)]) -> Result<Vec<String>> {
    let existing = read_env_file(path)?;
    let missing: Vec<&(&str, String)> = defaults
        .iter()
        .filter(|(key, _)| !existing.contains_key(*key))
        .collect();

    if missing.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let needs_newline = match fs::read(path) {
        Ok(bytes) => !bytes.is_empty() && !bytes.ends_with(b"\n"),
        Err(_) => false,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;

    let mut text = String::new();
    if needs_newline {
        text.push('\n');
    }
    for (key, value) in &missing {
        text.push_str(&format!("{}={}\n", key, value));
    }
    file.write_all(text.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(missing.iter().map(|(key, _)| key.to_string()).collect())
}

/// Best-effort host name, used as the default node name.
pub fn hostname() -> String {
    for candidate in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(name) = fs::read_to_string(candidate) {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    crate::process::Cmd::new("hostname")
        .run()
        .ok()
        .map(|r| r.stdout_trimmed().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("master".parse::<Mode>().unwrap(), Mode::Master);
        assert_eq!(" Slave\n".parse::<Mode>().unwrap(), Mode::Slave);
        let err = "replica".parse::<Mode>().unwrap_err();
        assert!(err.to_string().contains("replica"));
    }

    #[test]
    fn test_from_vars_defaults() {
        let cfg = Config::from_vars(Path::new("/etc/distkv.env"), &vars(&[("NAME", "n1")]))
            .unwrap();
        assert_eq!(cfg.mode, Mode::Master);
        assert_eq!(cfg.name, "n1");
        assert_eq!(cfg.dest, PathBuf::from(DEFAULT_DEST));
        assert_eq!(cfg.distkv_bin, "distkv");
        assert_eq!(cfg.passwd, PathBuf::from("/etc/passwd"));
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let cfg = Config::from_vars(
            Path::new("x.env"),
            &vars(&[("MODE", ""), ("DEST", "  "), ("NAME", "n1")]),
        )
        .unwrap();
        assert_eq!(cfg.mode, Mode::Master);
        assert_eq!(cfg.dest, PathBuf::from(DEFAULT_DEST));
    }

    #[test]
    fn test_bad_mode_is_an_error() {
        let err = Config::from_vars(Path::new("x.env"), &vars(&[("MODE", "primary")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("primary"));
    }

    #[test]
    fn test_read_env_file_parses_quotes_and_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("distkv.env");
        fs::write(&path, "# node settings\nMODE=slave\nNAME=\"node two\"\n").unwrap();

        let map = read_env_file(&path).unwrap();
        assert_eq!(map.get("MODE").map(String::as_str), Some("slave"));
        assert_eq!(map.get("NAME").map(String::as_str), Some("node two"));
    }

    #[test]
    fn test_ensure_env_file_creates_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/distkv.env");
        let defaults = vec![("MODE", "master".to_string()), ("NAME", "n1".to_string())];

        let written = ensure_env_file(&path, &defaults).unwrap();
        assert_eq!(written, vec!["MODE".to_string(), "NAME".to_string()]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "MODE=master\nNAME=n1\n");
    }

    #[test]
    fn test_ensure_env_file_keeps_existing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("distkv.env");
        fs::write(&path, "MODE=slave").unwrap();
        let defaults = vec![("MODE", "master".to_string()), ("NAME", "n1".to_string())];

        let written = ensure_env_file(&path, &defaults).unwrap();
        assert_eq!(written, vec!["NAME".to_string()]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "MODE=slave\nNAME=n1\n");

        // Second pass has nothing to add
        assert!(ensure_env_file(&path, &defaults).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "MODE=slave\nNAME=n1\n");
    }

    #[test]
    fn test_to_json_uses_lowercase_mode() {
        let cfg = Config::from_vars(
            Path::new("x.env"),
            &vars(&[("MODE", "slave"), ("NAME", "n1")]),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(json["mode"], "slave");
        assert_eq!(json["name"], "n1");
    }

    #[test]
    fn test_hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }
}
