//! Shared test utilities for distkv-admin tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Temporary node: state root, env file, passwd and mock system tools.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// DEST: root of dated state directories
    pub dest: PathBuf,
    /// TEMP: default rotation output directory
    pub temp: PathBuf,
    /// Environment file (not created up front)
    pub env_file: PathBuf,
    /// passwd mapping `distkv` to the current user
    pub passwd: PathBuf,
    /// Directory holding the mock binaries and their call logs
    pub bin: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with working mock tools.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let dest = base.join("var/lib/distkv");
        let temp = base.join("tmp");
        let bin = base.join("bin");
        let env_file = base.join("etc/distkv.env");
        let passwd = base.join("etc/passwd");

        fs::create_dir_all(&temp).expect("Failed to create temp dir");
        fs::create_dir_all(&bin).expect("Failed to create bin dir");
        fs::create_dir_all(base.join("etc")).expect("Failed to create etc dir");

        // SAFETY: getuid/getgid cannot fail
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        fs::write(
            &passwd,
            format!(
                "root:x:0:0:root:/root:/bin/bash\ndistkv:x:{}:{}:DistKV:/var/lib/distkv:/usr/sbin/nologin\n",
                uid, gid
            ),
        )
        .expect("Failed to create passwd");

        let env = Self {
            _temp_dir: temp_dir,
            dest,
            temp,
            env_file,
            passwd,
            bin,
        };

        env.install_tool(
            "distkv",
            "[ \"$1\" = dump ] && [ \"$2\" = init ] || exit 2\nprintf 'snapshot for %s\\n' \"$3\" > \"$4\"\n",
        );
        env.install_tool("systemctl", "exit 0\n");
        env.install_tool("systemd-sysusers", "exit 0\n");
        env
    }

    /// Write a mock tool that logs its arguments to `<name>.log`, then runs `body`.
    pub fn install_tool(&self, name: &str, body: &str) {
        let log = self.log_path(name);
        let script = format!("#!/bin/sh\necho \"$@\" >> '{}'\n{}", log.display(), body);
        create_mock_binary(&self.bin.join(name), &script);
    }

    pub fn tool(&self, name: &str) -> String {
        self.bin.join(name).display().to_string()
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.bin.join(format!("{}.log", name))
    }

    /// Lines a mock tool was called with (empty if never called).
    pub fn calls(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.log_path(name))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Variables pointing distkv-admin at this environment.
    pub fn overrides(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("DEST".to_string(), self.dest.display().to_string());
        vars.insert("TEMP".to_string(), self.temp.display().to_string());
        vars.insert("PASSWD".to_string(), self.passwd.display().to_string());
        vars.insert("DISTKV".to_string(), self.tool("distkv"));
        vars.insert("SYSTEMCTL".to_string(), self.tool("systemctl"));
        vars.insert("SYSUSERS".to_string(), self.tool("systemd-sysusers"));
        vars
    }

    /// Write a file under DEST, creating its state directory.
    pub fn write_state(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.dest.join(relative);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create state dir");
        fs::write(&path, content).expect("Failed to write state file");
        path
    }
}

/// Create a mock executable script.
pub fn create_mock_binary(path: &Path, script: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for binary");
    }
    fs::write(path, script).expect("Failed to create mock binary");

    let mut perms = fs::metadata(path).expect("Failed to get metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

/// Poll `path` until it contains `needle` (background commands).
pub fn wait_for_contents(path: &Path, needle: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if fs::read_to_string(path)
            .map(|s| s.contains(needle))
            .unwrap_or(false)
        {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}
