//! Read-only access to the Linux `/proc`, `/sys` and `/etc` trees.
//!
//! Rooted at a configurable directory so probes can be exercised against a
//! fixture tree instead of the live host.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    /// Filesystem rooted at `/`.
    pub fn host() -> Self {
        Self::new("/")
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    pub fn read(&self, rel: &str) -> io::Result<String> {
        fs::read_to_string(self.path(rel))
    }

    /// First line of a file, trimmed. Suits single-value files like `ifindex`.
    pub fn read_value(&self, rel: &str) -> io::Result<String> {
        Ok(self.read(rel)?.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Entry names of a directory, sorted.
    pub fn list(&self, rel: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path(rel))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Number of numeric entries under `proc/`, i.e. live processes.
    pub fn process_count(&self) -> io::Result<usize> {
        Ok(self
            .list("proc")?
            .iter()
            .filter(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
            .count())
    }
}

/// Parse `Key: value` lines (`/proc/meminfo`, one `/proc/cpuinfo` block).
pub fn parse_colon_pairs(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Parse `KEY=value` lines (`/etc/os-release`), unquoting values.
pub fn parse_env_pairs(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').to_string()))
        .collect()
}

/// Parse a meminfo value such as `16303428 kB` into bytes.
pub fn parse_kib(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let number: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some(unit) if unit.eq_ignore_ascii_case("kb") => Some(number * 1024),
        Some(_) => None,
        None => Some(number),
    }
}
