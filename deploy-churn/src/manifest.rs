//! Manifest types and the plain-text manifest format.
//!
//! A manifest records every file of a client asset tree with its byte size.
//! On the wire it is one `<size>  <path>` line per file, sorted, newline
//! terminated. The same text is stored remotely as the deploy baseline, so the
//! format must stay readable by every future version of this crate.

use std::collections::BTreeMap;

/// Asset path (`./`-prefixed, forward slashes) to byte size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    files: BTreeMap<String, u64>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file, replacing any previous size for the same path.
    pub fn insert(&mut self, path: impl Into<String>, size: u64) {
        self.files.insert(path.into(), size);
    }

    pub fn get(&self, path: &str) -> Option<u64> {
        self.files.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all recorded sizes, `None` if it does not fit in a `u64`
    pub fn total_bytes(&self) -> Option<u64> {
        self.files.values().try_fold(0u64, |total, size| total.checked_add(*size))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.files.iter().map(|(path, size)| (path.as_str(), *size))
    }
}

impl<P: Into<String>> FromIterator<(P, u64)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (P, u64)>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for (path, size) in iter {
            manifest.insert(path, size);
        }
        manifest
    }
}

/// Render a manifest as text.
///
/// Lines are sorted as whole strings (not by path), joined by `\n`, and the
/// result ends with `\n` unless the manifest is empty.
pub fn serialize(manifest: &Manifest) -> String {
    let mut lines: Vec<String> = manifest
        .iter()
        .map(|(path, size)| format!("{}  {}", size, path))
        .collect();
    lines.sort();

    if lines.is_empty() {
        return String::new();
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Parse manifest text.
///
/// Never fails: blank lines, lines whose size is not a non-negative integer
/// and lines without a path are skipped. A path listed twice keeps its last
/// size.
pub fn parse(text: &str) -> Manifest {
    let mut manifest = Manifest::new();

    for raw in text.split('\n') {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let Some((size_token, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let path = rest.trim_start();
        if path.is_empty() {
            continue;
        }

        match size_token.parse::<u64>() {
            Ok(size) => manifest.insert(path, size),
            Err(_) => continue,
        }
    }

    manifest
}
