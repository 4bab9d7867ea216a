// Ignore patterns for bulk folder uploads, read from a per-directory
// `.colander_ignore` file (one glob per line, `#` comments).

use crate::error::Result;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const IGNORE_FILE_NAME: &str = ".colander_ignore";

/// Patterns ignored even without an ignore file.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    IGNORE_FILE_NAME,
    "*.metadata.json",
    "*.pid",
    "*.tsr",
    "*.tsq",
    "*.crt",
    "*.pem",
    "*.md",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

pub struct IgnoreFile {
    ignore_file_path: PathBuf,
    // BTreeSet keeps `persist` output stable between runs.
    patterns: BTreeSet<String>,
    compiled: Vec<Pattern>,
}

impl IgnoreFile {
    /// Load the ignore file that governs `path`: the one inside it when `path`
    /// is a directory, the one next to it when `path` is a file.
    pub fn load(path: &Path) -> Result<Self> {
        let ignore_file_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).join(IGNORE_FILE_NAME)
        } else {
            path.join(IGNORE_FILE_NAME)
        };
        let mut ignore = IgnoreFile {
            ignore_file_path,
            patterns: BTreeSet::new(),
            compiled: Vec::new(),
        };
        for pattern in DEFAULT_IGNORE_PATTERNS {
            ignore.add_pattern(pattern)?;
        }
        if ignore.ignore_file_path.is_file() {
            // read_to_string fails on non-UTF-8 content, which we surface
            let content = std::fs::read_to_string(&ignore.ignore_file_path)?;
            for line in content.lines() {
                if line.starts_with('#') || line.trim().is_empty() {
                    continue;
                }
                let pattern = line.trim();
                if let Err(e) = ignore.add_pattern(pattern) {
                    warn!(pattern = %pattern, error = %e, "skipping ignore pattern");
                }
            }
        }
        Ok(ignore)
    }

    pub fn ignore_file_path(&self) -> &Path {
        &self.ignore_file_path
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    /// True when the file name or the full path matches any pattern.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let full = path.to_string_lossy();
        self.compiled.iter().any(|p| {
            p.matches_with(&name, MATCH_OPTIONS) || p.matches_with(&full, MATCH_OPTIONS)
        })
    }

    /// Add a pattern in memory only; call `persist` to write it out.
    /// Fails with `Error::Pattern` when `pattern` is not a valid glob
    /// (e.g. `**.log`).
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        let compiled = Pattern::new(pattern)?;
        if self.patterns.insert(pattern.to_string()) {
            self.compiled.push(compiled);
        }
        Ok(())
    }

    /// Overwrite the ignore file with every pattern currently held.
    pub fn persist(&self) -> Result<()> {
        let mut out = String::new();
        for pattern in &self.patterns {
            out.push_str(pattern);
            out.push('\n');
        }
        std::fs::write(&self.ignore_file_path, out)?;
        Ok(())
    }
}
