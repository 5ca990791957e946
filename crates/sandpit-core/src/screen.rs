//! Textual import screening
//!
//! Looks for `import a, b.c as d` and `from a.b import c` statements and
//! compares each root module against a denylist. This is a pre-filter only:
//! names inside comments or strings can trip it, and dynamic imports
//! (`__import__`, `importlib` via attribute lookup) slip past it. Process
//! isolation in [`crate::sandbox`] is the actual boundary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Modules rejected by default: OS access, process spawning, networking and
/// low-level memory/FFI.
pub const DEFAULT_DENYLIST: &[&str] = &[
    // os / filesystem
    "os",
    "sys",
    "shutil",
    "pathlib",
    "io",
    "builtins",
    "importlib",
    // processes and threads
    "subprocess",
    "multiprocessing",
    "pty",
    "signal",
    "threading",
    "_thread",
    // networking
    "socket",
    "ssl",
    "http",
    "urllib",
    "ftplib",
    "telnetlib",
    "asyncio",
    // memory / ffi
    "ctypes",
    "cffi",
    "mmap",
    "resource",
    "gc",
];

// Both patterns accept a compound-statement header (`try:`, `if x:`, `else:`)
// in front of the import on the same line.
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|:)\s*import\s+(.+)$").expect("valid import regex")
});

static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|:)\s*from\s+(\S+)\s+import\b").expect("valid from regex")
});

/// Outcome of screening one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningVerdict {
    /// Denylisted root modules found, sorted and de-duplicated
    pub violations: BTreeSet<String>,
}

impl ScreeningVerdict {
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }

    /// Comma-separated violation list, for user-facing messages
    #[must_use]
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Denylist-based import screener
#[derive(Debug, Clone)]
pub struct Screener {
    denylist: HashSet<String>,
}

impl Default for Screener {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl Screener {
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denylist: denylist.into_iter().map(Into::into).collect(),
        }
    }

    /// Screen source text. Never fails.
    #[must_use]
    pub fn screen(&self, code: &str) -> ScreeningVerdict {
        let violations = imported_roots(code)
            .filter(|root| self.denylist.contains(*root))
            .map(str::to_string)
            .collect();

        ScreeningVerdict { violations }
    }
}

/// Root module names referenced by import statements in `code`
fn imported_roots(code: &str) -> impl Iterator<Item = &str> {
    code.lines()
        .flat_map(|line| line.split(';'))
        .map(str::trim)
        .flat_map(statement_roots)
}

fn statement_roots(stmt: &str) -> Vec<&str> {
    if let Some(caps) = FROM_RE.captures(stmt) {
        // Relative imports have an empty root and are skipped.
        return caps
            .get(1)
            .and_then(|m| root_of(m.as_str()))
            .into_iter()
            .collect();
    }

    if let Some(caps) = IMPORT_RE.captures(stmt) {
        return caps
            .get(1)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .filter_map(|item| item.split_whitespace().next())
                    .filter_map(root_of)
                    .collect()
            })
            .unwrap_or_default();
    }

    Vec::new()
}

fn root_of(path: &str) -> Option<&str> {
    let root = path
        .trim_matches(|c| c == '(' || c == ')')
        .split('.')
        .next()?;
    (!root.is_empty()).then_some(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsafe_with(code: &str) -> Vec<String> {
        Screener::default()
            .screen(code)
            .violations
            .into_iter()
            .collect()
    }

    #[test]
    fn test_plain_import_is_rejected() {
        assert_eq!(unsafe_with("import os"), vec!["os"]);
    }

    #[test]
    fn test_spacing_and_lists() {
        assert_eq!(unsafe_with("import  os,sys"), vec!["os", "sys"]);
        assert_eq!(unsafe_with("import math, socket as s"), vec!["socket"]);
        assert_eq!(unsafe_with("import\tctypes"), vec!["ctypes"]);
    }

    #[test]
    fn test_from_import_is_rejected() {
        assert_eq!(unsafe_with("from subprocess import run"), vec!["subprocess"]);
        assert_eq!(unsafe_with("from os.path import join"), vec!["os"]);
    }

    #[test]
    fn test_dotted_import_uses_root() {
        assert_eq!(unsafe_with("import urllib.request"), vec!["urllib"]);
    }

    #[test]
    fn test_indented_and_semicolon_statements() {
        let code = "def f():\n    import shutil\n    return 1\nx = 1; import pty";
        assert_eq!(unsafe_with(code), vec!["pty", "shutil"]);
    }

    #[test]
    fn test_import_after_compound_header() {
        assert_eq!(unsafe_with("try: import os\nexcept ImportError: pass"), vec!["os"]);
        assert_eq!(unsafe_with("if True: import socket"), vec!["socket"]);
        assert_eq!(unsafe_with("while 1: import ctypes; break"), vec!["ctypes"]);
        assert_eq!(unsafe_with("if x: from subprocess import run"), vec!["subprocess"]);
        assert_eq!(unsafe_with("if x:\n    pass\nelse:import pty"), vec!["pty"]);
    }

    #[test]
    fn test_import_word_inside_expression_is_ignored() {
        assert!(Screener::default().screen("important = 1\nimport_os = 2").is_safe());
        assert!(Screener::default().screen("d = {'k': important}").is_safe());
    }

    #[test]
    fn test_safe_code() {
        let verdict = Screener::default().screen("import math\nprint(math.sqrt(4))");
        assert!(verdict.is_safe());
        assert!(Screener::default().screen("print(\"hello world\")").is_safe());
        assert!(Screener::default().screen("").is_safe());
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        assert!(Screener::default().screen("import OS").is_safe());
        assert!(Screener::default().screen("import osmosis").is_safe());
        assert!(Screener::default().screen("from systemd import x").is_safe());
    }

    #[test]
    fn test_relative_imports_ignored() {
        assert!(Screener::default().screen("from . import os").is_safe());
        assert!(Screener::default().screen("from .os import path").is_safe());
    }

    #[test]
    fn test_import_in_comment_is_flagged() {
        // Textual screen: comment text that starts a line still matches.
        assert!(!Screener::default().screen("# nothing\nimport os  # why").is_safe());
    }

    #[test]
    fn test_custom_denylist() {
        let screener = Screener::new(["math"]);
        assert!(!screener.screen("import math").is_safe());
        assert!(screener.screen("import os").is_safe());
    }

    #[test]
    fn test_describe_is_sorted() {
        let verdict = Screener::default().screen("import sys\nimport os\nimport sys");
        assert_eq!(verdict.describe(), "os, sys");
    }
}
