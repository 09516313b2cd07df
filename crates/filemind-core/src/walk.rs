//! Directory traversal shared by the indexing pipeline and the keyword scan.
//!
//! Counting policy: entries marked `skippable` (hidden names, paths under an
//! excluded directory) never count toward `total_files` or `files_processed`.
//! Every other regular file counts toward both, whatever its extraction
//! outcome turns out to be.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".cache",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkRules {
    pub excluded_dirs: Vec<String>,
}

impl Default for WalkRules {
    fn default() -> Self {
        Self { excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect() }
    }
}

impl WalkRules {
    pub fn new(excluded_dirs: Vec<String>) -> Self {
        Self { excluded_dirs }
    }

    pub fn is_hidden(name: &OsStr) -> bool {
        name.to_str().is_some_and(|s| s.starts_with('.'))
    }

    pub fn has_excluded_segment(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(seg) => self.excluded_dirs.iter().any(|ex| OsStr::new(ex) == seg),
            _ => false,
        })
    }

    /// Only the part of `path` below `root` is checked for excluded
    /// segments, so a root that itself lives under `build/` still walks.
    pub fn is_skippable(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        path.file_name().is_some_and(Self::is_hidden) || self.has_excluded_segment(relative)
    }

    fn prune(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && (Self::is_hidden(entry.file_name())
                || self.excluded_dirs.iter().any(|ex| OsStr::new(ex) == entry.file_name()))
    }
}

/// One regular file reachable from a walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub size: u64,
    pub skippable: bool,
}

/// Every regular file under `root`, in file-name order, without following
/// symbolic links. Hidden and excluded directories are not descended into.
pub fn walk_directory(root: &Path, rules: &WalkRules) -> Vec<WalkEntry> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !rules.prune(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let skippable = rules.is_skippable(root, entry.path());
        entries.push(WalkEntry { path: entry.into_path(), size, skippable });
    }
    entries
}

/// Absolute, symlink-free form of a walk root, or the root unchanged when it
/// cannot be resolved.
pub fn canonical_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Non-skippable files across all `roots`, in root order.
///
/// Roots are canonicalized first, so every file has one spelling no matter
/// how its directory was named, and a file reachable from several
/// (overlapping or repeated) roots is listed once.
pub fn collect_files(roots: &[PathBuf], rules: &WalkRules) -> Vec<WalkEntry> {
    let mut files = Vec::new();
    let mut seen_paths = HashSet::new();
    for root in roots {
        if !root.exists() {
            warn!(root = %root.display(), "directory does not exist");
            continue;
        }
        let root = canonical_root(root);
        let entries = walk_directory(&root, rules);
        let seen = entries.len();
        let kept_before = files.len();
        files.extend(
            entries
                .into_iter()
                .filter(|e| !e.skippable && seen_paths.insert(e.path.clone())),
        );
        debug!(root = %root.display(), seen, kept = files.len() - kept_before, "walked directory");
    }
    files
}

/// Platform-independent form of a path: forward slashes only.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Display name of a file (its final component).
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| normalize_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_segment_matches_whole_components_only() {
        let rules = WalkRules::default();
        assert!(rules.has_excluded_segment(Path::new("/home/u/proj/node_modules/x/index.js")));
        assert!(!rules.has_excluded_segment(Path::new("/home/u/node_modules_backup/a.txt")));
    }

    #[test]
    fn hidden_names_are_skippable() {
        let rules = WalkRules::default();
        assert!(rules.is_skippable(Path::new("/docs"), Path::new("/docs/.DS_Store")));
        assert!(!rules.is_skippable(Path::new("/docs"), Path::new("/docs/notes.md")));
    }

    #[test]
    fn excluded_ancestors_of_the_root_do_not_count() {
        let rules = WalkRules::default();
        let root = Path::new("/home/u/build/reports");
        assert!(!rules.is_skippable(root, Path::new("/home/u/build/reports/q3.txt")));
        assert!(rules.is_skippable(root, Path::new("/home/u/build/reports/dist/q3.txt")));
    }

    #[test]
    fn normalize_uses_forward_slashes() {
        assert_eq!(normalize_path(Path::new("a\\b\\c.txt")), "a/b/c.txt");
    }
}
