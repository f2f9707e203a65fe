//! Workspace enumeration and cheap change pre-filtering.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Result;
use crate::parsers::Language;

/// A file selected for processing by a run.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub rel_path: String,
    pub mtime: i64,
    pub size_bytes: u64,
    pub language: Language,
}

/// Enumerate candidate files under `root`.
///
/// Ignored directories are pruned before descent, so dependency trees are
/// never walked. When `since` is set, files whose mtime predates it are
/// skipped before any content read; the content fingerprint computed by the
/// worker stays the authoritative change signal, since mtime can move
/// without an edit or the content may have reverted. Enumeration order is
/// not significant.
pub fn enumerate(root: &Path, config: &Config, since: Option<i64>) -> Result<Vec<CandidateFile>> {
    // Fail the run up front when the root itself is unreadable
    std::fs::metadata(root)?;

    let max_size = config.indexing.max_file_size;
    let mut files = Vec::new();
    let mut skipped_size = 0usize;
    let mut skipped_mtime = 0usize;

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored(e, &config.indexing.ignore_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "error walking workspace");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let language = Language::from_path(entry.path());
        if !language.is_supported() {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "unreadable metadata, skipping");
                continue;
            }
        };
        if meta.len() > max_size {
            skipped_size += 1;
            continue;
        }

        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        if let Some(ts) = since {
            if mtime < ts {
                skipped_mtime += 1;
                continue;
            }
        }

        files.push(CandidateFile {
            rel_path: relative_path(root, entry.path()),
            path: entry.path().to_path_buf(),
            mtime,
            size_bytes: meta.len(),
            language,
        });
    }

    debug!(
        candidates = files.len(),
        skipped_size, skipped_mtime, "workspace enumeration complete"
    );

    Ok(files)
}

/// Directories never descended into: hidden directories plus the configured
/// ignore set (version control, dependencies, build output, caches).
fn is_ignored(entry: &DirEntry, ignore_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    ignore_dirs.iter().any(|d| name == d.as_str())
}

/// Workspace-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_enumerate_filters_and_prunes() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::create_dir(root.join("src")).unwrap();
        fs::write(root.join("src/a.py"), "def a():\n    pass\n").unwrap();
        fs::write(root.join("src/app.js"), "function f() {}\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();

        fs::create_dir(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules/pkg.js"), "module.exports = {};\n").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.py"), "x = 1\n").unwrap();

        let config = Config::default();
        let files = enumerate(root, &config, None).unwrap();
        let mut rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        rels.sort();

        assert_eq!(rels, vec!["src/a.py", "src/app.js"]);
    }

    #[test]
    fn test_size_ceiling_excludes_large_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("big.py"), "#".repeat(4096)).unwrap();
        fs::write(root.join("small.py"), "x = 1\n").unwrap();

        let mut config = Config::default();
        config.indexing.max_file_size = 1024;

        let files = enumerate(root, &config, None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "small.py");
    }

    #[test]
    fn test_mtime_prefilter_skips_old_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.py"), "x = 1\n").unwrap();

        let config = Config::default();
        let far_future = chrono::Utc::now().timestamp() + 3600;
        let files = enumerate(root, &config, Some(far_future)).unwrap();
        assert!(files.is_empty());

        let files = enumerate(root, &config, Some(0)).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(enumerate(&missing, &Config::default(), None).is_err());
    }
}
