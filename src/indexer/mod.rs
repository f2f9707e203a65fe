// Indexing coordination: run exclusion, worker dispatch, change detection

pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{index_db_path, Config};
use crate::error::{Error, Result};
use crate::index::db::IndexDatabase;
use crate::index::{FileRecord, IndexStatus};
use self::walker::CandidateFile;

/// Progress callback: (processed, total, current file label).
///
/// Best-effort telemetry, never synchronized with storage commits.
pub type ProgressFn = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Label carried by the final progress callback of a run.
pub const PROGRESS_DONE: &str = "<complete>";

/// Runs of at most this many files report every completion.
const PROGRESS_EVERY_FILE_LIMIT: usize = 100;
/// Larger runs report every Nth completion, plus the first and last.
const PROGRESS_SAMPLE_EVERY: usize = 10;
/// Returned by `estimate_files` when enumeration itself fails, so callers
/// sizing progress bars never divide by zero.
const FALLBACK_ESTIMATE: usize = 100;

/// Options for one indexing run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Reprocess every enumerated file regardless of fingerprint match.
    pub force: bool,
    /// Per-run override of the configured file size ceiling.
    pub max_file_size: Option<u64>,
}

/// Counters aggregated over one run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexOutcome {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub symbols_indexed: usize,
    pub duration_ms: u64,
}

impl IndexOutcome {
    fn processed(&self) -> usize {
        self.files_indexed + self.files_unchanged + self.files_failed
    }
}

enum FileResult {
    Indexed { symbols: usize },
    Unchanged,
    Failed,
}

/// Owns the worker pool and the at-most-one-concurrent-run policy.
///
/// The coordinator itself is single-threaded control logic: it dispatches
/// files to blocking workers and aggregates their results. All blocking
/// work (file reads, storage commits) happens inside the workers, each of
/// which checks out its own pooled connection.
pub struct IndexCoordinator {
    db: IndexDatabase,
    config: Arc<Config>,
    root: PathBuf,
    running: Arc<Mutex<bool>>,
    cancel: Arc<AtomicBool>,
}

/// Clears the running flag on every exit path.
struct RunGuard {
    flag: Arc<Mutex<bool>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.flag.lock() = false;
    }
}

impl IndexCoordinator {
    pub fn new(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let db = IndexDatabase::open(index_db_path(&root))?;
        Ok(Self {
            db,
            config: Arc::new(config),
            root,
            running: Arc::new(Mutex::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn db(&self) -> &IndexDatabase {
        &self.db
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Request cooperative cancellation of the current run. Checked between
    /// file dispatches.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Index the workspace. Returns `Error::RunInProgress` when a run is
    /// already active instead of queueing or blocking.
    pub async fn index_workspace(
        &self,
        opts: IndexOptions,
        progress: Option<ProgressFn>,
    ) -> Result<IndexOutcome> {
        let guard = self.begin_run()?;
        self.cancel.store(false, Ordering::SeqCst);

        let result = self.run_locked(opts, progress.clone()).await;

        if let Err(e) = &result {
            // One last progress signal carrying the error text, then the
            // guard clears the in-progress flag
            if let Some(cb) = &progress {
                cb(0, 0, &format!("error: {}", e));
            }
        }
        drop(guard);
        result
    }

    fn begin_run(&self) -> Result<RunGuard> {
        let mut running = self.running.lock();
        if *running {
            return Err(Error::RunInProgress);
        }
        *running = true;
        Ok(RunGuard {
            flag: self.running.clone(),
        })
    }

    async fn run_locked(
        &self,
        opts: IndexOptions,
        progress: Option<ProgressFn>,
    ) -> Result<IndexOutcome> {
        let started = Instant::now();

        let since = if opts.force {
            None
        } else {
            self.db.last_run_timestamp()?
        };

        let mut config = (*self.config).clone();
        if let Some(limit) = opts.max_file_size {
            config.indexing.max_file_size = limit;
        }

        let candidates = walker::enumerate(&self.root, &config, since)?;
        let total = candidates.len();
        info!(total, force = opts.force, "starting indexing run");

        if let Some(cb) = &progress {
            cb(0, total, "");
        }

        let workers = config.performance.threads.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks: JoinSet<(String, FileResult)> = JoinSet::new();
        let mut outcome = IndexOutcome {
            files_seen: total,
            ..Default::default()
        };

        let mut cancelled = false;
        for file in candidates {
            if self.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::internal(e.to_string()))?;
            let db = self.db.clone();
            let force = opts.force;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let label = file.rel_path.clone();
                let result = index_one(&db, &file, force);
                (label, result)
            });

            while let Some(joined) = tasks.try_join_next() {
                absorb(joined, &mut outcome, total, &progress);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            absorb(joined, &mut outcome, total, &progress);
        }

        let finished_at = chrono::Utc::now().timestamp();
        self.db.record_run(finished_at)?;

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        if cancelled {
            info!(
                processed = outcome.processed(),
                total, "indexing run cancelled"
            );
        } else {
            info!(
                files_indexed = outcome.files_indexed,
                files_unchanged = outcome.files_unchanged,
                files_failed = outcome.files_failed,
                symbols = outcome.symbols_indexed,
                duration_ms = outcome.duration_ms,
                "indexing run complete"
            );
        }

        if let Some(cb) = &progress {
            cb(outcome.processed(), total, PROGRESS_DONE);
        }

        Ok(outcome)
    }

    /// Count candidate files without parsing anything, for upfront sizing.
    pub fn estimate_files(&self) -> usize {
        match walker::enumerate(&self.root, &self.config, None) {
            Ok(files) => files.len(),
            Err(e) => {
                warn!(error = %e, "enumeration failed, using fallback estimate");
                FALLBACK_ESTIMATE
            }
        }
    }

    /// Delete the whole index. Rejected while a run is active.
    pub fn clear_index(&self) -> Result<()> {
        let running = self.running.lock();
        if *running {
            return Err(Error::RunInProgress);
        }
        self.db.clear()
    }

    pub fn status(&self) -> Result<IndexStatus> {
        let (last_indexed, file_count, symbol_count) = self.db.status()?;
        Ok(IndexStatus {
            last_indexed,
            file_count,
            symbol_count,
            indexing_in_progress: self.is_running(),
        })
    }
}

fn absorb(
    joined: std::result::Result<(String, FileResult), tokio::task::JoinError>,
    outcome: &mut IndexOutcome,
    total: usize,
    progress: &Option<ProgressFn>,
) {
    let (label, result) = match joined {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "worker task failed");
            (String::new(), FileResult::Failed)
        }
    };

    match result {
        FileResult::Indexed { symbols } => {
            outcome.files_indexed += 1;
            outcome.symbols_indexed += symbols;
        }
        FileResult::Unchanged => outcome.files_unchanged += 1,
        FileResult::Failed => outcome.files_failed += 1,
    }

    let processed = outcome.processed();
    if let Some(cb) = progress {
        if should_report(processed, total) {
            cb(processed, total, &label);
        }
    }
}

fn should_report(processed: usize, total: usize) -> bool {
    processed == 1
        || processed == total
        || total <= PROGRESS_EVERY_FILE_LIMIT
        || processed % PROGRESS_SAMPLE_EVERY == 0
}

/// Process one file inside a worker: fingerprint, compare, parse, persist.
/// Every failure here is logged and reported as a skip; a bad file never
/// aborts the run.
fn index_one(db: &IndexDatabase, file: &CandidateFile, force: bool) -> FileResult {
    let content = match std::fs::read_to_string(&file.path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %file.rel_path, error = %e, "skipping unreadable file");
            return FileResult::Failed;
        }
    };

    let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
    let now = chrono::Utc::now().timestamp();

    if !force {
        match db.file_fingerprint(&file.rel_path) {
            Ok(Some(existing)) if existing == hash => {
                if let Err(e) = db.touch_file(&file.rel_path, now) {
                    warn!(path = %file.rel_path, error = %e, "failed to touch file row");
                }
                return FileResult::Unchanged;
            }
            Ok(_) => {}
            Err(e) => {
                // Treat as changed and fall through to a full upsert
                warn!(path = %file.rel_path, error = %e, "fingerprint lookup failed");
            }
        }
    }

    let parsed = match file.language.parse(&content, &file.rel_path) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(path = %file.rel_path, error = %e, "parse failed, file skipped");
            return FileResult::Failed;
        }
    };

    let record = FileRecord {
        path: file.rel_path.clone(),
        language: file.language.tag().to_string(),
        size_bytes: file.size_bytes,
        mtime: file.mtime,
        content_hash: hash,
        last_indexed: now,
    };
    let deps = parsed.dependencies();

    match db.upsert_file(&record, &parsed.symbols, &deps) {
        Ok(_) => {
            debug!(
                path = %file.rel_path,
                symbols = parsed.symbols.len(),
                "indexed file"
            );
            FileResult::Indexed {
                symbols: parsed.symbols.len(),
            }
        }
        Err(e) => {
            warn!(path = %file.rel_path, error = %e, "failed to persist file");
            FileResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn coordinator(root: &TempDir) -> IndexCoordinator {
        IndexCoordinator::new(root.path(), Config::default()).unwrap()
    }

    async fn force_index(coord: &IndexCoordinator) -> IndexOutcome {
        coord
            .index_workspace(
                IndexOptions {
                    force: true,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_file_scenario() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def add(x, y):\n    return x + y\n").unwrap();
        let coord = coordinator(&dir);

        let outcome = force_index(&coord).await;
        assert_eq!(outcome.files_seen, 1);
        assert_eq!(outcome.files_indexed, 1);
        assert_eq!(outcome.symbols_indexed, 1);

        let status = coord.status().unwrap();
        assert_eq!(status.file_count, 1);
        assert_eq!(status.symbol_count, 1);
        assert!(!status.indexing_in_progress);
        assert!(status.last_indexed.is_some());

        let symbols = coord.db().file_symbols("a.py").unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "add");
        assert_eq!((symbols[0].line_start, symbols[0].line_end), (1, 2));

        let hits = coord.db().search_symbols("ad", None, None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "add");

        coord.clear_index().unwrap();
        let status = coord.status().unwrap();
        assert_eq!(status.file_count, 0);
        assert_eq!(status.symbol_count, 0);
    }

    #[tokio::test]
    async fn test_unforced_rerun_reparses_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();
        let coord = coordinator(&dir);

        let first = force_index(&coord).await;
        assert_eq!(first.files_indexed, 2);
        let status_before = coord.status().unwrap();

        let second = coord
            .index_workspace(IndexOptions::default(), None)
            .await
            .unwrap();
        // Unchanged files are either pre-filtered by mtime or detected by
        // fingerprint; neither path re-parses or rewrites symbols
        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.files_failed, 0);

        let status_after = coord.status().unwrap();
        assert_eq!(status_before.file_count, status_after.file_count);
        assert_eq!(status_before.symbol_count, status_after.symbol_count);
    }

    #[tokio::test]
    async fn test_changed_file_rows_are_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(
            &path,
            "def one():\n    pass\n\ndef two():\n    pass\n\ndef three():\n    pass\n",
        )
        .unwrap();
        let coord = coordinator(&dir);

        force_index(&coord).await;
        assert_eq!(coord.db().file_symbols("a.py").unwrap().len(), 3);

        fs::write(&path, "def one():\n    pass\n").unwrap();
        let outcome = coord
            .index_workspace(IndexOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(outcome.files_indexed, 1);

        let symbols = coord.db().file_symbols("a.py").unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "one");
    }

    #[tokio::test]
    async fn test_forced_run_reprocesses_everything() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();
        let coord = coordinator(&dir);

        force_index(&coord).await;
        let again = force_index(&coord).await;
        assert_eq!(again.files_indexed, 2);
        assert_eq!(again.files_unchanged, 0);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        let coord = coordinator(&dir);

        force_index(&coord).await;
        let status_before = coord.status().unwrap();

        let _guard = coord.begin_run().unwrap();
        let err = coord
            .index_workspace(IndexOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RunInProgress));

        let err = coord.clear_index().unwrap_err();
        assert!(matches!(err, Error::RunInProgress));

        drop(_guard);
        let status_after = coord.status().unwrap();
        assert_eq!(status_before.file_count, status_after.file_count);
        assert_eq!(status_before.symbol_count, status_after.symbol_count);
        assert!(!coord.is_running());
    }

    #[tokio::test]
    async fn test_vanished_file_rows_are_retained() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();
        let coord = coordinator(&dir);

        force_index(&coord).await;
        fs::remove_file(dir.path().join("b.py")).unwrap();
        force_index(&coord).await;

        // Deletions are not detected; rows persist until an explicit clear
        let status = coord.status().unwrap();
        assert_eq!(status.file_count, 2);
        assert_eq!(coord.db().file_symbols("b.py").unwrap().len(), 1);

        coord.clear_index().unwrap();
        assert!(coord.db().file_symbols("b.py").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dependency_edges() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "import util\n\ndef a():\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();
        let coord = coordinator(&dir);

        force_index(&coord).await;

        assert_eq!(coord.db().dependencies_of("a.py").unwrap(), vec!["util"]);
        assert!(coord
            .db()
            .dependents_of("util")
            .unwrap()
            .contains(&"a.py".to_string()));
        assert!(coord.db().dependencies_of("b.py").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_callbacks() {
        let dir = tempdir().unwrap();
        for i in 0..3 {
            fs::write(
                dir.path().join(format!("f{}.py", i)),
                "def f():\n    pass\n",
            )
            .unwrap();
        }
        let coord = coordinator(&dir);

        let calls: Arc<Mutex<Vec<(usize, usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let progress: ProgressFn =
            Arc::new(move |done, total, label| sink.lock().push((done, total, label.to_string())));

        coord
            .index_workspace(
                IndexOptions {
                    force: true,
                    ..Default::default()
                },
                Some(progress),
            )
            .await
            .unwrap();

        let calls = calls.lock();
        assert_eq!(calls.first().unwrap(), &(0, 3, String::new()));
        let last = calls.last().unwrap();
        assert_eq!((last.0, last.1), (3, 3));
        assert_eq!(last.2, PROGRESS_DONE);
        // Small runs report every completion
        assert_eq!(calls.len(), 5);
    }

    #[tokio::test]
    async fn test_bad_file_does_not_abort_run() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.py"), "def ok():\n    pass\n").unwrap();
        // Invalid UTF-8 fails the content read for that file only
        fs::write(dir.path().join("junk.py"), [0xff, 0xfe, 0x00, 0x41]).unwrap();
        let coord = coordinator(&dir);

        let outcome = force_index(&coord).await;
        assert_eq!(outcome.files_failed, 1);
        assert_eq!(outcome.files_indexed, 1);
        assert_eq!(coord.db().file_symbols("ok.py").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_failure_reports_error_and_clears_flag() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        let coord = coordinator(&dir);

        // Pull the workspace out from under the coordinator
        fs::remove_dir_all(dir.path()).unwrap();

        let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let progress: ProgressFn =
            Arc::new(move |_, _, label| sink.lock().push(label.to_string()));

        let err = coord
            .index_workspace(IndexOptions::default(), Some(progress))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!coord.is_running());
        assert!(calls.lock().iter().any(|l| l.starts_with("error: ")));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_clears_flag_and_keeps_index_usable() {
        let dir = tempdir().unwrap();
        for i in 0..8 {
            fs::write(
                dir.path().join(format!("f{}.py", i)),
                "def f():\n    pass\n",
            )
            .unwrap();
        }
        let coord = Arc::new(coordinator(&dir));

        // The initial 0/total callback fires before any dispatch, so the
        // whole run is skipped cooperatively
        let for_cancel = coord.clone();
        let progress: ProgressFn = Arc::new(move |_, _, _| for_cancel.cancel());
        let outcome = coord
            .index_workspace(
                IndexOptions {
                    force: true,
                    ..Default::default()
                },
                Some(progress),
            )
            .await
            .unwrap();

        assert_eq!(outcome.files_seen, 8);
        assert_eq!(outcome.files_indexed, 0);
        assert!(!coord.is_running());

        // A fresh run afterwards processes everything
        let outcome = force_index(&coord).await;
        assert_eq!(outcome.files_indexed, 8);
    }

    #[tokio::test]
    async fn test_estimate_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("b.js"), "let x = 1;\n").unwrap();
        fs::write(dir.path().join("c.txt"), "not code\n").unwrap();
        let coord = coordinator(&dir);

        assert_eq!(coord.estimate_files(), 2);

        fs::remove_dir_all(dir.path()).unwrap();
        assert_eq!(coord.estimate_files(), 100);
    }
}
