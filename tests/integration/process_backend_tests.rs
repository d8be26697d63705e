use super::support::worker_program;
use dupesweep::pool::{build_pool, PoolBackend, ProcessPool, WorkerPool};
use dupesweep::progress::ProgressCallback;
use dupesweep::scanner::{DigestAlgorithm, HashError, Hasher};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

#[derive(Default)]
struct Counter {
    completed: AtomicUsize,
}

impl ProgressCallback for Counter {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    fn on_progress(&self, _current: usize, _path: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_phase_end(&self, _phase: &str) {}
}

fn files(count: usize) -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempdir().unwrap();
    let paths = (0..count)
        .map(|i| {
            let path = dir.path().join(format!("f{i:03}"));
            fs::write(&path, format!("content {}", i % 4)).unwrap();
            path
        })
        .collect();
    (dir, paths)
}

#[test]
fn test_process_pool_matches_local_hashing() {
    let (_dir, paths) = files(25);
    let hasher = Hasher::new();
    let pool = ProcessPool::new(3, worker_program());

    let outcomes = pool.hash_all(&paths, &hasher, None);

    assert_eq!(outcomes.len(), paths.len());
    for outcome in &outcomes {
        let expected = hasher.hash_file(&outcome.path).unwrap();
        assert_eq!(outcome.result.as_ref().unwrap(), &expected);
    }
    let seen: BTreeSet<_> = outcomes.iter().map(|o| o.path.clone()).collect();
    assert_eq!(seen, paths.iter().cloned().collect());
}

#[test]
fn test_process_pool_forwards_algorithm_and_chunk_size() {
    let (_dir, paths) = files(6);
    let hasher = Hasher::new()
        .with_algorithm(DigestAlgorithm::Blake3)
        .with_chunk_size(3);
    let pool = ProcessPool::new(2, worker_program());

    for outcome in pool.hash_all(&paths, &hasher, None) {
        let data = fs::read(&outcome.path).unwrap();
        assert_eq!(outcome.result.unwrap(), hasher.hash_bytes(&data));
    }
}

#[test]
fn test_process_pool_reports_missing_files() {
    let (dir, mut paths) = files(4);
    let gone = dir.path().join("gone");
    paths.push(gone.clone());

    let pool = ProcessPool::new(2, worker_program());
    let outcomes = pool.hash_all(&paths, &Hasher::new(), None);

    assert_eq!(outcomes.len(), 5);
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_ok()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, gone);
    assert!(matches!(failed[0].result, Err(HashError::NotFound { .. })));
}

#[test]
fn test_more_workers_than_files() {
    let (_dir, paths) = files(2);
    let pool = ProcessPool::new(8, worker_program());

    let outcomes = pool.hash_all(&paths, &Hasher::new(), None);

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_ok()));
}

#[test]
fn test_progress_counts_each_file_once() {
    let (_dir, paths) = files(12);
    let counter = Counter::default();
    let pool = build_pool(PoolBackend::Processes, 4, Some(worker_program())).unwrap();

    pool.hash_all(&paths, &Hasher::new(), Some(&counter));

    assert_eq!(counter.completed.load(Ordering::SeqCst), 12);
}

#[test]
fn test_backends_agree() {
    let (_dir, paths) = files(20);
    let hasher = Hasher::new();
    let threads = build_pool(PoolBackend::Threads, 4, None).unwrap();
    let processes = build_pool(PoolBackend::Processes, 4, Some(worker_program())).unwrap();

    let mut a = threads.hash_all(&paths, &hasher, None);
    let mut b = processes.hash_all(&paths, &hasher, None);
    a.sort_by(|x, y| x.path.cmp(&y.path));
    b.sort_by(|x, y| x.path.cmp(&y.path));

    assert_eq!(a, b);
}

#[test]
#[cfg(unix)]
fn test_non_utf8_names_behave_the_same_on_both_backends() {
    use super::support::engine;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    for backend in [PoolBackend::Threads, PoolBackend::Processes] {
        let dir = tempdir().unwrap();
        let odd = dir.path().join(OsStr::from_bytes(b"z\xff.txt"));
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(&odd, "hello").unwrap();

        let report = engine(backend, 2).run(dir.path()).unwrap();

        assert!(!report.has_failures(), "{backend}: {:?}", report.failures);
        assert_eq!(report.files.len(), 2, "{backend}");
        assert_eq!(report.deleted.len(), 1, "{backend}");
        assert_eq!(report.deleted[0].path, odd, "{backend}");
        assert!(!odd.exists());

        let mut json = Vec::new();
        report.write_json(&mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["summary"]["files_deleted"], 1);
    }
}
