//! Per-file failures are isolated: they are reported, never fatal, and
//! never affect other files.

use super::support::{engine, remaining, worker_program};
use dupesweep::engine::{Engine, EngineConfig, InvocationError};
use dupesweep::pool::PoolBackend;
use dupesweep::progress::{ProgressCallback, PHASE_HASHING};
use dupesweep::report::FailurePhase;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Removes a file once listing is over and hashing is about to start.
struct RemoveOnHashing {
    victim: PathBuf,
    phases: Mutex<Vec<String>>,
}

impl ProgressCallback for RemoveOnHashing {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        self.phases.lock().unwrap().push(phase.to_string());
        if phase == PHASE_HASHING {
            fs::remove_file(&self.victim).unwrap();
        }
    }

    fn on_progress(&self, _current: usize, _path: &str) {}

    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_invalid_root_is_fatal() {
    let dir = tempdir().unwrap();
    let err = engine(PoolBackend::Threads, 1)
        .run(&dir.path().join("missing"))
        .unwrap_err();
    assert!(matches!(err, InvocationError::RootNotFound(_)));
}

#[test]
fn test_zero_workers_is_fatal() {
    let err = Engine::new(EngineConfig::default().with_workers(0)).unwrap_err();
    assert!(matches!(err, InvocationError::InvalidWorkerCount(0)));

    let err = Engine::new(
        EngineConfig::default()
            .with_workers(0)
            .with_backend(PoolBackend::Processes),
    )
    .unwrap_err();
    assert!(matches!(err, InvocationError::InvalidWorkerCount(0)));
}

#[test]
fn test_broken_worker_program_reports_every_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "hello").unwrap();
    fs::write(dir.path().join("b"), "hello").unwrap();
    fs::write(dir.path().join("c"), "other").unwrap();

    let config = EngineConfig::default()
        .with_workers(2)
        .with_backend(PoolBackend::Processes)
        .with_worker_program(PathBuf::from("/nonexistent/dupesweep"));
    let report = Engine::new(config).unwrap().run(dir.path()).unwrap();

    // Nothing hashed means nothing grouped and nothing deleted.
    assert_eq!(report.summary.files_found, 3);
    assert_eq!(report.summary.files_hashed, 0);
    assert_eq!(report.failures_in(FailurePhase::Hash).count(), 3);
    assert!(report.deleted.is_empty());
    assert_eq!(remaining(dir.path()).len(), 3);
}

#[test]
fn test_file_vanishing_before_hashing_is_isolated() {
    for backend in [PoolBackend::Threads, PoolBackend::Processes] {
        let dir = tempdir().unwrap();
        for name in ["a", "b", "c", "d"] {
            fs::write(dir.path().join(name), "hello").unwrap();
        }
        fs::write(dir.path().join("e"), "world").unwrap();
        let victim = dir.path().join("b");

        let hook = Arc::new(RemoveOnHashing {
            victim: victim.clone(),
            phases: Mutex::new(Vec::new()),
        });
        let config = EngineConfig::default()
            .with_backend(backend)
            .with_workers(2)
            .with_worker_program(worker_program())
            .with_progress(hook.clone());
        let report = Engine::new(config).unwrap().run(dir.path()).unwrap();

        assert!(hook.phases.lock().unwrap().iter().any(|p| p == PHASE_HASHING));
        assert_eq!(report.summary.files_found, 5, "{backend}");

        let hash_failures: Vec<_> = report.failures_in(FailurePhase::Hash).collect();
        assert_eq!(hash_failures.len(), 1, "{backend}");
        assert_eq!(hash_failures[0].path, victim);
        assert!(report.failures_in(FailurePhase::Delete).next().is_none());

        // The other four files were hashed and deduplicated as usual.
        assert_eq!(report.summary.files_hashed, 4, "{backend}");
        assert_eq!(report.sets.len(), 1);
        assert_eq!(report.sets[0].representative, dir.path().join("a"));
        assert_eq!(report.summary.files_deleted, 2);
        assert_eq!(
            remaining(dir.path()),
            BTreeSet::from(["a".to_string(), "e".to_string()])
        );
    }
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Root ignores permission bits; those runs have nothing to observe.
    fn permissions_enforced(path: &std::path::Path) -> bool {
        fs::File::open(path).is_err()
    }

    #[test]
    fn test_unreadable_file_is_isolated() {
        for backend in [PoolBackend::Threads, PoolBackend::Processes] {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("a"), "hello").unwrap();
            fs::write(dir.path().join("b"), "hello").unwrap();
            fs::write(dir.path().join("c"), "hello").unwrap();
            let locked = dir.path().join("b");
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
            if !permissions_enforced(&locked) {
                fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
                continue;
            }

            let report = engine(backend, 2).run(dir.path()).unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

            let hash_failures: Vec<_> = report.failures_in(FailurePhase::Hash).collect();
            assert_eq!(hash_failures.len(), 1, "{backend}");
            assert_eq!(hash_failures[0].path, locked);
            assert!(hash_failures[0].message.contains("Permission denied"));

            // The readable copies were still processed; the unreadable one survives.
            assert_eq!(
                remaining(dir.path()),
                BTreeSet::from(["a".to_string(), "b".to_string()])
            );
            assert_eq!(report.summary.files_hashed, 2);
            assert_eq!(report.summary.files_deleted, 1);
        }
    }

    #[test]
    fn test_unreadable_directory_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "hello").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("b"), "hello").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let report = engine(PoolBackend::Threads, 2).run(dir.path()).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(report.failures_in(FailurePhase::Enumerate).count() >= 1);
        assert_eq!(report.files.len(), 1);
        assert!(report.deleted.is_empty());
        assert!(locked.join("b").exists());
    }

    #[test]
    fn test_undeletable_duplicate_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "hello").unwrap();
        let sealed = dir.path().join("sealed");
        fs::create_dir(&sealed).unwrap();
        fs::write(sealed.join("b"), "hello").unwrap();
        fs::write(dir.path().join("c"), "hello").unwrap();
        // Listing and reading still work, unlinking does not.
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o555)).unwrap();
        let canary = sealed.join("canary");
        if fs::write(&canary, "x").is_ok() {
            fs::remove_file(&canary).unwrap();
            fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let report = engine(PoolBackend::Threads, 2).run(dir.path()).unwrap();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();

        let failures: Vec<_> = report.failures_in(FailurePhase::Delete).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, sealed.join("b"));
        assert!(sealed.join("b").exists());
        assert!(!dir.path().join("c").exists());
        assert_eq!(report.summary.files_deleted, 1);
    }
}
