use super::support::{build_tree, contents, engine, expected_survivors, relative, remaining};
use dupesweep::engine::{Engine, EngineConfig};
use dupesweep::pool::PoolBackend;
use dupesweep::report::{FailurePhase, RunReport};
use dupesweep::scanner::{digest_to_hex, Hasher};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

/// The parts of a report that must not depend on scheduling, with paths
/// made relative to the scanned root.
#[derive(Debug, PartialEq, Eq)]
struct Observable {
    files: Vec<(String, String)>,
    sets: Vec<(String, String, Vec<String>)>,
    deleted: BTreeSet<String>,
    remaining: BTreeSet<String>,
    failures: usize,
}

fn observe(root: &Path, report: &RunReport) -> Observable {
    Observable {
        files: report
            .files
            .iter()
            .map(|f| (relative(root, &f.path), f.digest.clone()))
            .collect(),
        sets: report
            .sets
            .iter()
            .map(|s| {
                (
                    s.digest.clone(),
                    relative(root, &s.representative),
                    s.duplicates.iter().map(|p| relative(root, p)).collect(),
                )
            })
            .collect(),
        deleted: report
            .deleted
            .iter()
            .map(|d| relative(root, &d.path))
            .collect(),
        remaining: remaining(root),
        failures: report.failures.len(),
    }
}

#[test]
fn test_hello_world_scenario() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "hello").unwrap();
    fs::write(dir.path().join("b"), "world").unwrap();
    fs::write(dir.path().join("c"), "hello").unwrap();

    let report = engine(PoolBackend::Threads, 2).run(dir.path()).unwrap();

    assert_eq!(
        remaining(dir.path()),
        BTreeSet::from(["a".to_string(), "b".to_string()])
    );
    assert_eq!(report.files.len(), 3);
    let digests: BTreeMap<_, _> = report
        .files
        .iter()
        .map(|f| (relative(dir.path(), &f.path), f.digest.as_str()))
        .collect();
    assert_eq!(digests["a"], HELLO_MD5);
    assert_eq!(digests["c"], HELLO_MD5);
    assert_ne!(digests["b"], HELLO_MD5);

    assert_eq!(report.summary.duplicate_sets, 1);
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.deleted[0].path, dir.path().join("c"));

    let text = report.to_text();
    assert!(text.contains(&format!("Hash: {HELLO_MD5}")));
    assert!(text.contains(&format!(
        "Deleted duplicate file: {}",
        dir.path().join("c").display()
    )));
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let report = engine(PoolBackend::Threads, 4).run(dir.path()).unwrap();

    assert!(report.files.is_empty());
    assert!(report.sets.is_empty());
    assert!(report.deleted.is_empty());
    assert!(!report.has_failures());
}

#[test]
fn test_completeness() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let before = contents(dir.path());

    let report = engine(PoolBackend::Threads, 4).run(dir.path()).unwrap();

    // Every file produced exactly one outcome, and all of them succeeded.
    assert_eq!(report.summary.files_found, before.len());
    assert_eq!(report.files.len(), before.len());
    assert!(!report.has_failures());
    let hashed: BTreeSet<_> = report
        .files
        .iter()
        .map(|f| relative(dir.path(), &f.path))
        .collect();
    assert_eq!(hashed, before.keys().cloned().collect());
}

#[test]
fn test_digests_match_standalone_hasher() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let before = contents(dir.path());
    let hasher = Hasher::new();

    let report = engine(PoolBackend::Threads, 3).run(dir.path()).unwrap();

    for file in &report.files {
        let data = &before[&relative(dir.path(), &file.path)];
        assert_eq!(file.digest, digest_to_hex(&hasher.hash_bytes(data)));
    }
}

#[test]
fn test_post_run_invariant() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let survivors = expected_survivors(dir.path());
    let before = contents(dir.path());

    let report = engine(PoolBackend::Threads, 4).run(dir.path()).unwrap();
    let after = contents(dir.path());

    // Exactly the smallest path of each content survives.
    assert_eq!(after.keys().cloned().collect::<BTreeSet<_>>(), survivors);

    // No two survivors share content.
    let distinct: BTreeSet<_> = after.values().collect();
    assert_eq!(distinct.len(), after.len());

    // Every content present before is still present.
    let before_contents: BTreeSet<_> = before.values().collect();
    assert_eq!(distinct, before_contents);

    assert_eq!(report.deleted.len(), before.len() - after.len());
    let freed: u64 = report.deleted.iter().map(|d| d.size).sum();
    assert_eq!(report.summary.bytes_freed, freed);
}

#[test]
fn test_each_set_member_has_the_same_digest() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());

    let report = engine(PoolBackend::Threads, 2).run(dir.path()).unwrap();
    let by_path: BTreeMap<_, _> = report
        .files
        .iter()
        .map(|f| (f.path.clone(), f.digest.clone()))
        .collect();

    for set in &report.sets {
        assert!(!set.duplicates.is_empty());
        assert_eq!(by_path[&set.representative], set.digest);
        for dup in &set.duplicates {
            assert_eq!(by_path[dup], set.digest);
            assert!(set.representative < *dup);
        }
    }

    // Files that share no digest with another file are in no set.
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for digest in by_path.values() {
        *counts.entry(digest).or_default() += 1;
    }
    let set_digests: BTreeSet<_> = report.sets.iter().map(|s| s.digest.as_str()).collect();
    for (digest, count) in counts {
        assert_eq!(count > 1, set_digests.contains(digest));
    }
}

#[test]
fn test_empty_files_are_duplicates_of_each_other() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("empty1"), "").unwrap();
    fs::write(dir.path().join("empty2"), "").unwrap();

    let report = engine(PoolBackend::Threads, 1).run(dir.path()).unwrap();

    assert_eq!(report.summary.duplicate_sets, 1);
    assert_eq!(
        remaining(dir.path()),
        BTreeSet::from(["empty1".to_string()])
    );
}

#[test]
fn test_idempotence() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());

    let first = engine(PoolBackend::Threads, 4).run(dir.path()).unwrap();
    assert!(!first.deleted.is_empty());
    let after_first = contents(dir.path());

    let second = engine(PoolBackend::Threads, 4).run(dir.path()).unwrap();

    assert!(second.sets.is_empty());
    assert!(second.deleted.is_empty());
    assert_eq!(contents(dir.path()), after_first);
}

#[test]
fn test_concurrency_independence() {
    let mut baseline: Option<Observable> = None;

    for backend in [PoolBackend::Threads, PoolBackend::Processes] {
        for workers in [1, 2, 8] {
            let dir = tempdir().unwrap();
            build_tree(dir.path());

            let report = engine(backend, workers).run(dir.path()).unwrap();
            assert_eq!(report.backend, backend);
            assert_eq!(report.workers, workers);
            let observed = observe(dir.path(), &report);

            match &baseline {
                None => baseline = Some(observed),
                Some(expected) => assert_eq!(
                    &observed, expected,
                    "{backend} backend with {workers} workers diverged"
                ),
            }
        }
    }
}

#[test]
fn test_blake3_finds_the_same_sets() {
    let dir_md5 = tempdir().unwrap();
    let dir_b3 = tempdir().unwrap();
    build_tree(dir_md5.path());
    build_tree(dir_b3.path());

    engine(PoolBackend::Threads, 2).run(dir_md5.path()).unwrap();
    let config = EngineConfig::default()
        .with_workers(2)
        .with_algorithm(dupesweep::scanner::DigestAlgorithm::Blake3);
    Engine::new(config).unwrap().run(dir_b3.path()).unwrap();

    assert_eq!(remaining(dir_md5.path()), remaining(dir_b3.path()));
}

#[test]
fn test_verify_mode_same_outcome_on_real_duplicates() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let survivors = expected_survivors(dir.path());

    let config = EngineConfig::default().with_workers(2).with_verify(true);
    let report = Engine::new(config).unwrap().run(dir.path()).unwrap();

    assert!(report.verified);
    assert_eq!(report.failures_in(FailurePhase::Verify).count(), 0);
    assert_eq!(remaining(dir.path()), survivors);
}

#[test]
fn test_skip_hidden_leaves_hidden_files_alone() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".a"), "same").unwrap();
    fs::write(dir.path().join("b"), "same").unwrap();

    let config = EngineConfig::default().with_workers(1).with_skip_hidden(true);
    let report = Engine::new(config).unwrap().run(dir.path()).unwrap();

    assert_eq!(report.files.len(), 1);
    assert!(dir.path().join(".a").exists());
    assert!(dir.path().join("b").exists());
}

#[test]
#[cfg(unix)]
fn test_symlinks_are_neither_followed_nor_deleted() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), "hello").unwrap();
    symlink(dir.path().join("a"), dir.path().join("link")).unwrap();
    symlink(dir.path(), dir.path().join("loop")).unwrap();

    let report = engine(PoolBackend::Threads, 2).run(dir.path()).unwrap();

    assert_eq!(report.files.len(), 1);
    assert!(report.sets.is_empty());
    assert!(fs::symlink_metadata(dir.path().join("link")).is_ok());
}
