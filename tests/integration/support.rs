//! Shared fixtures for the integration tests.

use dupesweep::engine::{Engine, EngineConfig};
use dupesweep::pool::PoolBackend;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// The binary under test, used as the worker program for the process backend.
pub fn worker_program() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dupesweep"))
}

/// Engine with the given backend and worker degree.
pub fn engine(backend: PoolBackend, workers: usize) -> Engine {
    let config = EngineConfig::default()
        .with_backend(backend)
        .with_workers(workers)
        .with_worker_program(worker_program());
    Engine::new(config).unwrap()
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Populate `root` with a mix of duplicates, near-duplicates, empty and
/// hidden files across nested directories.
pub fn build_tree(root: &Path) {
    let sub = root.join("sub");
    let deeper = sub.join("deeper");
    fs::create_dir_all(&deeper).unwrap();

    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::write(root.join("b.txt"), "world").unwrap();
    fs::write(root.join("c.txt"), "hello").unwrap();
    fs::write(sub.join("d.txt"), "hello").unwrap();
    fs::write(root.join(".hidden"), "world").unwrap();

    let big = pattern(100_000, 7);
    let mut nearly = big.clone();
    *nearly.last_mut().unwrap() ^= 0xff;
    fs::write(sub.join("e.bin"), &big).unwrap();
    fs::write(deeper.join("f.bin"), &big).unwrap();
    fs::write(root.join("g.bin"), &nearly).unwrap();

    fs::write(root.join("empty1"), "").unwrap();
    fs::write(sub.join("empty2"), "").unwrap();

    for i in 0..30 {
        let dir = if i % 3 == 0 { &deeper } else { &sub };
        fs::write(dir.join(format!("n{i:02}.dat")), format!("{}", i % 7)).unwrap();
    }
}

/// Relative path of `path` under `root`, with `/` separators.
pub fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every regular file under `root`, mapped to its content.
pub fn contents(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let file_type = entry.file_type().unwrap();
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                out.insert(
                    relative(root, &entry.path()),
                    fs::read(entry.path()).unwrap(),
                );
            }
        }
    }
    out
}

/// Relative paths of all files left under `root`.
pub fn remaining(root: &Path) -> BTreeSet<String> {
    contents(root).into_keys().collect()
}

/// For every distinct content, the lexicographically smallest path holding it.
///
/// This is what must survive a run over the tree.
pub fn expected_survivors(root: &Path) -> BTreeSet<String> {
    let mut first: BTreeMap<Vec<u8>, PathBuf> = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let file_type = entry.file_type().unwrap();
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                let path = entry.path();
                let data = fs::read(&path).unwrap();
                first
                    .entry(data)
                    .and_modify(|p| {
                        if path < *p {
                            *p = path.clone();
                        }
                    })
                    .or_insert_with(|| path.clone());
            }
        }
    }
    first.values().map(|p| relative(root, p)).collect()
}
