use crate::graph::CodeGraph;
use crate::model::BuildStats;
use crate::symbols::SymbolTable;
use crate::util;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// One build's complete output. Immutable after construction; queries only
/// ever see a finished snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub table: SymbolTable,
    pub graph: CodeGraph,
    pub stats: BuildStats,
    pub content_hash: String,
}

/// The single swapped reference through which readers see "the current
/// snapshot". Builds construct off to the side and publish under a short
/// write lock; readers clone the Arc and hold no lock while querying, so a
/// rebuild never blocks queries and readers never observe a half-built
/// graph.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().expect("snapshot lock poisoned").clone()
    }

    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.inner.write().expect("snapshot lock poisoned") = Some(snapshot.clone());
        snapshot
    }
}

fn cache_path(root: &Path) -> PathBuf {
    root.join(".gidx").join("snapshot.json")
}

/// Load the cached snapshot if its content hash still matches the tree.
pub fn load_cached(root: &Path, content_hash: &str) -> Option<Snapshot> {
    let path = cache_path(root);
    let raw = std::fs::read_to_string(&path).ok()?;
    let snapshot: Snapshot = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("gidx: discarding unreadable snapshot cache: {err}");
            return None;
        }
    };
    if snapshot.content_hash != content_hash {
        return None;
    }
    Some(snapshot)
}

pub fn store_cached(root: &Path, snapshot: &Snapshot) -> Result<()> {
    let path = cache_path(root);
    util::ensure_parent_dir(&path)?;
    let raw = serde_json::to_string(snapshot)?;
    std::fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
