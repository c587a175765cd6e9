use anyhow::{Context, Result};
use dashmap::DashMap;
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;
use tracing::debug;

/// Minimal string key-value contract the registry persists through.
///
/// `get` returns `None` for keys never written. `set` replaces the whole
/// value and must report a rejected write (full map, quota) as an error.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

const DEFAULT_NAMESPACE: &str = "nexus";

pub struct Memory {
    kind: MemoryKind,
}

enum MemoryKind {
    LMDB {
        env: Env,
        db: Database<Str, Str>,
    },
    Memory {
        map: DashMap<String, String>,
        quota: Option<usize>,
    },
}

impl Memory {
    /// Open LMDB storage at given path
    pub fn open_lmdb<P: AsRef<Path>>(path: P, map_size: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .with_context(|| format!("create storage dir {}", path.display()))?;
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(8)
                .map_size(map_size)
                .open(path)
                .with_context(|| format!("open lmdb env at {}", path.display()))?
        };
        let mut wtxn = env.write_txn()?;
        let db: Database<Str, Str> = env.create_database(&mut wtxn, Some(DEFAULT_NAMESPACE))?;
        wtxn.commit()?;
        debug!(path = %path.display(), map_size, "opened lmdb store");
        Ok(Self {
            kind: MemoryKind::LMDB { env, db },
        })
    }

    /// Open in-memory storage
    pub fn memory() -> Self {
        Self {
            kind: MemoryKind::Memory {
                map: DashMap::new(),
                quota: None,
            },
        }
    }

    /// In-memory storage that rejects writes once keys plus values exceed `quota` bytes.
    pub fn memory_with_quota(quota: usize) -> Self {
        Self {
            kind: MemoryKind::Memory {
                map: DashMap::new(),
                quota: Some(quota),
            },
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.kind, MemoryKind::LMDB { .. })
    }

    /// Get by key
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match &self.kind {
            MemoryKind::LMDB { env, db } => {
                let rtxn = env.read_txn()?;
                Ok(db.get(&rtxn, key)?.map(str::to_owned))
            }
            MemoryKind::Memory { map, .. } => Ok(map.get(key).map(|v| v.value().clone())),
        }
    }

    /// Insert or replace
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        match &self.kind {
            MemoryKind::LMDB { env, db } => {
                let mut wtxn = env.write_txn()?;
                db.put(&mut wtxn, key, value)
                    .with_context(|| format!("write `{}` ({} bytes)", key, value.len()))?;
                wtxn.commit()?;
                Ok(())
            }
            MemoryKind::Memory { map, quota } => {
                if let Some(limit) = quota {
                    let others: usize = map
                        .iter()
                        .filter(|e| e.key() != key)
                        .map(|e| e.key().len() + e.value().len())
                        .sum();
                    let needed = others + key.len() + value.len();
                    if needed > *limit {
                        anyhow::bail!(
                            "storage quota exceeded: writing `{}` needs {} bytes, limit is {}",
                            key,
                            needed,
                            limit
                        );
                    }
                }
                map.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// Delete by key. Returns whether a value was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        match &self.kind {
            MemoryKind::LMDB { env, db } => {
                let mut wtxn = env.write_txn()?;
                let removed = db.delete(&mut wtxn, key)?;
                wtxn.commit()?;
                Ok(removed)
            }
            MemoryKind::Memory { map, .. } => Ok(map.remove(key).is_some()),
        }
    }
}

impl KvStore for Memory {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Memory::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value)
    }
}
