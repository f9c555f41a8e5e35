use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{KvEngine, KvPair};
use crate::error::BackendResult;

/// Ordered in-memory engine.
#[derive(Default)]
pub struct MemoryEngine {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("entries", &self.len())
            .finish()
    }
}

impl KvEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> BackendResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> BackendResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> BackendResult<Vec<KvPair>> {
        Ok(self
            .entries
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
