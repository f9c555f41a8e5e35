//! Ordered key-value engines.
//!
//! An engine knows nothing about objects or features: it stores opaque
//! byte keys and values. [`MappedBackend`](crate::MappedBackend) lays the
//! object model out on top of it.

mod file;
mod memory;

pub use file::FileEngine;
pub use memory::MemoryEngine;

use crate::error::{BackendError, BackendResult};

/// One entry yielded by a prefix scan.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// The primitive operations a storage engine driver provides.
pub trait KvEngine: Send + Sync {
    /// Engine identifier (`memory`, `file`).
    fn name(&self) -> &'static str;

    fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> BackendResult<()>;

    fn delete(&self, key: &[u8]) -> BackendResult<()>;

    fn contains(&self, key: &[u8]) -> BackendResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Every entry whose key starts with `prefix`, in key order.
    ///
    /// Engines without ordered iteration keep the default.
    fn scan_prefix(&self, prefix: &[u8]) -> BackendResult<Vec<KvPair>> {
        let _ = prefix;
        Err(BackendError::unsupported("scan_prefix"))
    }

    /// Make every write so far durable.
    fn flush(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Release engine resources. Called once by the owning backend.
    fn close(&self) -> BackendResult<()> {
        self.flush()
    }

    fn is_persistent(&self) -> bool;
}
