//! Feature-level store for Arbor.
//!
//! A [`Store`] receives object-model operations (an object, one of its
//! features, an optional index) and turns them into [`Backend`] calls.
//! [`DirectStore`] is the base implementation; decorators wrap it to add
//! caching, read-only enforcement, auto-save, logging or load counting, and
//! are assembled in order by a [`StoreBuilder`].
//!
//! # Key Types
//!
//! - [`Store`] -- The feature-access contract
//! - [`DirectStore`] -- Maps features onto a backend, keeps containment consistent
//! - [`StoreOption`] -- One decorator, parsed from `cache-size`, `auto-save:100`, ...
//! - [`StoreBuilder`] -- Wraps a base store with an ordered list of options
//!
//! # Design Rules
//!
//! 1. A child's container is written before the child is linked into its
//!    parent, and cleared after it is unlinked.
//! 2. Decorators never change results, only cost; a read-only store rejects
//!    mutations with [`StoreError::ReadOnly`].
//! 3. Caches are updated only after the wrapped call succeeded.
//!
//! [`Backend`]: arbor_backend::Backend

pub mod builder;
pub mod decorator;
pub mod direct;
pub mod error;
pub mod option;
pub mod traits;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::{BuiltStore, StoreBuilder, DEFAULT_CACHE_CAPACITY};
pub use decorator::{
    AutoSaveStore, DEFAULT_SAVE_CHUNK, FeatureCachingStore, IsSetCachingStore, LoadedObjectCounterStore, LoadedObjects,
    LoggingStore, ReadOnlyStore, SizeCachingStore,
};
pub use direct::{DirectStore, DEFAULT_CLASS_CACHE};
pub use error::{StoreError, StoreResult};
pub use option::StoreOption;
pub use traits::{Store, NO_INDEX};
