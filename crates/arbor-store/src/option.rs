use std::fmt;
use std::str::FromStr;

use tracing::Level;

use crate::decorator::DEFAULT_SAVE_CHUNK;
use crate::error::StoreError;

/// One store decorator, as named in configuration and on the command line.
///
/// | text                   | decorator                      |
/// |------------------------|--------------------------------|
/// | `cache-is-set`         | [`IsSetCachingStore`]          |
/// | `cache-size`           | [`SizeCachingStore`]           |
/// | `cache-features`       | [`FeatureCachingStore`]        |
/// | `read-only`            | [`ReadOnlyStore`]              |
/// | `auto-save[:chunk]`    | [`AutoSaveStore`]              |
/// | `log[:level]`          | [`LoggingStore`]               |
/// | `count-loaded-objects` | [`LoadedObjectCounterStore`]   |
///
/// [`IsSetCachingStore`]: crate::IsSetCachingStore
/// [`SizeCachingStore`]: crate::SizeCachingStore
/// [`FeatureCachingStore`]: crate::FeatureCachingStore
/// [`ReadOnlyStore`]: crate::ReadOnlyStore
/// [`AutoSaveStore`]: crate::AutoSaveStore
/// [`LoggingStore`]: crate::LoggingStore
/// [`LoadedObjectCounterStore`]: crate::LoadedObjectCounterStore
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOption {
    CacheIsSet,
    CacheSize,
    CacheFeatures,
    ReadOnly,
    AutoSave { chunk: usize },
    Log { level: Level },
    CountLoadedObjects,
}

impl StoreOption {
    pub fn auto_save() -> Self {
        Self::AutoSave {
            chunk: DEFAULT_SAVE_CHUNK,
        }
    }

    pub fn log() -> Self {
        Self::Log { level: Level::INFO }
    }
}

impl fmt::Display for StoreOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheIsSet => f.write_str("cache-is-set"),
            Self::CacheSize => f.write_str("cache-size"),
            Self::CacheFeatures => f.write_str("cache-features"),
            Self::ReadOnly => f.write_str("read-only"),
            Self::AutoSave { chunk } => write!(f, "auto-save:{chunk}"),
            Self::Log { level } => write!(f, "log:{}", level.as_str().to_ascii_lowercase()),
            Self::CountLoadedObjects => f.write_str("count-loaded-objects"),
        }
    }
}

impl FromStr for StoreOption {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.trim().split_once(':') {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (s.trim(), None),
        };
        let invalid = || StoreError::InvalidArgument(format!("unknown store option '{s}'"));
        let option = match (name, arg) {
            ("cache-is-set", None) => Self::CacheIsSet,
            ("cache-size", None) => Self::CacheSize,
            ("cache-features", None) => Self::CacheFeatures,
            ("read-only", None) => Self::ReadOnly,
            ("count-loaded-objects", None) => Self::CountLoadedObjects,
            ("auto-save", None) => Self::auto_save(),
            ("auto-save", Some(chunk)) => Self::AutoSave {
                chunk: chunk
                    .parse()
                    .ok()
                    .filter(|c: &usize| *c > 0)
                    .ok_or_else(invalid)?,
            },
            ("log", None) => Self::log(),
            ("log", Some(level)) => Self::Log {
                level: level.parse().map_err(|_| invalid())?,
            },
            _ => return Err(invalid()),
        };
        Ok(option)
    }
}
