use std::path::{Path, PathBuf};

use arbor_backend::{BackendConfig, ManyMapping};
use arbor_store::{StoreOption, DEFAULT_CACHE_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// How a resource is opened: its backend and the decorators of its store.
///
/// ```toml
/// options = ["cache-is-set", "cache-size", "auto-save:1000"]
/// cache_capacity = 50000
///
/// [backend]
/// engine = "file"
/// mapping = "arrays"
/// path = "data/model"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceOptions {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Store options, applied in order.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            options: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ResourceOptions {
    pub fn memory(mapping: ManyMapping) -> Self {
        Self {
            backend: BackendConfig::memory(mapping),
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>, mapping: ManyMapping) -> Self {
        Self {
            backend: BackendConfig::file(path, mapping),
            ..Self::default()
        }
    }

    pub fn with_option(mut self, option: StoreOption) -> Self {
        self.options.push(option.to_string());
        self
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse the option names; an unknown name is an error.
    pub fn store_options(&self) -> SdkResult<Vec<StoreOption>> {
        self.options
            .iter()
            .map(|name| name.parse::<StoreOption>().map_err(SdkError::from))
            .collect()
    }

    pub fn is_read_only(&self) -> bool {
        self.options.iter().any(|name| name == "read-only")
    }
}
