use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, BackendResult};

/// File name of the descriptor stored in a persistent backend's directory.
pub const DESCRIPTOR_FILE: &str = "arbor.toml";

/// Current descriptor format.
pub const DESCRIPTOR_FORMAT: u32 = 1;

/// How multi-valued features are laid out in the engine.
///
/// The three layouts behave identically through the store; they differ in
/// cost. `Indices` touches `size - index` records on a middle insert or
/// remove but reads one record per slot. `Lists` and `Arrays` rewrite the
/// whole collection on every mutation; `Arrays` reads a single slot
/// without decoding the others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManyMapping {
    /// One record per slot plus a size record.
    #[default]
    Indices,
    /// The whole collection as one serialized list.
    Lists,
    /// The whole collection as one record with an offset table.
    Arrays,
}

impl fmt::Display for ManyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indices => write!(f, "indices"),
            Self::Lists => write!(f, "lists"),
            Self::Arrays => write!(f, "arrays"),
        }
    }
}

impl FromStr for ManyMapping {
    type Err = BackendError;

    fn from_str(s: &str) -> BackendResult<Self> {
        match s {
            "indices" => Ok(Self::Indices),
            "lists" => Ok(Self::Lists),
            "arrays" => Ok(Self::Arrays),
            other => Err(BackendError::InvalidConfig(format!(
                "unknown mapping '{other}' (expected indices, lists or arrays)"
            ))),
        }
    }
}

/// Which engine a backend runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Memory,
    File,
}

impl EngineKind {
    /// Name of the factory serving this engine.
    pub fn factory_name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
        }
    }
}

/// Backend configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub mapping: ManyMapping,
    /// Data directory; required by persistent engines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl BackendConfig {
    pub fn memory(mapping: ManyMapping) -> Self {
        Self {
            engine: EngineKind::Memory,
            mapping,
            path: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>, mapping: ManyMapping) -> Self {
        Self {
            engine: EngineKind::File,
            mapping,
            path: Some(path.into()),
        }
    }

    /// The data directory, or an error if none was configured.
    pub fn require_path(&self) -> BackendResult<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| BackendError::InvalidConfig("persistent backend needs a path".into()))
    }
}

/// Descriptor persisted beside a backend's data, naming what created it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Name of the factory that created the backend.
    pub backend: String,
    pub mapping: ManyMapping,
    pub format: u32,
}

impl Descriptor {
    pub fn new(backend: impl Into<String>, mapping: ManyMapping) -> Self {
        Self {
            backend: backend.into(),
            mapping,
            format: DESCRIPTOR_FORMAT,
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(DESCRIPTOR_FILE)
    }

    /// Read the descriptor of `dir`, if there is one.
    pub fn read(dir: &Path) -> BackendResult<Option<Self>> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        let descriptor: Self =
            toml::from_str(&text).map_err(|e| BackendError::Serialization(e.to_string()))?;
        if descriptor.format > DESCRIPTOR_FORMAT {
            return Err(BackendError::InvalidConfig(format!(
                "descriptor format {} is newer than supported {}",
                descriptor.format, DESCRIPTOR_FORMAT
            )));
        }
        Ok(Some(descriptor))
    }

    /// Write the descriptor into `dir` unless one already exists.
    ///
    /// Returns the descriptor actually on disk.
    pub fn write_if_absent(&self, dir: &Path) -> BackendResult<Self> {
        if let Some(existing) = Self::read(dir)? {
            return Ok(existing);
        }
        std::fs::create_dir_all(dir)?;
        let text =
            toml::to_string(self).map_err(|e| BackendError::Serialization(e.to_string()))?;
        std::fs::write(Self::path(dir), text)?;
        debug!(dir = %dir.display(), backend = %self.backend, "descriptor written");
        Ok(self.clone())
    }

    /// Fail unless this descriptor matches what the caller asked for.
    pub fn check(&self, backend: &str, mapping: ManyMapping) -> BackendResult<()> {
        if self.backend != backend {
            return Err(BackendError::InvalidConfig(format!(
                "directory was created by backend '{}', not '{}'",
                self.backend, backend
            )));
        }
        if self.mapping != mapping {
            return Err(BackendError::InvalidConfig(format!(
                "directory uses mapping '{}', not '{}'",
                self.mapping, mapping
            )));
        }
        Ok(())
    }
}
