use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TypeError, TypeResult};

/// Opaque, globally unique identifier of one object.
///
/// Fresh identifiers are UUID v7, so ids generated by one process sort in
/// creation order. Identifiers coming from a serialized document are mapped
/// with [`Id::from_raw`], which keeps UUID-shaped strings as they are and
/// hashes anything else into a stable value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(Uuid);

impl Id {
    /// Identifier of the synthetic root object owning a resource's contents.
    pub const ROOT: Id = Id(Uuid::nil());

    /// Width of the binary form.
    pub const LEN: usize = 16;

    /// Generate a new time-ordered identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Map a document-level identifier onto an `Id`.
    ///
    /// The mapping is deterministic: the same raw string always yields the
    /// same `Id`, which lets forward references resolve before the element
    /// they point to has been read.
    pub fn from_raw(raw: &str) -> Self {
        if let Ok(uuid) = Uuid::parse_str(raw) {
            return Self(uuid);
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"arbor-id-v1:");
        hasher.update(raw.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..Self::LEN]);
        Self(Uuid::from_bytes(bytes))
    }

    /// Build from the 16-byte binary form.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Build from a byte slice, checking its width.
    pub fn from_slice(bytes: &[u8]) -> TypeResult<Self> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(arr))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The 16-byte binary form, used as the id segment of storage keys.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// Short representation (first 8 hex characters).
    pub fn short_id(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }
}

impl FromStr for Id {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidId(format!("{s}: {e}")))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.short_id())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
