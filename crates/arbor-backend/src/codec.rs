//! Key layout and value encoding used by [`MappedBackend`](crate::MappedBackend).
//!
//! Every key starts with a one-byte tag followed by the 16-byte owner id:
//!
//! ```text
//! CONTAINER   [0x01][id]
//! METACLASS   [0x02][id]
//! VALUE       [0x03][id][feature][0x00]
//! COLLECTION  [0x04][id][feature][0x00]
//! SIZE        [0x05][id][feature][0x00]
//! SLOT        [0x06][id][feature][0x00][position: u64 BE]
//! ```
//!
//! Big-endian positions keep the slots of one feature in position order
//! under a lexicographic scan.

use arbor_types::{Id, ManyFeatureKey, RawValue, SingleFeatureKey};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BackendError, BackendResult};

pub const CONTAINER: u8 = 0x01;
pub const METACLASS: u8 = 0x02;
pub const VALUE: u8 = 0x03;
pub const COLLECTION: u8 = 0x04;
pub const SIZE: u8 = 0x05;
pub const SLOT: u8 = 0x06;

const SEPARATOR: u8 = 0x00;

/// A decoded storage key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageKey {
    Container(Id),
    Metaclass(Id),
    Value(SingleFeatureKey),
    Collection(SingleFeatureKey),
    Size(SingleFeatureKey),
    Slot(ManyFeatureKey),
}

pub fn id_key(tag: u8, id: Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + Id::LEN);
    key.push(tag);
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn feature_key(tag: u8, key: &SingleFeatureKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + Id::LEN + key.feature.len() + 8);
    out.push(tag);
    out.extend_from_slice(key.owner.as_bytes());
    out.extend_from_slice(key.feature.as_bytes());
    out.push(SEPARATOR);
    out
}

pub fn slot_key(key: &ManyFeatureKey) -> Vec<u8> {
    let mut out = feature_key(SLOT, &key.feature_key());
    out.extend_from_slice(&(key.position as u64).to_be_bytes());
    out
}

/// Prefix shared by every slot of one feature.
pub fn slot_prefix(key: &SingleFeatureKey) -> Vec<u8> {
    feature_key(SLOT, key)
}

pub fn decode_key(bytes: &[u8]) -> BackendResult<StorageKey> {
    let corrupt = || BackendError::Corrupt(format!("storage key {bytes:02x?}"));
    let (&tag, rest) = bytes.split_first().ok_or_else(corrupt)?;
    if rest.len() < Id::LEN {
        return Err(corrupt());
    }
    let id = Id::from_slice(&rest[..Id::LEN]).map_err(|_| corrupt())?;
    let rest = &rest[Id::LEN..];

    match tag {
        CONTAINER if rest.is_empty() => return Ok(StorageKey::Container(id)),
        METACLASS if rest.is_empty() => return Ok(StorageKey::Metaclass(id)),
        VALUE | COLLECTION | SIZE | SLOT => {}
        _ => return Err(corrupt()),
    }

    let end = rest.iter().position(|&b| b == SEPARATOR).ok_or_else(corrupt)?;
    let feature = std::str::from_utf8(&rest[..end])
        .map_err(|_| corrupt())?
        .to_string();
    let tail = &rest[end + 1..];
    let key = SingleFeatureKey::new(id, feature);

    match (tag, tail.len()) {
        (VALUE, 0) => Ok(StorageKey::Value(key)),
        (COLLECTION, 0) => Ok(StorageKey::Collection(key)),
        (SIZE, 0) => Ok(StorageKey::Size(key)),
        (SLOT, 8) => {
            let mut pos = [0u8; 8];
            pos.copy_from_slice(tail);
            Ok(StorageKey::Slot(key.at(u64::from_be_bytes(pos) as usize)))
        }
        _ => Err(corrupt()),
    }
}

/// Reject feature names that would break the key layout.
pub fn check_feature(key: &SingleFeatureKey) -> BackendResult<()> {
    if key.feature.is_empty() || key.feature.as_bytes().contains(&SEPARATOR) {
        return Err(BackendError::InvalidConfig(format!(
            "feature name {:?} cannot be stored",
            key.feature
        )));
    }
    Ok(())
}

pub fn encode<T: Serialize>(value: &T) -> BackendResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BackendError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> BackendResult<T> {
    bincode::deserialize(bytes).map_err(|e| BackendError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Array records
// ---------------------------------------------------------------------------
//
// ```text
// [count: u32 LE][offset_0 .. offset_count: u32 LE][payload_0 .. payload_count-1]
// ```
//
// Offsets are relative to the start of the payload area; payload `i` spans
// `offset_i..offset_{i+1}`. A single slot decodes without touching the others.

const WORD: usize = 4;

pub fn encode_array(values: &[RawValue]) -> BackendResult<Vec<u8>> {
    let payloads = values.iter().map(encode).collect::<BackendResult<Vec<_>>>()?;
    let total: usize = payloads.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(WORD * (payloads.len() + 2) + total);
    out.extend_from_slice(&word(payloads.len())?.to_le_bytes());
    let mut offset = 0usize;
    out.extend_from_slice(&word(offset)?.to_le_bytes());
    for payload in &payloads {
        offset += payload.len();
        out.extend_from_slice(&word(offset)?.to_le_bytes());
    }
    for payload in payloads {
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

pub fn array_len(bytes: &[u8]) -> BackendResult<usize> {
    read_word(bytes, 0)
}

pub fn array_get(bytes: &[u8], index: usize) -> BackendResult<Option<RawValue>> {
    let count = array_len(bytes)?;
    if index >= count {
        return Ok(None);
    }
    let base = WORD * (count + 2);
    let start = read_word(bytes, WORD * (index + 1))?;
    let end = read_word(bytes, WORD * (index + 2))?;
    let payload = bytes
        .get(base + start..base + end)
        .ok_or_else(|| BackendError::Corrupt("array payload out of range".into()))?;
    decode(payload).map(Some)
}

pub fn decode_array(bytes: &[u8]) -> BackendResult<Vec<RawValue>> {
    let count = array_len(bytes)?;
    (0..count)
        .map(|i| {
            array_get(bytes, i)?
                .ok_or_else(|| BackendError::Corrupt("array slot missing".into()))
        })
        .collect()
}

fn word(n: usize) -> BackendResult<u32> {
    u32::try_from(n).map_err(|_| BackendError::Serialization("array record too large".into()))
}

fn read_word(bytes: &[u8], at: usize) -> BackendResult<usize> {
    let raw = bytes
        .get(at..at + WORD)
        .ok_or_else(|| BackendError::Corrupt("truncated array record".into()))?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
}
