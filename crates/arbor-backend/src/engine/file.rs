use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{KvEngine, KvPair};
use crate::error::{BackendError, BackendResult};

/// Name of the log file inside the data directory.
pub const LOG_FILE: &str = "data.log";

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Stale records tolerated before `flush` compacts the log.
const COMPACT_SLACK: u64 = 4096;

/// One logged mutation.
///
/// On-disk format of each entry:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogOp)]
/// ```
#[derive(Debug, Serialize, Deserialize)]
enum LogOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

struct FileState {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    writer: BufWriter<File>,
    /// Current end of the log.
    offset: u64,
    /// Logged records superseded by later ones.
    stale: u64,
}

/// Log-structured persistent engine.
///
/// Every mutation is appended to a single log file; the live key set is
/// kept in an ordered in-memory map rebuilt by replaying the log on open.
/// A torn tail left by a crash is truncated during replay. Superseded
/// records are dropped by [`FileEngine::compact`].
pub struct FileEngine {
    dir: PathBuf,
    state: RwLock<FileState>,
}

impl FileEngine {
    /// Open (or create) the engine stored in `dir`.
    pub fn open(dir: &Path) -> BackendResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE);
        let (entries, valid_len, stale) = if path.exists() {
            replay(&path)?
        } else {
            (BTreeMap::new(), 0, 0)
        };

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        if file.metadata()?.len() > valid_len {
            warn!(path = %path.display(), valid_len, "truncating torn log tail");
            file.set_len(valid_len)?;
        }
        let mut writer = BufWriter::new(file);
        io::Seek::seek(&mut writer, io::SeekFrom::Start(valid_len))?;

        debug!(dir = %dir.display(), entries = entries.len(), stale, "file engine opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            state: RwLock::new(FileState {
                entries,
                writer,
                offset: valid_len,
                stale,
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the log so that it only holds live records.
    pub fn compact(&self) -> BackendResult<()> {
        let mut state = self.state.write();
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut FileState) -> BackendResult<()> {
        state.writer.flush()?;
        let path = self.dir.join(LOG_FILE);
        let tmp = self.dir.join(format!("{LOG_FILE}.compact"));

        let mut out = BufWriter::new(File::create(&tmp)?);
        let mut offset = 0u64;
        for (key, value) in &state.entries {
            offset += write_entry(
                &mut out,
                &LogOp::Put {
                    key: key.clone(),
                    value: value.clone(),
                },
            )?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
        drop(out);
        fs::rename(&tmp, &path)?;

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        io::Seek::seek(&mut writer, io::SeekFrom::Start(offset))?;

        info!(
            dir = %self.dir.display(),
            live = state.entries.len(),
            dropped = state.stale,
            "log compacted"
        );
        state.writer = writer;
        state.offset = offset;
        state.stale = 0;
        Ok(())
    }

    fn append(&self, op: LogOp) -> BackendResult<()> {
        let mut state = self.state.write();
        let written = write_entry(&mut state.writer, &op)?;
        state.offset += written;
        let replaced = match op {
            LogOp::Put { key, value } => state.entries.insert(key, value).is_some(),
            LogOp::Delete { key } => {
                // The delete record itself is dead weight once applied.
                state.stale += 1;
                state.entries.remove(&key).is_some()
            }
        };
        if replaced {
            state.stale += 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("FileEngine")
            .field("dir", &self.dir)
            .field("entries", &state.entries.len())
            .field("offset", &state.offset)
            .finish()
    }
}

impl KvEngine for FileEngine {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        Ok(self.state.read().entries.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        self.append(LogOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    fn delete(&self, key: &[u8]) -> BackendResult<()> {
        if !self.contains(key)? {
            return Ok(());
        }
        self.append(LogOp::Delete { key: key.to_vec() })
    }

    fn contains(&self, key: &[u8]) -> BackendResult<bool> {
        Ok(self.state.read().entries.contains_key(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> BackendResult<Vec<KvPair>> {
        Ok(self
            .state
            .read()
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn flush(&self) -> BackendResult<()> {
        let mut state = self.state.write();
        let live = state.entries.len() as u64;
        if state.stale > live.saturating_mul(2) + COMPACT_SLACK {
            return self.compact_locked(&mut state);
        }
        state.writer.flush()?;
        state.writer.get_ref().sync_data()?;
        debug!(offset = state.offset, "file engine flushed");
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

fn write_entry(writer: &mut impl Write, op: &LogOp) -> BackendResult<u64> {
    let payload = bincode::serialize(op).map_err(|e| BackendError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| BackendError::Serialization("log record exceeds 4 GiB".into()))?;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.write_all(&payload)?;
    Ok((HEADER_SIZE + payload.len()) as u64)
}

type Replayed = (BTreeMap<Vec<u8>, Vec<u8>>, u64, u64);

/// Rebuild the live map from the log.
///
/// Returns the map, the length of the valid prefix of the log and the
/// number of stale records found.
fn replay(path: &Path) -> BackendResult<Replayed> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut entries = BTreeMap::new();
    let mut offset = 0u64;
    let mut stale = 0u64;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid log entry length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;
        if crc32fast::hash(&payload) != expected_crc {
            warn!(offset, "CRC mismatch in log; stopping replay");
            break;
        }

        match bincode::deserialize::<LogOp>(&payload) {
            Ok(LogOp::Put { key, value }) => {
                if entries.insert(key, value).is_some() {
                    stale += 1;
                }
            }
            Ok(LogOp::Delete { key }) => {
                stale += 1;
                if entries.remove(&key).is_some() {
                    stale += 1;
                }
            }
            Err(e) => {
                warn!(offset, error = %e, "undecodable log entry; stopping replay");
                break;
            }
        }
        offset += HEADER_SIZE as u64 + length as u64;
    }

    Ok((entries, offset, stale))
}
