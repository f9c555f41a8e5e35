//! Detection of zstd-compressed input.

use std::io::{BufRead, BufReader, Cursor, ErrorKind, Read};

use tracing::debug;

use crate::error::PipelineResult;

/// First four bytes of a zstd frame, read as a little-endian `u32`.
pub const ZSTD_MAGIC: u32 = 0xFD2F_B528;

/// Whether `header` starts with the zstd frame magic.
pub fn is_compressed(header: &[u8]) -> bool {
    header
        .get(..4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .is_some_and(|b| u32::from_le_bytes(b) == ZSTD_MAGIC)
}

/// Wrap `input` so that compressed documents are decompressed transparently.
///
/// The header is read until four bytes are in hand or the input ends, then
/// replayed in front of the rest of the stream.
pub fn open_input<R: Read + 'static>(mut input: R) -> PipelineResult<Box<dyn BufRead>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match input.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let compressed = is_compressed(&header[..filled]);
    let input = Cursor::new(header[..filled].to_vec()).chain(input);
    if compressed {
        debug!("zstd-compressed input");
        let decoder = zstd::stream::read::Decoder::new(input)?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(input)))
    }
}
