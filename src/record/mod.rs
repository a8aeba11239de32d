//! Record Codec Module
//!
//! Pure encode/decode of the two on-disk record shapes.
//!
//! All integers are 4-byte signed, big-endian. Sizes always precede
//! payloads, so a decoder never needs outside schema.
//!
//! ## Data Record (data segments)
//! ```text
//! ┌───────────────┬──────────────┬────────────────┬───────┬─────────┐
//! │ Timestamp (4) │ KeySize (4)  │ ValueSize (4)  │  Key  │  Value  │
//! └───────────────┴──────────────┴────────────────┴───────┴─────────┘
//! ```
//!
//! ## Hint Record (hint files)
//! ```text
//! ┌───────────────┬─────────────┬───────────────┬─────────────────┬───────┐
//! │ Timestamp (4) │ KeySize (4) │ ValueSize (4) │ ValueOffset (4) │  Key  │
//! └───────────────┴─────────────┴───────────────┴─────────────────┴───────┘
//! ```

mod data;
mod hint;

use std::io::{ErrorKind, Read};
use std::time::{SystemTime, UNIX_EPOCH};

pub use data::DataRecord;
pub use hint::HintRecord;

use crate::error::{CaskError, Result};

/// Header size of a data record: timestamp + key size + value size
pub const DATA_HEADER_SIZE: usize = 12;

/// Header size of a hint record: data header + value offset
pub const HINT_HEADER_SIZE: usize = 16;

/// Value written by `delete`; a record carrying it marks its key as removed
pub const TOMBSTONE: &str = "__caskstore_tombstone__";

/// Current unix time in seconds, saturated into the 4-byte timestamp field
pub fn now_timestamp() -> i32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

/// Convert a payload length into its on-disk size field
pub(crate) fn size_field(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        CaskError::InvalidRecord(format!("{} of {} bytes exceeds the 4-byte size field", what, len))
    })
}

/// Validate a decoded size field
pub(crate) fn declared_len(size: i32, what: &str) -> Result<usize> {
    usize::try_from(size)
        .map_err(|_| CaskError::CorruptRecord(format!("negative {}: {}", what, size)))
}

pub(crate) fn utf8(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| CaskError::CorruptRecord(format!("{} is not valid UTF-8: {}", what, e)))
}

/// Fill `buf` from `reader`.
///
/// Returns `Ok(false)` on a clean end of stream (nothing read at all) and
/// `CorruptRecord` when the stream ends part-way through `buf`.
pub(crate) fn read_header<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CaskError::Io(e)),
        }
    }

    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        n => Err(CaskError::CorruptRecord(format!(
            "truncated header: {} of {} bytes",
            n,
            buf.len()
        ))),
    }
}

/// Read exactly `len` payload bytes, mapping a short read to `CorruptRecord`
pub(crate) fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => CaskError::CorruptRecord(format!(
            "truncated payload: expected {} bytes",
            len
        )),
        _ => CaskError::Io(e),
    })?;
    Ok(payload)
}
