//! Segment Writer
//!
//! Appends data records to the active segment.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use super::SegmentId;
use crate::error::{CaskError, Result};
use crate::record::DataRecord;

/// Owns the append-only stream to one data segment
///
/// ## Offsets
/// `size` mirrors the file length at all times (buffered bytes included),
/// so the offset returned by `append` is exactly where a reader must seek
/// for the value, whether or not the bytes have reached the OS yet.
pub struct SegmentWriter {
    id: SegmentId,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Bytes in the segment, including those still buffered
    size: u64,
    /// Reusable encode buffer
    scratch: BytesMut,
}

impl SegmentWriter {
    /// Open the segment `id` under `dir` for appending
    ///
    /// An existing file is appended to, never truncated.
    pub fn open(dir: &Path, id: SegmentId) -> Result<Self> {
        let path = id.data_path(dir);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        tracing::debug!("Opened segment {} at offset {}", id, size);

        Ok(Self {
            id,
            path,
            writer: BufWriter::new(file),
            size,
            scratch: BytesMut::new(),
        })
    }

    /// Append a record, returning the byte offset of its value
    pub fn append(&mut self, record: &DataRecord) -> Result<u32> {
        let len = record.encoded_len();
        if self.size + len > i32::MAX as u64 {
            return Err(CaskError::InvalidRecord(format!(
                "record of {} bytes would push {} past the 4-byte offset limit",
                len, self.id
            )));
        }

        self.scratch.clear();
        record.encode_into(&mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;

        let value_offset = self.size + record.value_offset_in_record();
        self.size += len;

        Ok(value_offset as u32)
    }

    /// Whether appending `len` more bytes should first trigger a rollover
    ///
    /// An empty segment always takes the record, so a single record larger
    /// than `max_size` still gets written.
    pub fn would_exceed(&self, len: u64, max_size: u64) -> bool {
        self.size > 0 && self.size + len > max_size
    }

    /// Push buffered bytes to the OS (readers see them, no fsync)
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Push buffered bytes to durable storage
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Sync and close the segment
    pub fn finish(mut self) -> Result<()> {
        self.sync()?;
        tracing::debug!("Closed segment {} at {} bytes", self.id, self.size);
        Ok(())
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }
}
