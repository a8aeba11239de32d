//! Segment Reader
//!
//! Sequential replay of a data segment and positioned value reads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::SegmentId;
use crate::error::Result;
use crate::keydir::KeyDirEntry;
use crate::record::{self, DataRecord};

/// Iterates a data segment front to back
///
/// Yields each record with the offset of its value, computed from a
/// running byte count exactly as the writer computed it.
pub struct SegmentReader {
    reader: BufReader<File>,
    /// Offset of the next record
    offset: u64,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
        })
    }

    /// Read the next record and its value offset
    pub fn next_record(&mut self) -> Result<Option<(DataRecord, u32)>> {
        let Some(record) = DataRecord::read_from(&mut self.reader)? else {
            return Ok(None);
        };

        let value_offset = self.offset + record.value_offset_in_record();
        self.offset += record.encoded_len();

        Ok(Some((record, value_offset as u32)))
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for SegmentReader {
    type Item = Result<(DataRecord, u32)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Positioned reads of values, keeping one open file per segment
///
/// The file cache sits behind a mutex so `get` can take `&self`.
pub struct ValueReader {
    dir: PathBuf,
    files: Mutex<HashMap<SegmentId, File>>,
}

impl ValueReader {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Read the value `entry` points at
    pub fn read_value(&self, entry: &KeyDirEntry) -> Result<String> {
        let mut files = self.files.lock();

        let file = match files.entry(entry.segment) {
            std::collections::hash_map::Entry::Occupied(slot) => slot.into_mut(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                let file = File::open(entry.segment.data_path(&self.dir))?;
                slot.insert(file)
            }
        };

        file.seek(SeekFrom::Start(entry.value_offset as u64))?;
        let bytes = record::read_payload(file, entry.value_size as usize)?;
        record::utf8(bytes, "value")
    }

    /// Drop every cached file handle (after a merge retires segments)
    pub fn evict_all(&self) {
        self.files.lock().clear();
    }

    /// Number of segment files currently held open
    pub fn open_files(&self) -> usize {
        self.files.lock().len()
    }
}
