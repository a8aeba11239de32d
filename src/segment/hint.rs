//! Hint files
//!
//! Written only by merge, one per merged segment. A hint file is built under
//! a `.tmp` name and renamed into place once complete, so recovery never
//! sees a half-written one.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use super::SegmentId;
use crate::error::Result;
use crate::record::HintRecord;

/// Builds the hint file for one segment
pub struct HintWriter {
    id: SegmentId,
    tmp_path: PathBuf,
    final_path: PathBuf,
    writer: BufWriter<File>,
    count: u64,
    scratch: BytesMut,
}

impl HintWriter {
    pub fn create(dir: &Path, id: SegmentId) -> Result<Self> {
        let tmp_path = id.hint_tmp_path(dir);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        Ok(Self {
            id,
            tmp_path,
            final_path: id.hint_path(dir),
            writer: BufWriter::new(file),
            count: 0,
            scratch: BytesMut::new(),
        })
    }

    pub fn append(&mut self, hint: &HintRecord) -> Result<()> {
        self.scratch.clear();
        hint.encode_into(&mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;
        self.count += 1;
        Ok(())
    }

    /// Sync the hint file and move it to its final name
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        fs::rename(&self.tmp_path, &self.final_path)?;

        tracing::debug!("Wrote {} hints for {}", self.count, self.id);
        Ok(self.final_path)
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Hints written so far
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Iterates the records of a hint file
pub struct HintReader {
    reader: BufReader<File>,
}

impl HintReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }

    pub fn next_hint(&mut self) -> Result<Option<HintRecord>> {
        HintRecord::read_from(&mut self.reader)
    }
}

impl Iterator for HintReader {
    type Item = Result<HintRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_hint().transpose()
    }
}
