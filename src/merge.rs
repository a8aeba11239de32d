//! Merge Module
//!
//! Compaction: rewrites every live key into a new generation of segments,
//! writes a hint file next to each, then retires the older generations.
//!
//! ## Steps
//! 1. Store closes (and syncs) its active segment
//! 2. `write_live`: copy live values into `epoch_<g+1>_1..n` plus hints
//! 3. `commit`: write the `MERGED` marker naming generation `g+1`
//! 4. Store swaps in the new key directory
//! 5. `retire_older`: delete data and hint files of generations `<= g`
//!
//! A failure before step 3 leaves the old generation current. Once the
//! marker names `g+1`, recovery ignores every file of an older generation,
//! so a failure in step 5 only leaves dead files behind for the next merge
//! to remove.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::record::{DataRecord, HintRecord};
use crate::segment::{HintWriter, SegmentFiles, SegmentId, SegmentWriter, ValueReader};

/// Marker file naming the newest completed merge generation
pub const MERGE_MARKER: &str = "MERGED";

const MARKER_TMP: &str = "MERGED.tmp";

/// Generation named by the merge marker in `dir`, if a merge ever completed
pub fn read_marker(dir: &Path) -> Result<Option<u32>> {
    let mut file = match File::open(dir.join(MERGE_MARKER)) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CaskError::Io(e)),
    };

    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    if contents.len() != 4 {
        return Err(CaskError::CorruptRecord(format!(
            "merge marker holds {} bytes, expected 4",
            contents.len()
        )));
    }
    let mut buf = &contents[..];
    Ok(Some(buf.get_u32()))
}

/// Outcome of a successful merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Generation that was compacted away
    pub old_generation: u32,

    /// Generation now holding every live key
    pub new_generation: u32,

    /// Live keys rewritten
    pub keys_written: usize,

    /// Segments (each with a hint file) in the new generation
    pub segments_written: usize,

    /// Data and hint files deleted
    pub files_removed: usize,
}

/// The output of `write_live`
pub(crate) struct MergedGeneration {
    pub keydir: KeyDir,
    pub segments: Vec<SegmentId>,
}

/// Writes one new generation under `dir`
pub(crate) struct Compaction<'a> {
    dir: &'a Path,
    generation: u32,
    max_segment_size: u64,
}

impl<'a> Compaction<'a> {
    pub(crate) fn new(dir: &'a Path, generation: u32, max_segment_size: u64) -> Self {
        Self {
            dir,
            generation,
            max_segment_size,
        }
    }

    /// Copy every key in `keydir` into the new generation
    ///
    /// Keys are written in sorted order so a merge of the same state always
    /// lays out identical files. Timestamps carry over from the originals.
    pub(crate) fn write_live(&self, keydir: &KeyDir, values: &ValueReader) -> Result<MergedGeneration> {
        let mut keys: Vec<&String> = keydir.keys().collect();
        keys.sort();

        let mut merged = KeyDir::new();
        let mut segments = Vec::new();
        let mut output: Option<(SegmentWriter, HintWriter)> = None;
        let mut next_id = SegmentId::new(self.generation, 1);

        for key in keys {
            let Some(entry) = keydir.get(key) else {
                continue;
            };
            let value = values.read_value(entry)?;
            let record = DataRecord::new(key.as_str(), value, entry.timestamp);
            if record.is_tombstone() {
                continue;
            }

            let roll = match &output {
                Some((writer, _)) => writer.would_exceed(record.encoded_len(), self.max_segment_size),
                None => true,
            };
            if roll {
                if let Some((writer, hints)) = output.take() {
                    Self::seal(writer, hints)?;
                }
                output = Some((
                    SegmentWriter::open(self.dir, next_id)?,
                    HintWriter::create(self.dir, next_id)?,
                ));
                segments.push(next_id);
                next_id = next_id.next_sequence();
            }

            let Some((writer, hints)) = output.as_mut() else {
                continue;
            };
            let value_size = record.value.len() as u32;
            let value_offset = writer.append(&record)?;
            hints.append(&HintRecord::new(
                key.as_str(),
                value_size,
                value_offset,
                entry.timestamp,
            ))?;

            merged.insert(
                key.as_str(),
                KeyDirEntry {
                    segment: writer.id(),
                    value_size,
                    value_offset,
                    timestamp: entry.timestamp,
                },
            );
        }

        if let Some((writer, hints)) = output.take() {
            Self::seal(writer, hints)?;
        }

        Ok(MergedGeneration {
            keydir: merged,
            segments,
        })
    }

    /// Mark the new generation complete
    ///
    /// The marker is synced under a temporary name and renamed over the
    /// previous one, so it always names a fully written generation.
    pub(crate) fn commit(&self) -> Result<()> {
        let tmp_path = self.dir.join(MARKER_TMP);
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(self.generation);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        fs::rename(&tmp_path, self.dir.join(MERGE_MARKER))?;

        tracing::debug!("Committed generation {}", self.generation);
        Ok(())
    }

    /// Delete data and hint files of every older generation
    ///
    /// Keeps going past individual failures so as much space as possible is
    /// reclaimed, then reports every file it could not remove.
    pub(crate) fn retire_older(&self) -> Result<usize> {
        let files = SegmentFiles::scan(self.dir)?;

        let doomed: Vec<PathBuf> = files
            .data
            .iter()
            .filter(|id| id.generation < self.generation)
            .map(|id| id.data_path(self.dir))
            .chain(
                files
                    .hints
                    .iter()
                    .filter(|id| id.generation < self.generation)
                    .map(|id| id.hint_path(self.dir)),
            )
            .collect();

        remove_all(doomed).map_err(|failed| {
            CaskError::Merge(format!(
                "generation {} written but could not remove retired files: {}",
                self.generation, failed
            ))
        })
    }

    /// Remove whatever a failed `write_live` left behind
    pub(crate) fn discard(&self) -> Result<()> {
        let files = SegmentFiles::scan(self.dir)?;

        for id in files.data.iter().filter(|id| id.generation == self.generation) {
            remove_if_present(&id.data_path(self.dir))?;
            remove_if_present(&id.hint_tmp_path(self.dir))?;
        }
        for id in files.hints.iter().filter(|id| id.generation == self.generation) {
            remove_if_present(&id.hint_path(self.dir))?;
        }
        remove_if_present(&self.dir.join(MARKER_TMP))?;
        Ok(())
    }

    fn seal(writer: SegmentWriter, hints: HintWriter) -> Result<()> {
        writer.finish()?;
        hints.finish()?;
        Ok(())
    }
}

/// Remove every path, returning how many went or a list of the failures
fn remove_all(paths: Vec<PathBuf>) -> std::result::Result<usize, String> {
    let mut removed = 0;
    let mut failed = Vec::new();
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => failed.push(format!("{}: {}", path.display(), e)),
        }
    }

    if failed.is_empty() {
        Ok(removed)
    } else {
        Err(failed.join(", "))
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CaskError::Io(e)),
    }
}
