//! Recovery Module
//!
//! Rebuilds the key directory from the files in a store directory.
//!
//! ## Procedure
//! ```text
//!   Scan ──► HintReplay ─┐
//!        ├─► LogReplay  ─┼─► Ready
//!        └─► Empty      ─┘
//! ```
//! Segments are visited in `(generation, sequence)` order. A segment with a
//! hint file is loaded from the hint (locations only, no value bytes); a
//! segment without one is replayed record by record. Merge writes hints
//! for every segment it produces, so a freshly merged store is pure hint
//! replay and a never-merged store is pure log replay. Segments written
//! after the last merge have no hints and are replayed from the log.
//!
//! Once a merge has committed (the `MERGED` marker names its generation),
//! files of older generations are dead: a merge that could not delete them
//! leaves them behind, and replaying them would revive overwritten or
//! deleted keys. They are skipped.
//!
//! Any failure reading an existing file aborts recovery; the store never
//! starts from a partially rebuilt index.

use std::path::Path;

use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::merge::{read_marker, MERGE_MARKER};
use crate::segment::{HintReader, SegmentFiles, SegmentId, SegmentReader};

/// Which files recovery read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    /// No live segments on disk
    Empty,

    /// Every segment replayed from its data records
    LogReplay,

    /// Every segment loaded from its hint file
    HintReplay,

    /// Hinted segments from hints, the rest from their records
    Mixed,
}

/// Whether hint files may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryStrategy {
    /// Use a segment's hint file whenever one exists
    #[default]
    PreferHints,

    /// Ignore hint files and replay every data record
    LogOnly,
}

/// Result of a recovery pass
#[derive(Debug, Clone)]
pub struct RecoveryResult {
    pub mode: RecoveryMode,

    /// Data segments recovered from
    pub segments: usize,

    /// Data segments skipped because a later merge superseded them
    pub stale_segments: usize,

    /// Generation written by the newest completed merge
    pub merged_generation: Option<u32>,

    /// Segments loaded from hint files
    pub hint_files_replayed: usize,

    /// Segments replayed from data records
    pub segments_replayed: usize,

    /// Hint and data records applied
    pub records_replayed: u64,

    /// Tombstones applied during log replay
    pub tombstones: u64,

    /// Keys in the rebuilt directory
    pub live_keys: usize,

    /// Newest segment on disk; the next active segment follows it
    pub last_segment: Option<SegmentId>,
}

/// Rebuilds a key directory from disk
pub struct Recovery;

impl Recovery {
    /// Recover `dir`, preferring hint files
    pub fn recover(dir: &Path) -> Result<(KeyDir, RecoveryResult)> {
        Self::recover_with(dir, RecoveryStrategy::PreferHints)
    }

    pub fn recover_with(dir: &Path, strategy: RecoveryStrategy) -> Result<(KeyDir, RecoveryResult)> {
        let mut files = SegmentFiles::scan(dir).map_err(|e| CaskError::recovery(dir, e))?;
        let merged_generation =
            read_marker(dir).map_err(|e| CaskError::recovery(dir.join(MERGE_MARKER), e))?;

        let mut stale_segments = 0;
        if let Some(current) = merged_generation {
            let found = files.data.len();
            files.data.retain(|id| id.generation >= current);
            files.hints.retain(|id| id.generation >= current);
            stale_segments = found - files.data.len();
        }
        if stale_segments > 0 {
            tracing::warn!(
                "Ignoring {} segments older than merged generation {}",
                stale_segments,
                merged_generation.unwrap_or_default()
            );
        }

        for orphan in files.orphan_hints() {
            tracing::warn!("Ignoring hint file {} with no data segment", orphan.hint_file_name());
        }

        let use_hint = |id: &SegmentId| {
            strategy == RecoveryStrategy::PreferHints && files.hints.contains(id)
        };

        let hinted = files.data.iter().filter(|id| use_hint(*id)).count();
        let mode = match (files.data.len(), hinted) {
            (0, _) => RecoveryMode::Empty,
            (_, 0) => RecoveryMode::LogReplay,
            (total, h) if total == h => RecoveryMode::HintReplay,
            _ => RecoveryMode::Mixed,
        };

        let mut keydir = KeyDir::new();
        let mut result = RecoveryResult {
            mode,
            segments: files.data.len(),
            stale_segments,
            merged_generation,
            hint_files_replayed: 0,
            segments_replayed: 0,
            records_replayed: 0,
            tombstones: 0,
            live_keys: 0,
            last_segment: files.last_data(),
        };

        for id in &files.data {
            if use_hint(id) {
                let path = id.hint_path(dir);
                Self::replay_hints(&path, *id, &mut keydir, &mut result)
                    .map_err(|e| CaskError::recovery(&path, e))?;
                result.hint_files_replayed += 1;
            } else {
                let path = id.data_path(dir);
                Self::replay_segment(&path, *id, &mut keydir, &mut result)
                    .map_err(|e| CaskError::recovery(&path, e))?;
                result.segments_replayed += 1;
            }
        }

        result.live_keys = keydir.len();
        Ok((keydir, result))
    }

    fn replay_hints(
        path: &Path,
        segment: SegmentId,
        keydir: &mut KeyDir,
        result: &mut RecoveryResult,
    ) -> Result<()> {
        for hint in HintReader::open(path)? {
            let hint = hint?;
            keydir.insert(
                hint.key,
                KeyDirEntry {
                    segment,
                    value_size: hint.value_size,
                    value_offset: hint.value_offset,
                    timestamp: hint.timestamp,
                },
            );
            result.records_replayed += 1;
        }
        Ok(())
    }

    fn replay_segment(
        path: &Path,
        segment: SegmentId,
        keydir: &mut KeyDir,
        result: &mut RecoveryResult,
    ) -> Result<()> {
        for item in SegmentReader::open(path)? {
            let (record, value_offset) = item?;
            result.records_replayed += 1;

            if record.is_tombstone() {
                keydir.remove(&record.key);
                result.tombstones += 1;
                continue;
            }

            let value_size = record.value.len() as u32;
            keydir.insert(
                record.key,
                KeyDirEntry {
                    segment,
                    value_size,
                    value_offset,
                    timestamp: record.timestamp,
                },
            );
        }
        Ok(())
    }
}
