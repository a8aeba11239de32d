//! Store Module
//!
//! The handle bound to one open store directory.
//!
//! ## Responsibilities
//! - Validate/create the directory and take the writer lock
//! - Run recovery to rebuild the key directory
//! - Route get/put/delete/list_keys/fold through the key directory
//! - Roll the active segment over at the size threshold
//! - Run merges on demand

use std::fs;
use std::path::Path;

use crate::config::{Config, OpenOption};
use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::lock::DirLock;
use crate::merge::{Compaction, MergeReport};
use crate::record::{now_timestamp, DataRecord, TOMBSTONE};
use crate::recovery::{Recovery, RecoveryResult};
use crate::segment::{SegmentId, SegmentWriter, ValueReader};

/// Open a store with Bitcask-style flags
///
/// Without [`OpenOption::ReadWrite`] the handle is read-only.
pub fn open(path: impl AsRef<Path>, options: &[OpenOption]) -> Result<Store> {
    Store::open(Config::from_options(path.as_ref(), options))
}

/// An open store
///
/// ## Concurrency Model
///
/// A handle is meant for one thread at a time; share it behind a mutex if
/// needed. Mutations take `&mut self`. Reads take `&self`: the value
/// reader keeps its segment file cache behind an internal lock.
///
/// At most one read-write handle may exist per directory. This is enforced
/// with an advisory lock on `LOCK`; read-only handles take no lock and see
/// the directory as it was when they opened.
pub struct Store {
    config: Config,

    /// Key → newest value location
    keydir: KeyDir,

    /// Positioned reads against any segment
    values: ValueReader,

    /// Active segment, opened lazily on the first write
    writer: Option<SegmentWriter>,

    /// Segment the next opened writer will use
    next_segment: SegmentId,

    /// Stats from the recovery that built this handle
    recovery: RecoveryResult,

    /// Held for the handle's lifetime when read-write
    _lock: Option<DirLock>,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if it doesn't exist
    /// 2. Take the writer lock (read-write only)
    /// 3. Rebuild the key directory from hints and segments
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        Self::prepare_dir(&config.data_dir)?;

        let lock = if config.read_write {
            Some(DirLock::acquire(&config.data_dir)?)
        } else {
            None
        };

        let (keydir, recovery) = Recovery::recover(&config.data_dir)?;
        let next_segment = match (recovery.last_segment, recovery.merged_generation) {
            (Some(last), _) => last.next_sequence(),
            (None, Some(generation)) => SegmentId::new(generation, 1),
            (None, None) => SegmentId::first(),
        };

        tracing::info!(
            "Opened {} ({}): {:?} recovery, {} segments, {} records, {} live keys",
            config.data_dir.display(),
            if config.read_write { "read-write" } else { "read-only" },
            recovery.mode,
            recovery.segments,
            recovery.records_replayed,
            recovery.live_keys
        );

        Ok(Self {
            values: ValueReader::new(&config.data_dir),
            config,
            keydir,
            writer: None,
            next_segment,
            recovery,
            _lock: lock,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config (read-only) with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Get a value by key
    ///
    /// `Ok(None)` means the key is absent; an I/O failure is an `Err`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(entry) = self.keydir.get(key) else {
            return Ok(None);
        };

        let value = self.values.read_value(entry)?;
        if value == TOMBSTONE {
            return Ok(None);
        }
        Ok(Some(value))
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Roll over if the record would overflow the active segment
    /// 2. Append to the active segment
    /// 3. Point the key directory at the new value
    ///
    /// Putting the tombstone value is a delete.
    pub fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_writable()?;

        if value == TOMBSTONE {
            return self.delete(key);
        }

        let record = DataRecord::new(key, value, now_timestamp());
        let (segment, value_offset) = self.append(&record)?;

        self.keydir.insert(
            key,
            KeyDirEntry {
                segment,
                value_size: value.len() as u32,
                value_offset,
                timestamp: record.timestamp,
            },
        );
        Ok(())
    }

    /// Delete a key
    ///
    /// Appends a tombstone and drops the key from the index. Space is
    /// reclaimed by the next merge.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.ensure_writable()?;

        self.append(&DataRecord::tombstone(key, now_timestamp()))?;
        self.keydir.remove(key);
        Ok(())
    }

    /// Snapshot of all live keys, unordered
    pub fn list_keys(&self) -> Vec<String> {
        self.keydir.snapshot_keys()
    }

    /// Visit every live key and its value, threading an accumulator
    ///
    /// Order is unspecified.
    pub fn fold<A, F>(&self, init: A, mut f: F) -> Result<A>
    where
        F: FnMut(A, &str, &str) -> A,
    {
        let mut acc = init;
        for (key, entry) in &self.keydir {
            let value = self.values.read_value(entry)?;
            if value == TOMBSTONE {
                continue;
            }
            acc = f(acc, key.as_str(), value.as_str());
        }
        Ok(acc)
    }

    /// Compact all live data into a new generation with hint files
    ///
    /// Deleted keys are dropped and every file of older generations is
    /// removed. If the new generation cannot be written, the store stays
    /// on the old one. If old files cannot be removed, the new generation
    /// is already committed; the leftovers are ignored on recovery and
    /// removed by the next merge.
    pub fn merge(&mut self) -> Result<MergeReport> {
        self.ensure_writable()?;

        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }

        let old_generation = self.next_segment.generation;
        let new_generation = old_generation + 1;
        let compaction = Compaction::new(
            &self.config.data_dir,
            new_generation,
            self.config.max_segment_size,
        );

        let written = compaction
            .write_live(&self.keydir, &self.values)
            .and_then(|merged| compaction.commit().map(|()| merged));
        let merged = match written {
            Ok(merged) => merged,
            Err(e) => {
                if let Err(cleanup) = compaction.discard() {
                    // Partial copies stay on disk; later writes must still
                    // sort after them
                    tracing::warn!(
                        "Could not remove partial generation {}: {}",
                        new_generation,
                        cleanup
                    );
                    self.next_segment = SegmentId::new(new_generation, 1).next_generation();
                }
                return Err(CaskError::Merge(format!(
                    "writing generation {} failed: {}",
                    new_generation, e
                )));
            }
        };

        let keys_written = merged.keydir.len();
        let segments_written = merged.segments.len();

        self.keydir = merged.keydir;
        self.values.evict_all();
        self.next_segment = merged
            .segments
            .last()
            .map(|id| id.next_sequence())
            .unwrap_or_else(|| SegmentId::new(new_generation, 1));

        let files_removed = compaction.retire_older()?;

        tracing::info!(
            "Merged generation {} into {}: {} keys in {} segments, {} files removed",
            old_generation,
            new_generation,
            keys_written,
            segments_written,
            files_removed
        );

        Ok(MergeReport {
            old_generation,
            new_generation,
            keys_written,
            segments_written,
            files_removed,
        })
    }

    /// Force buffered writes of the active segment to disk
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_writable()?;

        if let Some(writer) = self.writer.as_mut() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Close the store gracefully
    ///
    /// Syncs and releases the active segment, then the writer lock.
    pub fn close(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        tracing::debug!("Closed {}", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_read_write(&self) -> bool {
        self.config.read_write
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.keydir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keydir.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keydir.contains_key(key)
    }

    /// Current generation
    pub fn generation(&self) -> u32 {
        self.active_segment()
            .unwrap_or(self.next_segment)
            .generation
    }

    /// Segment currently being appended to, if one is open
    pub fn active_segment(&self) -> Option<SegmentId> {
        self.writer.as_ref().map(SegmentWriter::id)
    }

    /// Stats from the recovery run at open
    pub fn recovery_report(&self) -> &RecoveryResult {
        &self.recovery
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_write {
            Ok(())
        } else {
            Err(CaskError::ReadOnly)
        }
    }

    /// Append a record to the active segment, rolling over first if needed
    fn append(&mut self, record: &DataRecord) -> Result<(SegmentId, u32)> {
        let needs_rollover = self
            .writer
            .as_ref()
            .is_some_and(|w| w.would_exceed(record.encoded_len(), self.config.max_segment_size));
        if needs_rollover {
            self.rollover()?;
        }

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let writer = SegmentWriter::open(&self.config.data_dir, self.next_segment)?;
                self.next_segment = self.next_segment.next_sequence();
                writer
            }
        };
        let writer = self.writer.insert(writer);

        let value_offset = writer.append(record)?;
        writer.flush()?;
        if self.config.sync_on_put {
            writer.sync()?;
        }

        Ok((writer.id(), value_offset))
    }

    /// Close the active segment; the next append opens its successor
    fn rollover(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let id = writer.id();
            let size = writer.size();
            writer.finish()?;
            tracing::debug!("Rolled over {} at {} bytes", id, size);
        }
        Ok(())
    }

    fn prepare_dir(dir: &Path) -> Result<()> {
        if dir.exists() && !dir.is_dir() {
            return Err(CaskError::Directory {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        fs::create_dir_all(dir).map_err(|e| CaskError::Directory {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
