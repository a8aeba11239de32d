//! Tests for merge/compaction
//!
//! These tests verify:
//! - Live values survive a merge, deleted keys stay deleted
//! - The previous generation's files are removed
//! - Generation/sequence bookkeeping and hint file output
//! - Writes after a merge, and leftover files from an interrupted merge
//! - Failed merges leave the old generation serving

use std::fs;

use caskstore::config::Config;
use caskstore::merge::MERGE_MARKER;
use caskstore::record::DataRecord;
use caskstore::segment::{SegmentFiles, SegmentId, SegmentWriter};
use caskstore::recovery::RecoveryMode;
use caskstore::store::Store;
use caskstore::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_rw(temp_dir: &TempDir, max_segment_size: u64) -> Store {
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .read_write(true)
        .max_segment_size(max_segment_size)
        .build();
    Store::open(config).unwrap()
}

fn populate(store: &mut Store, count: usize) {
    for i in 0..count {
        store.put(&format!("station-{}", i), &format!("reading-{}", i)).unwrap();
    }
}

// =============================================================================
// Basic Merge Tests
// =============================================================================

#[test]
fn test_merge_preserves_live_values() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 1024 * 1024);
    populate(&mut store, 50);
    store.put("station-10", "latest").unwrap();
    store.delete("station-20").unwrap();

    store.merge().unwrap();

    assert_eq!(store.len(), 49);
    assert_eq!(store.get("station-10").unwrap(), Some("latest".to_string()));
    assert_eq!(store.get("station-11").unwrap(), Some("reading-11".to_string()));
    assert_eq!(store.get("station-20").unwrap(), None);
}

#[test]
fn test_merge_removes_previous_generation() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 400);
    populate(&mut store, 50);
    let before = SegmentFiles::scan(temp_dir.path()).unwrap();
    assert!(before.data.len() > 1);

    let report = store.merge().unwrap();

    let after = SegmentFiles::scan(temp_dir.path()).unwrap();
    for id in &before.data {
        assert!(!id.data_path(temp_dir.path()).exists(), "{} survived", id);
    }
    assert!(after.data.iter().all(|id| id.generation == 2));
    assert_eq!(after.data, after.hints);
    assert_eq!(report.files_removed, before.data.len());
}

#[test]
fn test_merge_report_and_generation() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 300);
    populate(&mut store, 30);
    store.delete("station-0").unwrap();

    let report = store.merge().unwrap();

    assert_eq!(report.old_generation, 1);
    assert_eq!(report.new_generation, 2);
    assert_eq!(report.keys_written, 29);
    assert!(report.segments_written > 1);

    let files = SegmentFiles::scan(temp_dir.path()).unwrap();
    let expected: Vec<SegmentId> = (1..=report.segments_written as u32)
        .map(|seq| SegmentId::new(2, seq))
        .collect();
    assert_eq!(files.data.iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(store.generation(), 2);
}

#[test]
fn test_merge_drops_tombstones_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 1024 * 1024);
    store.put("keep", "v").unwrap();
    store.put("gone", "v").unwrap();
    store.delete("gone").unwrap();

    store.merge().unwrap();
    store.close().unwrap();

    let store = Store::open_path(temp_dir.path()).unwrap();
    let report = store.recovery_report();
    assert_eq!(report.records_replayed, 1);
    assert_eq!(store.list_keys(), vec!["keep".to_string()]);
}

#[test]
fn test_merge_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 1024);
    store.put("a", "1").unwrap();
    store.delete("a").unwrap();

    let report = store.merge().unwrap();

    assert_eq!(report.keys_written, 0);
    assert_eq!(report.segments_written, 0);
    assert!(SegmentFiles::scan(temp_dir.path()).unwrap().is_empty());
    assert!(temp_dir.path().join(MERGE_MARKER).exists());
    assert!(store.list_keys().is_empty());
}

// =============================================================================
// Post-Merge Tests
// =============================================================================

#[test]
fn test_writes_after_merge_use_new_generation() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 1024 * 1024);
    populate(&mut store, 10);
    store.merge().unwrap();

    store.put("station-3", "post-merge").unwrap();

    assert_eq!(store.active_segment(), Some(SegmentId::new(2, 2)));
    assert!(!SegmentId::new(2, 2).hint_path(temp_dir.path()).exists());
    assert_eq!(store.get("station-3").unwrap(), Some("post-merge".to_string()));

    store.close().unwrap();
    let store = Store::open_path(temp_dir.path()).unwrap();
    assert_eq!(store.get("station-3").unwrap(), Some("post-merge".to_string()));
    assert_eq!(store.get("station-4").unwrap(), Some("reading-4".to_string()));
}

#[test]
fn test_repeated_merges() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_rw(&temp_dir, 1024 * 1024);
    populate(&mut store, 20);

    store.merge().unwrap();
    store.put("station-1", "second-round").unwrap();
    store.delete("station-2").unwrap();
    let report = store.merge().unwrap();

    assert_eq!(report.old_generation, 2);
    assert_eq!(report.new_generation, 3);

    let files = SegmentFiles::scan(temp_dir.path()).unwrap();
    assert!(files.data.iter().chain(files.hints.iter()).all(|id| id.generation == 3));
    assert_eq!(store.get("station-1").unwrap(), Some("second-round".to_string()));
    assert_eq!(store.get("station-2").unwrap(), None);
    assert_eq!(store.len(), 19);
}

#[test]
fn test_merge_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut store = open_rw(&temp_dir, 256);
        populate(&mut store, 40);
        store.close().unwrap();
    }

    let mut store = open_rw(&temp_dir, 256);
    store.merge().unwrap();
    store.close().unwrap();

    let store = Store::open_path(temp_dir.path()).unwrap();
    for i in 0..40 {
        assert_eq!(
            store.get(&format!("station-{}", i)).unwrap(),
            Some(format!("reading-{}", i))
        );
    }
}

// =============================================================================
// Interrupted Merge Tests
// =============================================================================

#[test]
fn test_leftover_old_generation_is_ignored_then_retired() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut store = open_rw(&temp_dir, 1024 * 1024);
        store.put("k", "current").unwrap();
        store.merge().unwrap();
        store.close().unwrap();
    }

    // A segment an earlier merge failed to delete
    let stale = SegmentId::new(1, 7);
    let mut writer = SegmentWriter::open(temp_dir.path(), stale).unwrap();
    writer.append(&DataRecord::new("k", "stale", 1)).unwrap();
    writer.append(&DataRecord::new("only-old", "x", 1)).unwrap();
    writer.finish().unwrap();

    let mut store = open_rw(&temp_dir, 1024 * 1024);
    assert_eq!(store.recovery_report().stale_segments, 1);
    assert_eq!(store.get("k").unwrap(), Some("current".to_string()));
    assert_eq!(store.get("only-old").unwrap(), None);

    store.merge().unwrap();

    assert!(!stale.data_path(temp_dir.path()).exists());
    assert_eq!(store.get("k").unwrap(), Some("current".to_string()));
    assert_eq!(store.get("only-old").unwrap(), None);
}

#[test]
fn test_unremoved_old_segment_does_not_revive_deleted_key() {
    let temp_dir = TempDir::new().unwrap();
    let first = SegmentId::first();
    let saved = {
        // Every record lands in its own segment
        let mut store = open_rw(&temp_dir, 20);
        store.put("z", "secret").unwrap();
        store.delete("z").unwrap();
        store.put("keep", "v").unwrap();
        store.sync().unwrap();
        let saved = fs::read(first.data_path(temp_dir.path())).unwrap();

        store.merge().unwrap();
        store.close().unwrap();
        saved
    };

    // The put survived retirement while its tombstone did not
    fs::write(first.data_path(temp_dir.path()), saved).unwrap();

    let store = Store::open_path(temp_dir.path()).unwrap();
    let report = store.recovery_report();

    assert_eq!(report.merged_generation, Some(2));
    assert_eq!(report.stale_segments, 1);
    assert_eq!(store.get("z").unwrap(), None);
    assert_eq!(store.list_keys(), vec!["keep".to_string()]);
}

#[test]
fn test_failed_copy_discards_partial_generation() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut store = open_rw(&temp_dir, 64);
        for i in 0..30 {
            store.put(&format!("k{:03}", i), "v").unwrap();
        }
        store.close().unwrap();
    }

    let mut store = open_rw(&temp_dir, 64);
    let before = SegmentFiles::scan(temp_dir.path()).unwrap();
    let last = before.last_data().unwrap();
    assert!(before.data.len() > 2);

    // Keys in the newest segment sort last, so earlier copies are already
    // on disk when the copy fails
    fs::remove_file(last.data_path(temp_dir.path())).unwrap();

    let result = store.merge();
    assert!(matches!(result, Err(CaskError::Merge(_))), "{:?}", result);

    let after = SegmentFiles::scan(temp_dir.path()).unwrap();
    assert!(after.data.iter().all(|id| id.generation == 1));
    assert!(after.hints.is_empty());
    assert!(!temp_dir.path().join(MERGE_MARKER).exists());
    let leftovers: Vec<String> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);

    // The old key directory still serves reads and writes
    assert_eq!(store.generation(), 1);
    assert_eq!(store.get("k000").unwrap(), Some("v".to_string()));
    store.put("after", "x").unwrap();
    assert_eq!(store.active_segment(), Some(last.next_sequence()));
    assert_eq!(store.get("after").unwrap(), Some("x".to_string()));
}

#[test]
fn test_empty_merge_generation_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut store = open_rw(&temp_dir, 1024);
        store.put("a", "1").unwrap();
        store.delete("a").unwrap();
        store.merge().unwrap();
        assert_eq!(store.generation(), 2);
        store.close().unwrap();
    }

    let mut store = open_rw(&temp_dir, 1024);
    assert_eq!(store.recovery_report().mode, RecoveryMode::Empty);
    assert_eq!(store.generation(), 2);

    store.put("b", "2").unwrap();
    assert_eq!(store.active_segment(), Some(SegmentId::new(2, 1)));
}
