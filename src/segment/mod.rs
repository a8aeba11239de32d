//! Segment Module
//!
//! Append-only data segments and their hint files.
//!
//! ## Responsibilities
//! - Name and order segments by `(generation, sequence)`
//! - Append data records to the active segment, tracking value offsets
//! - Replay segments and hint files during recovery
//! - Positioned value reads for `get`
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── epoch_1_1           (data records, generation 1)
//!   ├── epoch_1_2
//!   ├── epoch_2_1           (written by merge)
//!   ├── hint_epoch_2_1      (key → location, written by merge)
//!   ├── epoch_2_2           (writes after the merge, no hint)
//!   ├── MERGED              (newest completed merge generation)
//!   └── LOCK
//! ```

mod hint;
mod id;
mod reader;
mod writer;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub use hint::{HintReader, HintWriter};
pub use id::SegmentId;
pub use reader::{SegmentReader, ValueReader};
pub use writer::SegmentWriter;

use crate::error::Result;

/// Data segments and hint files found in a store directory, each in
/// ascending `(generation, sequence)` order
#[derive(Debug, Default, Clone)]
pub struct SegmentFiles {
    pub data: BTreeSet<SegmentId>,
    pub hints: BTreeSet<SegmentId>,
}

impl SegmentFiles {
    /// List the segment and hint files under `dir`
    ///
    /// Names matching neither pattern (the lock file, temporary hint files)
    /// are skipped.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut files = SegmentFiles::default();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if let Some(id) = SegmentId::parse_data_file_name(name) {
                files.data.insert(id);
            } else if let Some(id) = SegmentId::parse_hint_file_name(name) {
                files.hints.insert(id);
            }
        }

        Ok(files)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.hints.is_empty()
    }

    /// Newest data segment on disk
    pub fn last_data(&self) -> Option<SegmentId> {
        self.data.iter().next_back().copied()
    }

    /// Hint files whose data segment no longer exists
    pub fn orphan_hints(&self) -> impl Iterator<Item = &SegmentId> {
        self.hints.iter().filter(|id| !self.data.contains(id))
    }
}
