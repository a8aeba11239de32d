//! Segment identifiers and file naming
//!
//! A segment is named `epoch_<generation>_<sequence>`; its hint file (if
//! any) is `hint_epoch_<generation>_<sequence>`. Ordering is numeric on
//! `(generation, sequence)`, never on the file name string.

use std::fmt;
use std::path::{Path, PathBuf};

const DATA_PREFIX: &str = "epoch_";
const HINT_PREFIX: &str = "hint_epoch_";
const TMP_SUFFIX: &str = ".tmp";

/// Identifies one data segment (and its parallel hint file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId {
    /// Merge epoch; bumped once per successful merge
    pub generation: u32,

    /// Position within the generation, starting at 1
    pub sequence: u32,
}

impl SegmentId {
    pub fn new(generation: u32, sequence: u32) -> Self {
        Self { generation, sequence }
    }

    /// The first segment of a brand new store
    pub fn first() -> Self {
        Self::new(1, 1)
    }

    /// The segment that follows this one after a rollover
    pub fn next_sequence(self) -> Self {
        Self::new(self.generation, self.sequence + 1)
    }

    /// The first segment of the next generation
    pub fn next_generation(self) -> Self {
        Self::new(self.generation + 1, 1)
    }

    pub fn data_file_name(&self) -> String {
        format!("{}{}_{}", DATA_PREFIX, self.generation, self.sequence)
    }

    pub fn hint_file_name(&self) -> String {
        format!("{}{}_{}", HINT_PREFIX, self.generation, self.sequence)
    }

    pub fn data_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.data_file_name())
    }

    pub fn hint_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.hint_file_name())
    }

    /// Where a hint file lives until it is complete
    pub(crate) fn hint_tmp_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}{}", self.hint_file_name(), TMP_SUFFIX))
    }

    /// "epoch_3_12" → Some(3, 12)
    pub fn parse_data_file_name(name: &str) -> Option<Self> {
        let id = Self::parse_pair(name.strip_prefix(DATA_PREFIX)?)?;
        // Reject non-canonical spellings such as "epoch_01_2"
        (id.data_file_name() == name).then_some(id)
    }

    /// "hint_epoch_3_12" → Some(3, 12)
    pub fn parse_hint_file_name(name: &str) -> Option<Self> {
        let id = Self::parse_pair(name.strip_prefix(HINT_PREFIX)?)?;
        (id.hint_file_name() == name).then_some(id)
    }

    fn parse_pair(rest: &str) -> Option<Self> {
        let (generation, sequence) = rest.split_once('_')?;
        Some(Self::new(generation.parse().ok()?, sequence.parse().ok()?))
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data_file_name())
    }
}
