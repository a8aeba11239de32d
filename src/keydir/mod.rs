//! Key Directory Module
//!
//! In-memory index from key to the location of its newest value.
//!
//! ## Responsibilities
//! - O(1) lookup of a key's segment, offset and size
//! - Rebuilt wholesale by recovery and merge
//! - Updated by put/delete only after the append succeeded
//!
//! Deleted keys are removed outright; the index never holds tombstones.

mod table;

pub use table::KeyDir;

use crate::segment::SegmentId;

/// Where the current value of a key lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDirEntry {
    /// Segment holding the value
    pub segment: SegmentId,

    /// Value length in bytes
    pub value_size: u32,

    /// Byte offset of the value within the segment
    pub value_offset: u32,

    /// Unix seconds of the write
    pub timestamp: i32,
}
