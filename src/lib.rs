//! # caskstore
//!
//! A log-structured key-value store in the Bitcask style:
//! - Append-only data segments, rolled over at a size threshold
//! - In-memory key directory for O(1) writes and one-seek reads
//! - Crash recovery by log replay, or from hint files after a merge
//! - On-demand merge that drops deleted keys and rewrites hints
//! - Single writer / multiple read-only handles per directory
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store Handle                          │
//! │        get / put / delete / list_keys / fold / merge         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌──────────────┐          ┌──────────────┐
//!   │ SegmentWriter│          │    KeyDir    │
//!   │   (Append)   │          │  (HashMap)   │
//!   └──────┬───────┘          └──────▲───────┘
//!          │                         │ rebuilt by
//!          ▼                         │
//!   ┌──────────────┐          ┌──────┴───────┐
//!   │ epoch_<g>_<s>│─────────►│   Recovery   │
//!   │ hint_epoch_* │          │ (hint / log) │
//!   └──────────────┘          └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskstore::OpenOption;
//!
//! # fn main() -> caskstore::Result<()> {
//! let mut store = caskstore::open("stations", &[OpenOption::ReadWrite])?;
//! store.put("station-1", r#"{"battery":"low"}"#)?;
//! assert!(store.get("station-1")?.is_some());
//! store.merge()?;
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod segment;
pub mod keydir;
pub mod recovery;
pub mod merge;
pub mod lock;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, OpenOption};
pub use merge::MergeReport;
pub use record::TOMBSTONE;
pub use recovery::{RecoveryMode, RecoveryResult};
pub use store::{open, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of caskstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
