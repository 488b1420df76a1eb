//! Domain types for diarist.
//!
//! This module contains the core data structures:
//! - Entries: journal and question/answer records, per-user logs
//! - Intent: the journal-or-question classifier

pub mod entries;
pub mod intent;

// Re-export commonly used types
pub use entries::{JournalEntry, LogStats, QaEntry, UserId, UserLog};
pub use intent::{classify, Intent};
