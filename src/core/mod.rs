//! Core journaling logic.
//!
//! This module contains:
//! - EntryStore: Append-only per-user TSV logs behind a bounded cache
//! - Answer: Context assembly and question answering
//! - Pipeline: Per-message orchestration

pub mod answer;
pub mod cache;
pub mod entry_store;
pub mod pipeline;
pub mod tsv;

// Re-export commonly used types
pub use answer::{build_context, build_prompt, AnswerError, AnswerGenerator};
pub use cache::LogCache;
pub use entry_store::{EntryStore, StoreError, JOURNAL_FILE, QA_FILE};
pub use pipeline::{MessagePipeline, Outcome, PipelineError, TRANSCRIPT_PREFIX};
pub use tsv::{DecodeError, TsvRecord};
