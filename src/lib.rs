//! diarist - a journal you can talk to
//!
//! A chat bot that keeps a per-user journal. Statements are stored as
//! journal entries; questions (messages ending in `?`) are answered by a
//! language model using the user's own journal as context.
//!
//! # Architecture
//!
//! - Every user has two append-only TSV logs on disk (journal and answered
//!   questions)
//! - Logs are hydrated into a bounded in-memory cache on first use
//! - Voice messages are transcribed and then treated like text
//!
//! # Modules
//!
//! - `adapters`: External services (OpenAI, Telegram)
//! - `bot`: Telegram front end, commands, update loop
//! - `core`: Entry store, answer generation, message pipeline
//! - `domain`: Data structures (entries, classifier)
//! - `ingest`: Voice transcription
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the bot
//! TELEGRAM_BOT_TOKEN=... OPENAI_API_KEY=... diarist run
//!
//! # Talk to it from the terminal
//! diarist say --user 1 "I have a dog named Rex"
//! diarist say --user 1 "What is my dog's name?"
//! ```

pub mod adapters;
pub mod bot;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use config::ResolvedConfig;
pub use core::{AnswerGenerator, EntryStore, MessagePipeline, Outcome, PipelineError};
pub use domain::{classify, Intent, JournalEntry, QaEntry, UserId, UserLog};
pub use ingest::Transcriber;
