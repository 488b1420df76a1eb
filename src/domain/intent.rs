//! Routing of incoming text to journaling or answering.

use serde::{Deserialize, Serialize};

/// What an incoming message asks the bot to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Store the text as a journal entry
    Journal,

    /// Answer the text from the journal
    Question,
}

/// Classify a message.
///
/// A message is a question iff it ends with `?` once trailing whitespace is
/// removed. This is purely syntactic; nothing else is considered.
pub fn classify(text: &str) -> Intent {
    if text.trim_end().ends_with('?') {
        Intent::Question
    } else {
        Intent::Journal
    }
}
