//! Journal and question/answer records.
//!
//! Records are immutable once written. A user's history is two ordered
//! sequences held in a [`UserLog`], mirroring the two files on disk.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform-assigned numeric user identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A declarative statement kept in the user's journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unix seconds
    pub timestamp: i64,

    /// Statement text (transcript for voice messages)
    pub text: String,

    /// Platform file id of the voice clip, if the entry came from one
    pub voice_reference: Option<String>,
}

impl JournalEntry {
    pub fn new(timestamp: i64, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
            voice_reference: None,
        }
    }

    pub fn with_voice(mut self, voice_reference: Option<String>) -> Self {
        self.voice_reference = voice_reference;
        self
    }

    /// Timestamp as a UTC datetime, if it is in range
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }
}

/// A question together with the answer derived from the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
    /// Unix seconds
    pub timestamp: i64,

    pub question: String,

    /// Always set before the entry is persisted
    pub answer: Option<String>,

    pub voice_reference: Option<String>,
}

impl QaEntry {
    pub fn new(timestamp: i64, question: impl Into<String>) -> Self {
        Self {
            timestamp,
            question: question.into(),
            answer: None,
            voice_reference: None,
        }
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_voice(mut self, voice_reference: Option<String>) -> Self {
        self.voice_reference = voice_reference;
        self
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }
}

/// Everything stored for one user, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLog {
    pub journal: Vec<JournalEntry>,
    pub qa: Vec<QaEntry>,
}

impl UserLog {
    pub fn is_empty(&self) -> bool {
        self.journal.is_empty() && self.qa.is_empty()
    }

    /// Summary counts and the time of the latest record
    pub fn stats(&self) -> LogStats {
        let last_timestamp = self
            .journal
            .iter()
            .map(|e| e.timestamp)
            .chain(self.qa.iter().map(|e| e.timestamp))
            .max();

        LogStats {
            journal_entries: self.journal.len(),
            questions: self.qa.len(),
            last_timestamp,
        }
    }
}

/// Counts reported by `/stats` and `diarist show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogStats {
    pub journal_entries: usize,
    pub questions: usize,
    pub last_timestamp: Option<i64>,
}

impl LogStats {
    /// Time of the latest record, if any
    pub fn last_recorded_at(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp.and_then(to_datetime)
    }
}

fn to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
}
