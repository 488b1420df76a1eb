//! Tab-separated record encoding for the per-user log files.
//!
//! One record per `\n`-terminated line, fields joined by a tab, first line a
//! header naming the fields. Field values are backslash-escaped so that text
//! containing tabs or newlines survives a round trip:
//!
//! | raw      | written |
//! |----------|---------|
//! | `\`      | `\\`    |
//! | TAB      | `\t`    |
//! | LF       | `\n`    |
//! | CR       | `\r`    |
//! | `None`   | `\N`    |

use std::borrow::Cow;

use thiserror::Error;

use crate::domain::{JournalEntry, QaEntry};

/// Marker for an absent optional field
const NULL: &str = "\\N";

/// Why a line could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid timestamp: {0:?}")]
    Timestamp(String),

    #[error("invalid escape sequence: \\{0}")]
    Escape(char),

    #[error("dangling backslash at end of field")]
    DanglingBackslash,

    #[error("unexpected null in required field '{0}'")]
    UnexpectedNull(&'static str),

    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("header mismatch: expected {expected:?}, found {found:?}")]
    Header { expected: String, found: String },
}

/// A record kind that lives in its own TSV file
pub trait TsvRecord: Sized {
    /// Field names, in column order
    const FIELDS: &'static [&'static str];

    fn to_fields(&self) -> Vec<Option<Cow<'_, str>>>;

    fn from_fields(fields: Vec<Option<String>>) -> Result<Self, DecodeError>;

    /// The header line (without the trailing newline)
    fn header() -> String {
        Self::FIELDS.join("\t")
    }

    /// Encode as a single line, newline included
    fn encode_line(&self) -> String {
        let mut line = self
            .to_fields()
            .into_iter()
            .map(|field| match field {
                Some(value) => escape(&value),
                None => NULL.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\t");
        line.push('\n');
        line
    }

    /// Decode one line (without its newline)
    fn decode_line(line: &str) -> Result<Self, DecodeError> {
        let raw: Vec<&str> = line.split('\t').collect();
        if raw.len() != Self::FIELDS.len() {
            return Err(DecodeError::FieldCount {
                expected: Self::FIELDS.len(),
                found: raw.len(),
            });
        }

        let fields = raw
            .into_iter()
            .map(|field| {
                if field == NULL {
                    Ok(None)
                } else {
                    unescape(field).map(Some)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_fields(fields)
    }

    /// Check a header line against [`TsvRecord::FIELDS`]
    fn check_header(line: &str) -> Result<(), DecodeError> {
        let expected = Self::header();
        if line == expected {
            Ok(())
        } else {
            Err(DecodeError::Header {
                expected,
                found: line.to_string(),
            })
        }
    }
}

impl TsvRecord for JournalEntry {
    const FIELDS: &'static [&'static str] = &["timestamp", "text", "voice_file_id"];

    fn to_fields(&self) -> Vec<Option<Cow<'_, str>>> {
        vec![
            Some(Cow::Owned(self.timestamp.to_string())),
            Some(Cow::Borrowed(self.text.as_str())),
            self.voice_reference.as_deref().map(Cow::Borrowed),
        ]
    }

    fn from_fields(fields: Vec<Option<String>>) -> Result<Self, DecodeError> {
        let mut fields = fields.into_iter();
        let timestamp = parse_timestamp(fields.next().flatten())?;
        let text = fields.next().flatten().ok_or(DecodeError::UnexpectedNull("text"))?;
        let voice_reference = fields.next().flatten();

        Ok(Self {
            timestamp,
            text,
            voice_reference,
        })
    }
}

impl TsvRecord for QaEntry {
    const FIELDS: &'static [&'static str] = &["timestamp", "question", "answer", "voice_file_id"];

    fn to_fields(&self) -> Vec<Option<Cow<'_, str>>> {
        vec![
            Some(Cow::Owned(self.timestamp.to_string())),
            Some(Cow::Borrowed(self.question.as_str())),
            self.answer.as_deref().map(Cow::Borrowed),
            self.voice_reference.as_deref().map(Cow::Borrowed),
        ]
    }

    fn from_fields(fields: Vec<Option<String>>) -> Result<Self, DecodeError> {
        let mut fields = fields.into_iter();
        let timestamp = parse_timestamp(fields.next().flatten())?;
        let question = fields
            .next()
            .flatten()
            .ok_or(DecodeError::UnexpectedNull("question"))?;
        let answer = fields.next().flatten();
        let voice_reference = fields.next().flatten();

        Ok(Self {
            timestamp,
            question,
            answer,
            voice_reference,
        })
    }
}

fn parse_timestamp(field: Option<String>) -> Result<i64, DecodeError> {
    let field = field.ok_or(DecodeError::UnexpectedNull("timestamp"))?;
    field
        .trim()
        .parse::<i64>()
        .map_err(|_| DecodeError::Timestamp(field))
}

/// Escape a field value for writing
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`]
pub fn unescape(field: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(DecodeError::Escape(other)),
            None => return Err(DecodeError::DanglingBackslash),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers() {
        assert_eq!(JournalEntry::header(), "timestamp\ttext\tvoice_file_id");
        assert_eq!(QaEntry::header(), "timestamp\tquestion\tanswer\tvoice_file_id");
    }

    #[test]
    fn test_journal_line_layout() {
        let entry = JournalEntry::new(1_700_000_000, "I have a dog named Rex");
        assert_eq!(
            entry.encode_line(),
            "1700000000\tI have a dog named Rex\t\\N\n"
        );

        let voiced = entry.with_voice(Some("AwACAgQ".to_string()));
        assert_eq!(
            voiced.encode_line(),
            "1700000000\tI have a dog named Rex\tAwACAgQ\n"
        );
    }

    #[test]
    fn test_qa_line_has_four_fields() {
        let entry = QaEntry::new(42, "What is my dog's name?").with_answer("Rex");
        let line = entry.encode_line();
        let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();
        assert_eq!(fields, vec!["42", "What is my dog's name?", "Rex", "\\N"]);
    }

    #[test]
    fn test_text_with_tabs_and_newlines_stays_on_one_line() {
        let entry = JournalEntry::new(1, "line one\nline\ttwo \\ done\r");
        let line = entry.encode_line();

        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(line.matches('\t').count(), 2);

        let decoded = JournalEntry::decode_line(line.trim_end_matches('\n')).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_empty_string_is_not_null() {
        let entry = QaEntry::new(7, "?").with_answer("");
        let decoded = QaEntry::decode_line(entry.encode_line().trim_end_matches('\n')).unwrap();
        assert_eq!(decoded.answer, Some(String::new()));
    }

    #[test]
    fn test_literal_backslash_n_text_is_not_null() {
        // The two characters `\N` typed by a user must not decode to None
        let entry = QaEntry::new(7, "q?").with_answer("\\N");
        let decoded = QaEntry::decode_line(entry.encode_line().trim_end_matches('\n')).unwrap();
        assert_eq!(decoded.answer.as_deref(), Some("\\N"));
    }

    #[test]
    fn test_wrong_field_count() {
        let err = QaEntry::decode_line("1\tq?\ta").unwrap_err();
        assert_eq!(err, DecodeError::FieldCount { expected: 4, found: 3 });
    }

    #[test]
    fn test_bad_timestamp() {
        let err = JournalEntry::decode_line("yesterday\ttext\t\\N").unwrap_err();
        assert!(matches!(err, DecodeError::Timestamp(_)));
    }

    #[test]
    fn test_bad_escape() {
        assert_eq!(unescape("a\\qb"), Err(DecodeError::Escape('q')));
        assert_eq!(unescape("abc\\"), Err(DecodeError::DanglingBackslash));
    }

    #[test]
    fn test_null_text_is_rejected() {
        let err = JournalEntry::decode_line("1\t\\N\t\\N").unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedNull("text"));
    }

    #[test]
    fn test_check_header() {
        assert!(JournalEntry::check_header("timestamp\ttext\tvoice_file_id").is_ok());
        assert!(matches!(
            JournalEntry::check_header("timestamp\tquestion\tanswer\tvoice_file_id"),
            Err(DecodeError::Header { .. })
        ));
    }
}
