//! Per-message processing.
//!
//! Ties the classifier, entry store, transcriber and answer generator
//! together. Each message is handled on its own; the only state shared
//! between messages is the entry store.
//!
//! ```text
//! voice → Transcriber → echo transcript ─┐
//! text ──────────────────────────────────┴→ classify ─┬→ Journal  → append_journal
//!                                                     └→ Question → generate_answer → append_qa → reply
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::adapters::Messenger;
use crate::domain::{classify, Intent, JournalEntry, QaEntry, UserId};
use crate::ingest::{Transcriber, TranscriptionError};

use super::answer::{AnswerError, AnswerGenerator};
use super::entry_store::{EntryStore, StoreError};

/// Prefix of the message echoing a voice transcript back to the user
pub const TRANSCRIPT_PREFIX: &str = "🎙 ";

/// Errors that abort processing of a single message
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("failed to reply: {0:#}")]
    Reply(#[source] anyhow::Error),
}

impl PipelineError {
    /// Text to send the user in place of a normal reply
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Store(_) => "Sorry, I couldn't save that right now. Please try again later.",
            Self::Transcription(_) => {
                "Sorry, I couldn't understand that voice message. Please try again or type it."
            }
            Self::Answer(_) => "Sorry, I couldn't answer that right now. Please try again later.",
            Self::Reply(_) => "Sorry, something went wrong while replying.",
        }
    }
}

/// What happened to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Stored as a journal entry
    Journaled,

    /// Answered from the journal and stored as a QA entry
    Answered { answer: String },
}

/// Message processing pipeline
pub struct MessagePipeline {
    store: Arc<EntryStore>,
    answers: AnswerGenerator,
    transcriber: Transcriber,
    messenger: Arc<dyn Messenger>,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<EntryStore>,
        answers: AnswerGenerator,
        transcriber: Transcriber,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            store,
            answers,
            transcriber,
            messenger,
        }
    }

    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }

    /// Handle a text message (or a transcript)
    #[instrument(skip(self, text), fields(user = %user))]
    pub async fn handle_text(
        &self,
        user: UserId,
        timestamp: i64,
        text: &str,
        voice_reference: Option<String>,
    ) -> Result<Outcome, PipelineError> {
        match classify(text) {
            Intent::Question => {
                // Only answered questions are stored
                let journal = self.store.journal(user).await?;
                let answer = self.answers.generate_answer(&journal, text).await?;

                let entry = QaEntry::new(timestamp, text)
                    .with_answer(answer.clone())
                    .with_voice(voice_reference);
                self.store.append_qa(user, entry).await?;
                info!(context_entries = journal.len(), "Question answered");

                self.messenger
                    .send(user, &answer, None)
                    .await
                    .map_err(PipelineError::Reply)?;

                Ok(Outcome::Answered { answer })
            }
            Intent::Journal => {
                let entry = JournalEntry::new(timestamp, text).with_voice(voice_reference);
                self.store.append_journal(user, entry).await?;
                info!("Journal entry stored");

                Ok(Outcome::Journaled)
            }
        }
    }

    /// Handle a voice message: transcribe, echo the transcript, then process
    /// it as text. A failed transcription writes nothing.
    #[instrument(skip(self, audio), fields(user = %user, bytes = audio.len()))]
    pub async fn handle_voice(
        &self,
        user: UserId,
        timestamp: i64,
        audio: &[u8],
        voice_reference: String,
    ) -> Result<Outcome, PipelineError> {
        let text = self.transcriber.transcribe(audio).await?;

        let echo = format!("{}{}", TRANSCRIPT_PREFIX, text);
        if let Err(e) = self.messenger.send(user, &echo, None).await {
            warn!(error = %e, "Failed to echo transcript");
        }

        self.handle_text(user, timestamp, &text, Some(voice_reference))
            .await
    }
}
