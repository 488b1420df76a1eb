//! Voice transcription.
//!
//! The clip is written to a scoped temporary file which the speech-to-text
//! service reads. The file is removed when the guard drops, whichever way the
//! call ends.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::adapters::SpeechToText;

/// Default suffix for Telegram voice notes (Opus in Ogg)
pub const DEFAULT_AUDIO_SUFFIX: &str = ".oga";

/// Errors that can occur while transcribing
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("failed to stage audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("speech-to-text service failed: {0:#}")]
    Service(#[source] anyhow::Error),

    #[error("speech-to-text timed out after {0:?}")]
    Timeout(Duration),

    #[error("speech-to-text returned no text")]
    Empty,
}

/// Turns voice clips into text through a [`SpeechToText`] service
pub struct Transcriber {
    service: Arc<dyn SpeechToText>,
    timeout: Duration,
    suffix: String,
}

impl Transcriber {
    pub fn new(service: Arc<dyn SpeechToText>, timeout: Duration) -> Self {
        Self {
            service,
            timeout,
            suffix: DEFAULT_AUDIO_SUFFIX.to_string(),
        }
    }

    /// File suffix the service uses to detect the audio format
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Transcribe raw audio bytes, returning trimmed text
    #[instrument(skip(self, audio), fields(bytes = audio.len(), service = self.service.name()))]
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        let staged = tempfile::Builder::new()
            .prefix("diarist-voice-")
            .suffix(&self.suffix)
            .tempfile()?;

        tokio::fs::write(staged.path(), audio).await?;
        debug!(path = %staged.path().display(), "Staged voice clip");

        let text = timeout(self.timeout, self.service.transcribe_file(staged.path()))
            .await
            .map_err(|_| TranscriptionError::Timeout(self.timeout))?
            .map_err(TranscriptionError::Service)?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(TranscriptionError::Empty);
        }

        Ok(text)
    }
}
