//! Adapter interfaces for external systems.
//!
//! Adapters provide a unified interface for the hosted services the bot
//! depends on: a text-completion model, a speech-to-text model, and the chat
//! transport used to reply to users.

pub mod openai;
pub mod telegram;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::domain::UserId;

pub use openai::OpenAiClient;
pub use telegram::TelegramClient;

/// Parameters for a single text-completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl CompletionRequest {
    /// Deterministic sampling with no penalty adjustments
    pub fn deterministic(prompt: String, max_tokens: u32) -> Self {
        Self {
            prompt,
            temperature: 0.0,
            max_tokens,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Text-completion model
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Generate text for a prompt, returned untrimmed
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Speech-to-text model
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe the audio file at `audio_path`
    async fn transcribe_file(&self, audio_path: &Path) -> Result<String>;
}

/// Reply keyboard attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Show these buttons, hidden again after one press
    Options(Vec<Vec<String>>),

    /// Hide any keyboard currently shown
    Remove,
}

impl Keyboard {
    /// A single row of buttons
    pub fn row<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Options(vec![labels.into_iter().map(Into::into).collect()])
    }
}

/// Chat transport used to talk back to a user
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) -> Result<()>;
}
