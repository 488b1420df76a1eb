//! OpenAI-compatible HTTP client for completions and audio transcription.
//!
//! Endpoints:
//! - POST {base_url}/completions
//! - POST {base_url}/audio/transcriptions (multipart)
//!
//! Auth: Bearer token

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::config::OpenAiSettings;

use super::{CompletionRequest, CompletionService, SpeechToText};

/// OpenAI API client
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    completion_model: String,
    transcription_model: String,
    client: reqwest::Client,
}

/// Body of a completions request
#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a CompletionRequest,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Error envelope returned on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(
        api_key: String,
        base_url: String,
        completion_model: String,
        transcription_model: String,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            completion_model,
            transcription_model,
            client: reqwest::Client::new(),
        }
    }

    /// Create from settings; an API key is required
    pub fn from_settings(settings: &OpenAiSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .context("OpenAI API key required (set OPENAI_API_KEY or openai.api_key)")?;

        Ok(Self::new(
            api_key,
            settings.base_url.clone(),
            settings.completion_model.clone(),
            settings.transcription_model.clone(),
        ))
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into an error carrying the API message
    async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        anyhow::bail!("OpenAI {} failed ({}): {}", what, status, message.trim())
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    fn name(&self) -> &str {
        "openai-completions"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = CompletionBody {
            model: &self.completion_model,
            request,
        };

        let response = self
            .client
            .post(self.api_url("completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send completion request")?;

        let response = Self::check_status(response, "completion").await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .context("Completion response contained no choices")
    }
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    fn name(&self) -> &str {
        "openai-transcriptions"
    }

    async fn transcribe_file(&self, audio_path: &Path) -> Result<String> {
        let file_name = audio_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_bytes = tokio::fs::read(audio_path)
            .await
            .context("Failed to read audio file")?;

        let file_part = Part::bytes(file_bytes).file_name(file_name);

        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", file_part);

        let response = self
            .client
            .post(self.api_url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        let response = Self::check_status(response, "transcription").await?;
        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        Ok(parsed.text)
    }
}
