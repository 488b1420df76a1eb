//! Stub services shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use diarist::adapters::{CompletionRequest, CompletionService, Keyboard, Messenger, SpeechToText};
use diarist::core::{AnswerGenerator, EntryStore, MessagePipeline};
use diarist::domain::UserId;
use diarist::ingest::Transcriber;
use tempfile::TempDir;

/// Completion service returning a fixed reply and recording prompts
pub struct StubCompletion {
    reply: Option<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl StubCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => anyhow::bail!("completion service unavailable"),
        }
    }
}

/// Speech-to-text service returning a fixed transcript
pub struct StubStt {
    reply: Option<String>,
}

impl StubStt {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { reply: None })
    }
}

#[async_trait]
impl SpeechToText for StubStt {
    fn name(&self) -> &str {
        "stub"
    }

    async fn transcribe_file(&self, audio_path: &Path) -> Result<String> {
        anyhow::ensure!(audio_path.exists(), "staged audio missing");
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("speech-to-text unavailable"),
        }
    }
}

/// Messenger that records everything sent
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(UserId, String, Option<Keyboard>)>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text, _)| text.clone())
            .collect()
    }

    pub fn last_keyboard(&self) -> Option<Keyboard> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .and_then(|(_, _, keyboard)| keyboard.clone())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((user, text.to_string(), keyboard.cloned()));
        Ok(())
    }
}

/// A pipeline over a temp directory with the given stubs
pub struct Harness {
    pub temp: TempDir,
    pub store: Arc<EntryStore>,
    pub completion: Arc<StubCompletion>,
    pub messenger: Arc<RecordingMessenger>,
    pub pipeline: MessagePipeline,
}

impl Harness {
    pub fn new(completion: Arc<StubCompletion>, stt: Arc<StubStt>) -> Self {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(EntryStore::new(temp.path(), 16));
        let messenger = RecordingMessenger::new();

        let answers = AnswerGenerator::new(completion.clone(), 100, Duration::from_secs(5));
        let transcriber = Transcriber::new(stt, Duration::from_secs(5));
        let pipeline = MessagePipeline::new(store.clone(), answers, transcriber, messenger.clone());

        Self {
            temp,
            store,
            completion,
            messenger,
            pipeline,
        }
    }

    /// Lines of a user's file under the temp directory
    pub fn lines(&self, user: UserId, file: &str) -> Vec<String> {
        let path = self.temp.path().join(user.to_string()).join(file);
        match std::fs::read_to_string(path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}
