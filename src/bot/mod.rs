//! Telegram bot front end.
//!
//! [`Dispatcher`] decides what to do with each incoming message: commands,
//! the `/delete` confirmation flow, or the message pipeline. [`run_polling`]
//! feeds it updates from Telegram one at a time, in arrival order.

pub mod commands;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::telegram::{Message, Update};
use crate::adapters::{Keyboard, Messenger, OpenAiClient, TelegramClient};
use crate::config::ResolvedConfig;
use crate::core::{AnswerGenerator, EntryStore, MessagePipeline, Outcome, PipelineError};
use crate::domain::UserId;
use crate::ingest::Transcriber;

pub use commands::{Command, CANCEL_DELETE, CONFIRM_DELETE, HELP_TEXT};

/// Pause after a failed getUpdates call
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Wire the pipeline to OpenAI services and the given messenger
pub fn build_pipeline(
    config: &ResolvedConfig,
    messenger: Arc<dyn Messenger>,
) -> Result<MessagePipeline> {
    let openai = Arc::new(OpenAiClient::from_settings(&config.openai)?);
    let store = Arc::new(EntryStore::from_config(config));
    let timeout = config.services.timeout();

    let answers = AnswerGenerator::new(openai.clone(), config.openai.max_tokens, timeout);
    let transcriber =
        Transcriber::new(openai, timeout).with_suffix(config.openai.audio_suffix.clone());

    Ok(MessagePipeline::new(store, answers, transcriber, messenger))
}

/// Routes messages to commands or the pipeline and replies on failure
pub struct Dispatcher {
    pipeline: MessagePipeline,
    messenger: Arc<dyn Messenger>,

    /// Users who were asked to confirm `/delete`
    pending_deletes: HashSet<UserId>,
}

impl Dispatcher {
    pub fn new(pipeline: MessagePipeline, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            pipeline,
            messenger,
            pending_deletes: HashSet::new(),
        }
    }

    pub fn is_delete_pending(&self, user: UserId) -> bool {
        self.pending_deletes.contains(&user)
    }

    /// Handle a typed message
    #[instrument(skip(self, text), fields(user = %user))]
    pub async fn handle_text(&mut self, user: UserId, timestamp: i64, text: &str) {
        if self.pending_deletes.remove(&user) {
            if text.trim() == CONFIRM_DELETE {
                self.delete_everything(user).await;
                return;
            }

            self.reply(user, "Okay, nothing was deleted.", Some(&Keyboard::Remove))
                .await;
            if text.trim() == CANCEL_DELETE {
                return;
            }
        }

        if let Some(command) = Command::parse(text) {
            self.handle_command(user, command).await;
            return;
        }

        let result = self.pipeline.handle_text(user, timestamp, text, None).await;
        self.finish(user, result).await;
    }

    /// Handle a downloaded voice clip
    #[instrument(skip(self, audio), fields(user = %user))]
    pub async fn handle_voice(&mut self, user: UserId, timestamp: i64, audio: &[u8], file_id: &str) {
        if self.pending_deletes.remove(&user) {
            self.reply(user, "Okay, nothing was deleted.", Some(&Keyboard::Remove))
                .await;
        }

        let result = self
            .pipeline
            .handle_voice(user, timestamp, audio, file_id.to_string())
            .await;
        self.finish(user, result).await;
    }

    async fn finish(&self, user: UserId, result: Result<Outcome, PipelineError>) {
        match result {
            Ok(outcome) => debug!(?outcome, "Message handled"),
            Err(PipelineError::Reply(e)) => {
                // The reply channel itself is failing; nothing useful to send
                error!(error = %e, "Failed to deliver reply");
            }
            Err(e) => {
                error!(error = %e, "Message processing failed");
                self.reply(user, e.user_message(), None).await;
            }
        }
    }

    async fn handle_command(&mut self, user: UserId, command: Command) {
        debug!(?command, "Command received");
        match command {
            Command::Start => {
                let text = format!("Hi! I'm your journal.\n\n{}", HELP_TEXT);
                self.reply(user, &text, None).await;
            }
            Command::Help => self.reply(user, HELP_TEXT, None).await,
            Command::Stats => self.send_stats(user).await,
            Command::Delete => {
                self.pending_deletes.insert(user);
                let keyboard = Keyboard::row([CONFIRM_DELETE, CANCEL_DELETE]);
                self.reply(
                    user,
                    "This permanently deletes your whole journal and every answered question. \
                     Are you sure?",
                    Some(&keyboard),
                )
                .await;
            }
            Command::Unknown(name) => {
                let text = format!("I don't know the command /{}. Try /help.", name);
                self.reply(user, &text, None).await;
            }
        }
    }

    async fn send_stats(&self, user: UserId) {
        let stats = match self.pipeline.store().stats(user).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Failed to read stats");
                let err = PipelineError::from(e);
                self.reply(user, err.user_message(), None).await;
                return;
            }
        };

        let mut text = format!(
            "Your journal has {} entries and {} answered questions.",
            stats.journal_entries, stats.questions
        );
        if let Some(at) = stats.last_recorded_at() {
            text.push_str(&format!("\nLast activity: {}", at.format("%Y-%m-%d %H:%M UTC")));
        }
        self.reply(user, &text, None).await;
    }

    async fn delete_everything(&self, user: UserId) {
        match self.pipeline.store().delete_user(user).await {
            Ok(_) => {
                self.reply(user, "Done. Everything you told me has been deleted.", Some(&Keyboard::Remove))
                    .await
            }
            Err(e) => {
                error!(error = %e, "Failed to delete user data");
                self.reply(
                    user,
                    "Sorry, I couldn't delete your data right now. Please try again later.",
                    Some(&Keyboard::Remove),
                )
                .await;
            }
        }
    }

    async fn reply(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.messenger.send(user, text, keyboard).await {
            warn!(%user, error = %e, "Failed to send reply");
        }
    }
}

/// Poll Telegram for updates until Ctrl-C
pub async fn run_polling(
    telegram: Arc<TelegramClient>,
    mut dispatcher: Dispatcher,
    poll_timeout_seconds: u64,
) -> Result<()> {
    if let Err(e) = telegram.set_my_commands(&Command::menu()).await {
        warn!(error = %e, "Failed to publish command menu");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut offset = 0i64;
    info!("Polling Telegram for updates");

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down");
                return Ok(());
            }
            result = telegram.get_updates(offset, poll_timeout_seconds) => match result {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        handle_update(&telegram, &mut dispatcher, update).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling failed; retrying");
                    if let Some(signal) = retry_pause(&mut shutdown, POLL_RETRY_DELAY).await {
                        signal.context("Failed to listen for Ctrl-C")?;
                        info!("Shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Wait out `delay` unless `shutdown` completes first, returning its output
async fn retry_pause<F>(shutdown: &mut F, delay: Duration) -> Option<F::Output>
where
    F: Future + Unpin,
{
    tokio::select! {
        output = shutdown => Some(output),
        _ = tokio::time::sleep(delay) => None,
    }
}

async fn handle_update(telegram: &TelegramClient, dispatcher: &mut Dispatcher, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    handle_message(telegram, dispatcher, message).await;
}

async fn handle_message(telegram: &TelegramClient, dispatcher: &mut Dispatcher, message: Message) {
    let user = message.user_id();

    if let Some(voice) = &message.voice {
        match telegram.download(&voice.file_id).await {
            Ok(audio) => {
                dispatcher
                    .handle_voice(user, message.date, &audio, &voice.file_id)
                    .await
            }
            Err(e) => {
                error!(%user, error = %e, "Failed to download voice message");
                let text = "Sorry, I couldn't fetch that voice message. Please try again.";
                if let Err(e) = telegram.send_message(user.0, text, None).await {
                    warn!(%user, error = %e, "Failed to send reply");
                }
            }
        }
        return;
    }

    match &message.text {
        Some(text) => dispatcher.handle_text(user, message.date, text).await,
        None => {
            debug!(%user, "Ignoring message without text or voice");
            let text = "I can only read text and voice messages.";
            if let Err(e) = telegram.send_message(user.0, text, None).await {
                warn!(%user, error = %e, "Failed to send reply");
            }
        }
    }
}

/// Start the bot with the given configuration
pub async fn run(config: &ResolvedConfig) -> Result<()> {
    let telegram = Arc::new(TelegramClient::from_settings(&config.telegram)?);
    let pipeline = build_pipeline(config, telegram.clone())?;
    info!(data_dir = %config.data_dir.display(), "Journal bot starting");

    let dispatcher = Dispatcher::new(pipeline, telegram.clone());
    run_polling(telegram, dispatcher, config.telegram.poll_timeout_seconds).await
}
