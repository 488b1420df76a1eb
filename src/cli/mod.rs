//! Command-line interface for diarist.
//!
//! Provides commands for running the Telegram bot, feeding a message through
//! the pipeline from the terminal, inspecting a user's journal, and showing
//! the resolved configuration.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::adapters::{Keyboard, Messenger};
use crate::bot;
use crate::config::{self, ResolvedConfig};
use crate::core::{EntryStore, Outcome};
use crate::domain::{JournalEntry, QaEntry, UserId};

/// diarist - a journal you can talk to
#[derive(Parser, Debug)]
#[command(name = "diarist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Telegram bot (long polling)
    Run,

    /// Send one message through the pipeline as a user
    Say {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Message text; ending it with "?" asks a question
        text: String,
    },

    /// Show a user's journal and answered questions
    Show {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Show answered questions instead of journal entries
        #[arg(long)]
        qa: bool,

        /// Maximum number of records to show (most recent)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete everything stored for a user
    Forget {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::load_config()?;

        match self.command {
            Commands::Run => bot::run(&config).await,
            Commands::Say { user, text } => say(&config, UserId(user), &text).await,
            Commands::Show { user, qa, limit } => show(&config, UserId(user), qa, limit).await,
            Commands::Forget { user, yes } => forget(&config, UserId(user), yes).await,
            Commands::Config => {
                show_config(&config);
                Ok(())
            }
        }
    }
}

/// Prints replies to the terminal instead of a chat
struct StdoutMessenger;

#[async_trait]
impl Messenger for StdoutMessenger {
    async fn send(&self, _user: UserId, text: &str, _keyboard: Option<&Keyboard>) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}

async fn say(config: &ResolvedConfig, user: UserId, text: &str) -> Result<()> {
    let pipeline = bot::build_pipeline(config, Arc::new(StdoutMessenger))?;
    let timestamp = Utc::now().timestamp();

    match pipeline.handle_text(user, timestamp, text, None).await {
        Ok(Outcome::Journaled) => {
            println!("Saved to journal.");
            Ok(())
        }
        Ok(Outcome::Answered { .. }) => Ok(()),
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
    }
}

async fn show(config: &ResolvedConfig, user: UserId, qa: bool, limit: usize) -> Result<()> {
    let store = EntryStore::from_config(config);
    let log = store.log(user).await?;
    let stats = log.stats();

    println!();
    println!("User {}", user);
    println!("══════════════════════════════════════════════════════════════");
    println!(
        "Journal entries: {}    Answered questions: {}",
        stats.journal_entries, stats.questions
    );
    println!();

    if qa {
        let skip = log.qa.len().saturating_sub(limit);
        for entry in log.qa.iter().skip(skip) {
            print_qa(entry);
        }
    } else {
        let skip = log.journal.len().saturating_sub(limit);
        for entry in log.journal.iter().skip(skip) {
            print_journal(entry);
        }
    }

    Ok(())
}

/// Display time of a record, falling back to the raw timestamp
fn format_recorded(at: Option<DateTime<Utc>>, timestamp: i64) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn print_journal(entry: &JournalEntry) {
    let marker = if entry.voice_reference.is_some() { " 🎙" } else { "" };
    let at = format_recorded(entry.recorded_at(), entry.timestamp);
    println!("[{}]{} {}", at, marker, entry.text);
}

fn print_qa(entry: &QaEntry) {
    let at = format_recorded(entry.recorded_at(), entry.timestamp);
    println!("[{}] Q: {}", at, entry.question);
    println!(
        "{:>18} A: {}",
        "",
        entry.answer.as_deref().unwrap_or("(no answer)")
    );
}

async fn forget(config: &ResolvedConfig, user: UserId, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete user {} without --yes", user);
    }

    let store = EntryStore::from_config(config);
    if store.delete_user(user).await? {
        println!("Deleted all data for user {}", user);
    } else {
        println!("No data stored for user {}", user);
    }
    Ok(())
}

fn show_config(config: &ResolvedConfig) {
    let secret = |value: &Option<String>| if value.is_some() { "(set)" } else { "(not set)" };

    println!();
    println!("Resolved Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!(
        "Config file:        {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Data directory:     {}", config.data_dir.display());
    println!("Cached users (max): {}", config.storage.max_cached_users);
    println!("Service timeout:    {}s", config.services.timeout_seconds);
    println!();
    println!("Telegram token:     {}", secret(&config.telegram.bot_token));
    println!("Poll timeout:       {}s", config.telegram.poll_timeout_seconds);
    println!();
    println!("OpenAI key:         {}", secret(&config.openai.api_key));
    println!("OpenAI base URL:    {}", config.openai.base_url);
    println!("Completion model:   {}", config.openai.completion_model);
    println!("Transcription:      {}", config.openai.transcription_model);
    println!("Max answer tokens:  {}", config.openai.max_tokens);
    println!("Voice file suffix:  {}", config.openai.audio_suffix);
}
