//! Telegram Bot API adapter.
//!
//! Long-polls for updates, downloads voice clips, and sends replies with an
//! optional reply keyboard.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TelegramSettings;
use crate::domain::UserId;

use super::{Keyboard, Messenger};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client
pub struct TelegramClient {
    /// Bot token
    bot_token: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// An incoming update from getUpdates
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix seconds
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<Voice>,
}

impl Message {
    /// The sender's id, falling back to the chat id
    pub fn user_id(&self) -> UserId {
        UserId(self.from.as_ref().map(|u| u.id).unwrap_or(self.chat.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// File handle from getFile
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramFile {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Entry of the bot's command menu
#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    /// Create from settings; a bot token is required
    pub fn from_settings(settings: &TelegramSettings) -> Result<Self> {
        let token = settings
            .bot_token
            .clone()
            .context("Telegram bot token required (set TELEGRAM_BOT_TOKEN or telegram.bot_token)")?;
        Ok(Self::new(token))
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.bot_token, method)
    }

    /// Build download URL for a file path returned by getFile
    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", API_BASE, self.bot_token, file_path)
    }

    /// POST a JSON payload and unwrap the Telegram envelope
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.client.post(self.api_url(method)).json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram {}", method))?;

        let result: TelegramResponse<T> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        result
            .result
            .with_context(|| format!("Telegram {} returned no result", method))
    }

    /// Long-poll for new messages after `offset`
    pub async fn get_updates(&self, offset: i64, poll_timeout_seconds: u64) -> Result<Vec<Update>> {
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": poll_timeout_seconds,
            "allowed_updates": ["message"],
        });

        // Leave headroom over the server-side poll timeout
        let http_timeout = Duration::from_secs(poll_timeout_seconds + 10);
        self.call("getUpdates", &payload, Some(http_timeout)).await
    }

    /// Send a text message
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<i64> {
        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = reply_markup(keyboard);
        }

        let result: MessageResult = self.call("sendMessage", &payload, None).await?;
        Ok(result.message_id)
    }

    /// Resolve a file id to a downloadable path
    pub async fn get_file(&self, file_id: &str) -> Result<TelegramFile> {
        let payload = serde_json::json!({ "file_id": file_id });
        self.call("getFile", &payload, None).await
    }

    /// Download a file's bytes by its file id
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.get_file(file_id).await?;
        let file_path = file
            .file_path
            .with_context(|| format!("Telegram file {} has no download path", file_id))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .context("Failed to download Telegram file")?
            .error_for_status()
            .context("Telegram file download failed")?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read Telegram file body")?;
        Ok(bytes.to_vec())
    }

    /// Publish the command menu shown by Telegram clients
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let payload = serde_json::json!({ "commands": commands });
        let _: bool = self.call("setMyCommands", &payload, None).await?;
        Ok(())
    }
}

/// Telegram `reply_markup` for a keyboard
fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    match keyboard {
        Keyboard::Options(rows) => {
            let buttons: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| serde_json::json!({ "text": label }))
                        .collect()
                })
                .collect();

            serde_json::json!({
                "keyboard": buttons,
                "one_time_keyboard": true,
                "resize_keyboard": true,
            })
        }
        Keyboard::Remove => serde_json::json!({ "remove_keyboard": true }),
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, user: UserId, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        // Private chats share the user's id
        self.send_message(user.0, text, keyboard).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = TelegramClient::new("TOKEN".to_string());
        assert_eq!(
            client.api_url("sendMessage"),
            "https://api.telegram.org/botTOKEN/sendMessage"
        );
        assert_eq!(
            client.file_url("voice/file_1.oga"),
            "https://api.telegram.org/file/botTOKEN/voice/file_1.oga"
        );
    }

    #[test]
    fn test_parse_updates() {
        let body = r#"{
            "ok": true,
            "result": [
                {
                    "update_id": 10,
                    "message": {
                        "message_id": 1,
                        "date": 1700000000,
                        "chat": {"id": 555, "type": "private"},
                        "from": {"id": 555, "is_bot": false, "first_name": "Sam"},
                        "text": "I have a dog named Rex"
                    }
                },
                {
                    "update_id": 11,
                    "message": {
                        "message_id": 2,
                        "date": 1700000060,
                        "chat": {"id": 555, "type": "private"},
                        "voice": {"file_id": "AwACAgQ", "file_unique_id": "u", "duration": 3, "mime_type": "audio/ogg"}
                    }
                },
                {"update_id": 12, "edited_message": {}}
            ]
        }"#;

        let parsed: TelegramResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(parsed.ok);
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 3);

        let first = updates[0].message.as_ref().unwrap();
        assert_eq!(first.user_id(), UserId(555));
        assert_eq!(first.text.as_deref(), Some("I have a dog named Rex"));

        let second = updates[1].message.as_ref().unwrap();
        assert_eq!(second.voice.as_ref().unwrap().file_id, "AwACAgQ");
        // No `from`: falls back to chat id
        assert_eq!(second.user_id(), UserId(555));

        assert!(updates[2].message.is_none());
    }

    #[test]
    fn test_reply_markup() {
        let markup = reply_markup(&Keyboard::row(["Yes", "No"]));
        assert_eq!(markup["keyboard"][0][0]["text"], "Yes");
        assert_eq!(markup["keyboard"][0][1]["text"], "No");
        assert_eq!(markup["one_time_keyboard"], true);

        let remove = reply_markup(&Keyboard::Remove);
        assert_eq!(remove["remove_keyboard"], true);
    }
}
