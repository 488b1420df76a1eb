//! Slash commands understood by the bot.

use crate::adapters::telegram::BotCommand;

/// Button confirming `/delete`
pub const CONFIRM_DELETE: &str = "Yes, delete everything";

/// Button abandoning `/delete`
pub const CANCEL_DELETE: &str = "Cancel";

pub const HELP_TEXT: &str = "Send me anything you want to remember and I'll add it to your journal. \
Voice messages work too.\n\n\
End a message with \"?\" and I'll answer it from what you've told me so far.\n\n\
/stats - how much is in your journal\n\
/delete - erase everything I've stored for you\n\
/help - show this message";

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Stats,
    Delete,
    Unknown(String),
}

impl Command {
    /// Parse a message as a command. Returns `None` for ordinary text.
    ///
    /// Accepts the `/cmd@botname` form Telegram uses in groups and ignores
    /// anything after the command word.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();

        Some(match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "stats" => Self::Stats,
            "delete" => Self::Delete,
            _ => Self::Unknown(name),
        })
    }

    /// Entries for the client-side command menu
    pub fn menu() -> Vec<BotCommand> {
        [
            ("help", "How to use this journal"),
            ("stats", "Show how much is in your journal"),
            ("delete", "Delete all your data"),
        ]
        .into_iter()
        .map(|(command, description)| BotCommand {
            command: command.to_string(),
            description: description.to_string(),
        })
        .collect()
    }
}
