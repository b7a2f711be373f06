use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::state::AppState;
use crate::telegram::format::ParseMode;
use crate::telegram::keyboard::InlineKeyboard;
use crate::telegram::scheduler::SchedulerError;
use crate::telegram::types::{Message, Update, User};

static COMMAND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^/([A-Za-z0-9_]+)(?:@\w+)?(?:\s+(.*))?$").unwrap());

/// A `/name[@bot] args...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(text: &str) -> Option<Self> {
        let captures = COMMAND_PATTERN.captures(text.trim())?;
        let name = captures.get(1)?.as_str().to_lowercase();
        let args = captures
            .get(2)
            .map(|rest| rest.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Some(CommandLine { name, args })
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Usage: {usage}")]
    MissingArgument { usage: String },
    #[error("Invalid argument {value:?}: {reason}")]
    InvalidArgument { value: String, reason: String },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub type CommandResult = Result<Message, CommandError>;

/// Everything a handler sees about the update it is answering.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub state: AppState,
    pub update: Update,
    pub name: String,
    pub args: Vec<String>,
}

impl CommandContext {
    pub fn new(state: AppState, update: Update, command: Option<CommandLine>) -> Self {
        let (name, args) = command
            .map(|command| (command.name, command.args))
            .unwrap_or_default();
        CommandContext {
            state,
            update,
            name,
            args,
        }
    }

    pub fn message(&self) -> &Message {
        &self.update.message
    }

    pub fn from_user(&self) -> &User {
        &self.update.message.from
    }

    pub fn chat_id(&self) -> i64 {
        self.update.message.chat.id
    }

    /// Arguments joined back with single spaces.
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }

    pub fn arg(&self, index: usize, usage: &str) -> Result<&str, CommandError> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| CommandError::MissingArgument {
                usage: usage.to_string(),
            })
    }

    pub fn parse_arg<T>(&self, index: usize, usage: &str) -> Result<T, CommandError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.arg(index, usage)?;
        value
            .parse::<T>()
            .map_err(|err| CommandError::InvalidArgument {
                value: value.to_string(),
                reason: err.to_string(),
            })
    }

    /// Markup mode for replies, from `PARSE_MODE`.
    pub fn mode(&self) -> ParseMode {
        self.state.config.parse_mode
    }

    /// Sends `text` to the chat. Replies to the triggering message unless it
    /// came from a keyboard press, where the message belongs to the bot.
    pub async fn answer(&self, text: &str, keyboard: &InlineKeyboard) -> Message {
        let reply_to = if self.update.is_callback() {
            None
        } else {
            self.message().id()
        };
        self.state
            .bot
            .send_message(self.chat_id(), text, self.mode(), reply_to, keyboard)
            .await
    }

    /// Replaces the triggering message in place. Meant for keyboard presses,
    /// where that message is the prompt the bot sent earlier.
    pub async fn replace(&self, text: &str, keyboard: &InlineKeyboard) -> Message {
        self.state
            .bot
            .edit_message(
                self.chat_id(),
                self.message().message_id,
                text,
                self.mode(),
                keyboard,
            )
            .await
    }
}
