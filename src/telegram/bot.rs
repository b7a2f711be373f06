use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::telegram::format::{escape_html, ParseMode};
use crate::telegram::keyboard::InlineKeyboard;
use crate::telegram::scheduler::{JobId, JobSchedule, Scheduler, SchedulerError};
use crate::telegram::types::{Chat, Message, Update};
use crate::utils::http::build_http_client;
use crate::utils::text::{floor_boundary, split_point, truncate_units, utf16_len};
use crate::utils::timing::log_api_timing;

/// Longest text sent in one message, in UTF-16 code units.
pub const MAX_MESSAGE_LENGTH: usize = 2048;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("{method} request failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} returned an unreadable response: {source}")]
    Decode {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} failed with error {code}: {description}")]
    Api {
        method: String,
        code: i64,
        description: String,
    },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Value,
    error_code: Option<i64>,
    description: Option<String>,
}

type Params = Vec<(&'static str, String)>;

/// Client for the Bot HTTP API plus the background job scheduler.
///
/// Calls never fail outward: errors are logged and the call yields an empty
/// result, which parses into values with no ids.
#[derive(Debug, Clone)]
pub struct Bot {
    client: Client,
    api_url: String,
    token: String,
    scheduler: Scheduler,
}

impl Bot {
    pub fn new(
        token: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Bot {
            client: build_http_client(timeout)?,
            api_url: api_url.into(),
            token: token.into(),
            scheduler: Scheduler::new(),
        })
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        Self::new(
            config.bot_token.clone(),
            config.api_url.clone(),
            config.http_timeout,
        )
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    async fn try_execute(&self, method: &str, params: &[(&'static str, String)]) -> Result<Value, TelegramError> {
        let url = format!("{}/bot{}/{}", self.api_url, self.token, method);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|source| TelegramError::Transport {
                method: method.to_string(),
                source: source.without_url(),
            })?;

        let status = response.status();
        let envelope: ApiResponse =
            response
                .json()
                .await
                .map_err(|source| TelegramError::Decode {
                    method: method.to_string(),
                    source: source.without_url(),
                })?;

        if !status.is_success() || !envelope.ok {
            return Err(TelegramError::Api {
                method: method.to_string(),
                code: envelope
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                description: envelope
                    .description
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        Ok(envelope.result)
    }

    /// Runs one API method and returns its `result`, or `Value::Null` when
    /// the call failed for any reason.
    pub async fn execute(&self, method: &str, params: &[(&'static str, String)]) -> Value {
        match log_api_timing(method, || self.try_execute(method, params)).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Telegram call failed: {err}");
                Value::Null
            }
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Vec<Update> {
        match self.execute("getUpdates", &[("offset", offset.to_string())]).await {
            Value::Array(entries) => entries.into_iter().map(Update::from_value).collect(),
            _ => Vec::new(),
        }
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
        reply_to: Option<i64>,
        reply_markup: Option<String>,
    ) -> Message {
        let mut params: Params = vec![
            ("chat_id", chat_id.to_string()),
            ("text", text.to_string()),
            ("parse_mode", parse_mode.as_str().to_string()),
        ];
        if let Some(reply_to) = reply_to {
            params.push(("reply_to_message_id", reply_to.to_string()));
        }
        if let Some(markup) = reply_markup {
            params.push(("reply_markup", markup));
        }
        Message::from_value(self.execute("sendMessage", &params).await)
    }

    /// Sends `text`, splitting it into a reply chain when it is longer than
    /// [`MAX_MESSAGE_LENGTH`]. Each piece replies to the previous one; the
    /// keyboard rides on the last piece, which is returned.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
        reply_to: Option<i64>,
        keyboard: &InlineKeyboard,
    ) -> Message {
        let mut rest = text;
        let mut reply_to = reply_to;

        while utf16_len(rest) > MAX_MESSAGE_LENGTH {
            let (head, tail) = rest.split_at(split_point(rest, MAX_MESSAGE_LENGTH));
            let sent = self.send_text(chat_id, head, parse_mode, reply_to, None).await;
            reply_to = sent.id();
            debug!("Sent piece of a long message, chaining to {:?}", reply_to);
            rest = tail;
        }

        self.send_text(chat_id, rest, parse_mode, reply_to, keyboard.to_json())
            .await
    }

    /// Replaces a message's text and keyboard in place.
    ///
    /// A rejected edit falls back to sending the whole text as a new
    /// message. An accepted edit of an over-long text is continued with a
    /// reply holding the part past the cap.
    pub async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: ParseMode,
        keyboard: &InlineKeyboard,
    ) -> Message {
        let (head, tail) = truncate_units(text, MAX_MESSAGE_LENGTH);
        let mut params: Params = vec![
            ("chat_id", chat_id.to_string()),
            ("message_id", message_id.to_string()),
            ("text", head.to_string()),
            ("parse_mode", parse_mode.as_str().to_string()),
        ];
        if let Some(markup) = keyboard.to_json() {
            params.push(("reply_markup", markup));
        }

        let edited = Message::from_value(self.execute("editMessageText", &params).await);
        match edited.id() {
            None => {
                self.send_message(chat_id, text, parse_mode, None, keyboard)
                    .await
            }
            Some(edited_id) if !tail.is_empty() => {
                self.send_message(
                    chat_id,
                    tail,
                    parse_mode,
                    Some(edited_id),
                    &InlineKeyboard::default(),
                )
                .await
            }
            Some(_) => edited,
        }
    }

    pub async fn forward_message(&self, chat_id: i64, from_chat: &Chat, message: &Message) -> Message {
        let params: Params = vec![
            ("chat_id", chat_id.to_string()),
            ("from_chat_id", from_chat.id.to_string()),
            ("message_id", message.message_id.to_string()),
        ];
        Message::from_value(self.execute("forwardMessage", &params).await)
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) {
        let params: Params = vec![("callback_query_id", callback_query_id.to_string())];
        self.execute("answerCallbackQuery", &params).await;
    }

    /// Sends a pretty-printed, key-sorted JSON rendering of `value`.
    ///
    /// Long renderings go out as a reply chain where every piece is its own
    /// `<pre>` block, so no piece carries an unbalanced tag.
    pub async fn dump(&self, chat_id: i64, value: &Value) -> Message {
        let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        let escaped = escape_html(&rendered);
        let budget = MAX_MESSAGE_LENGTH - utf16_len(&ParseMode::Html.pre(""));

        let mut reply_to = None;
        let mut sent = Message::default();
        for piece in pre_pieces(&escaped, budget) {
            sent = self
                .send_text(chat_id, &ParseMode::Html.pre(piece), ParseMode::Html, reply_to, None)
                .await;
            reply_to = sent.id();
        }
        sent
    }

    pub fn add_cron_job<F, Fut>(
        &self,
        callback: F,
        single: bool,
        schedule: &JobSchedule,
    ) -> Result<JobId, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.scheduler.add_job(callback, single, schedule)
    }

    pub fn remove_cron_job(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.scheduler.remove_job(job_id)
    }
}

/// Cuts already-escaped HTML into pieces of at most `max_units`, preferring
/// line ends and never cutting through an entity such as `&quot;`.
fn pre_pieces(escaped: &str, max_units: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = escaped;
    while utf16_len(rest) > max_units {
        let boundary = floor_boundary(rest, max_units);
        let mut cut = match rest[..boundary].rfind('\n') {
            Some(index) if index > 0 => index,
            _ => boundary,
        };
        if let Some(amp) = rest[..cut].rfind('&') {
            if amp > 0 && !rest[amp..cut].contains(';') {
                cut = amp;
            }
        }
        if cut == 0 {
            cut = boundary.max(rest.chars().next().map(char::len_utf8).unwrap_or(0));
        }
        let (piece, tail) = rest.split_at(cut);
        pieces.push(piece);
        rest = tail.strip_prefix('\n').unwrap_or(tail);
    }
    pieces.push(rest);
    pieces
}
