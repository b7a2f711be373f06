use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::telegram::types::Message;
use crate::utils::logging::TIMING_TARGET;

const TEXT_PREVIEW_CHARS: usize = 300;

#[derive(Debug)]
pub struct CommandTimer {
    command: String,
    chat_id: i64,
    chat_type: String,
    user_id: i64,
    username: Option<String>,
    message_id: i64,
    reply_to: Option<i64>,
    text: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl CommandTimer {
    pub fn from_message(command: &str, message: &Message) -> Self {
        let text: String = message
            .content()
            .replace('\n', " ")
            .chars()
            .take(TEXT_PREVIEW_CHARS)
            .collect();

        CommandTimer {
            command: command.to_string(),
            chat_id: message.chat.id,
            chat_type: message.chat.kind.clone(),
            user_id: message.from.id,
            username: message.from.username.clone(),
            message_id: message.message_id,
            reply_to: message.reply_to_message_id(),
            text,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=command_received command={} chat_id={} chat_type={} user_id={} username={:?} message_id={} reply_to={} received_at={} text={:?}",
            self.command,
            self.chat_id,
            self.chat_type,
            self.user_id,
            self.username,
            self.message_id,
            self.reply_to.map(|id| id.to_string()).unwrap_or_default(),
            self.started_at.to_rfc3339(),
            self.text
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=command_completed command={} chat_id={} user_id={} message_id={} started_at={} response_sent_at={} duration_s={:.3} status={} detail={}",
            self.command,
            self.chat_id,
            self.user_id,
            self.message_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

pub fn start_command_timer(command: &str, message: &Message) -> CommandTimer {
    let timer = CommandTimer::from_message(command, message);
    timer.log_received();
    timer
}

pub fn complete_command_timer(timer: &mut CommandTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

/// Times one Bot API call on the `bot.timing` target.
pub async fn log_api_timing<T, E, F, Fut>(method: &str, call: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        "event=api_request method={} started_at={}",
        method,
        started_at.to_rfc3339()
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=api_response method={} completed_at={} duration_s={:.3} status={}",
        method,
        Utc::now().to_rfc3339(),
        duration,
        status
    );

    result
}
