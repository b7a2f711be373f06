//! Personal commands for one configured user.
//!
//! Every plain message from that user is forwarded to the owner chat.
//! Mentioning the trigger word marks the daily intake as taken, which
//! silences the reminder job until the reset hour.

use chrono::{Timelike, Utc};
use tracing::{info, warn};

use crate::handlers::command::CommandContext;
use crate::handlers::dispatcher::{CommandFn, CommandFuture, CommandGroup, CommandSpec};
use crate::state::AppState;
use crate::telegram::keyboard::InlineKeyboard;
use crate::telegram::scheduler::{JobId, JobSchedule, SchedulerError};
use crate::telegram::types::Message;

pub struct Sara;

impl CommandGroup for Sara {
    fn name(&self) -> &'static str {
        "sara"
    }

    fn can_execute(&self, ctx: &CommandContext) -> bool {
        let allowed = ctx.state.config.sara_user_id;
        allowed != 0 && ctx.from_user().id == allowed
    }

    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }

    fn on_text(&self) -> Option<CommandFn> {
        Some(forward_to_owner)
    }

    fn on_unknown(&self) -> Option<CommandFn> {
        Some(not_implemented)
    }
}

pub fn mentions_trigger(text: &str, trigger: &str) -> bool {
    !trigger.is_empty() && text.to_lowercase().contains(&trigger.to_lowercase())
}

fn forward_to_owner(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let state = &ctx.state;
        let message = ctx.message();

        if !state.flags.presa()
            && mentions_trigger(message.content(), &state.config.presa_trigger)
            && state.flags.mark_presa()
        {
            info!("Intake marked as taken by message {}", message.message_id);
        }

        if state.config.owner_chat_id == 0 {
            warn!("OWNER_CHAT_ID is not set; message {} not forwarded", message.message_id);
            return Ok(Message::default());
        }

        Ok(state
            .bot
            .forward_message(state.config.owner_chat_id, &message.chat, message)
            .await)
    })
}

fn not_implemented(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let text = format!(
            "Darling, the command /{} isn't implemented yet",
            ctx.mode().escape(&ctx.name)
        );
        Ok(ctx.answer(&text, &InlineKeyboard::default()).await)
    })
}

/// Registers the recurring intake reminder. `Ok(None)` when it is disabled.
pub fn schedule_intake_reminder(state: &AppState) -> Result<Option<JobId>, SchedulerError> {
    let config = &state.config;
    if config.reminder_interval_minutes == 0 || config.sara_user_id == 0 {
        return Ok(None);
    }

    let job_state = state.clone();
    let job_id = state.bot.add_cron_job(
        move || {
            let state = job_state.clone();
            async move {
                intake_reminder_tick(&state, Utc::now().hour()).await;
            }
        },
        false,
        &JobSchedule::every_minutes(config.reminder_interval_minutes),
    )?;
    info!(
        "Intake reminder every {} minute(s) as job {}",
        config.reminder_interval_minutes, job_id
    );
    Ok(Some(job_id))
}

/// One reminder tick at `hour` (UTC).
///
/// During the reset hour the flag is cleared and nothing is sent. Otherwise
/// the reminder goes out only while the flag is unset.
pub async fn intake_reminder_tick(state: &AppState, hour: u32) -> Option<Message> {
    let config = &state.config;
    if hour == config.reminder_reset_hour {
        if state.flags.presa() {
            state.flags.set_presa(false);
            info!("Intake flag reset for a new day");
        }
        return None;
    }
    if state.flags.presa() {
        return None;
    }

    let mode = config.parse_mode;
    let text = mode.bold(&mode.escape(&config.reminder_text));
    Some(
        state
            .bot
            .send_message(
                config.sara_user_id,
                &text,
                mode,
                None,
                &InlineKeyboard::default(),
            )
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockito::Matcher;
    use serde_json::json;

    use crate::config::Config;
    use crate::handlers::build_dispatcher;
    use crate::telegram::bot::tests::{message_body, method_path, test_bot};
    use crate::telegram::bot::Bot;
    use crate::telegram::format::ParseMode;
    use crate::telegram::types::Update;

    const SARA: i64 = 77;
    const OWNER: i64 = 900;

    fn config() -> Config {
        Config {
            sara_user_id: SARA,
            owner_chat_id: OWNER,
            reminder_interval_minutes: 30,
            ..Config::default()
        }
    }

    fn update_from(user_id: i64, text: &str) -> Update {
        Update::from_value(json!({
            "update_id": 9,
            "message": {
                "message_id": 55,
                "chat": {"id": user_id, "type": "private"},
                "from": {"id": user_id, "first_name": "Sara"},
                "text": text
            }
        }))
    }

    fn offline_state(config: Config) -> AppState {
        let bot = Bot::new("unused", "http://127.0.0.1:9", Duration::from_secs(1))
            .expect("http client");
        AppState::new(bot, config)
    }

    #[test]
    fn trigger_match_ignores_case() {
        assert!(mentions_trigger("Ho PRESA la pillola", "presa"));
        assert!(!mentions_trigger("nothing here", "presa"));
        assert!(!mentions_trigger("presa", ""));
    }

    #[tokio::test]
    async fn trigger_word_sets_flag_and_forwards() {
        let mut server = mockito::Server::new_async().await;
        let forward = server
            .mock("GET", method_path("forwardMessage").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chat_id".into(), OWNER.to_string()),
                Matcher::UrlEncoded("from_chat_id".into(), SARA.to_string()),
                Matcher::UrlEncoded("message_id".into(), "55".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(600, OWNER, "Presa!"))
            .expect(2)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), config());
        let dispatcher = build_dispatcher();

        let sent = dispatcher
            .dispatch(&state, update_from(SARA, "Presa!"))
            .await
            .expect("dispatch");
        assert_eq!(sent.and_then(|message| message.id()), Some(600));
        assert!(state.flags.presa());

        dispatcher
            .dispatch(&state, update_from(SARA, "good night"))
            .await
            .expect("dispatch");
        assert!(state.flags.presa());
        forward.assert_async().await;
    }

    #[tokio::test]
    async fn stickers_are_forwarded_too() {
        let mut server = mockito::Server::new_async().await;
        let forward = server
            .mock("GET", method_path("forwardMessage").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chat_id".into(), OWNER.to_string()),
                Matcher::UrlEncoded("from_chat_id".into(), SARA.to_string()),
                Matcher::UrlEncoded("message_id".into(), "55".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(601, OWNER, ""))
            .expect(1)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), config());
        let sticker = Update::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 55,
                "chat": {"id": SARA, "type": "private"},
                "from": {"id": SARA, "first_name": "Sara"},
                "sticker": {"file_id": "CAACAgQ", "emoji": "💊"}
            }
        }));

        let sent = build_dispatcher()
            .dispatch(&state, sticker)
            .await
            .expect("dispatch");
        assert_eq!(sent.and_then(|message| message.id()), Some(601));
        assert!(!state.flags.presa());
        forward.assert_async().await;
    }

    #[tokio::test]
    async fn other_senders_are_not_forwarded() {
        let state = offline_state(config());
        let sent = build_dispatcher()
            .dispatch(&state, update_from(1, "presa"))
            .await
            .expect("dispatch");
        assert!(sent.is_none());
        assert!(!state.flags.presa());
    }

    #[tokio::test]
    async fn unknown_command_gets_a_gentle_reply() {
        let mut server = mockito::Server::new_async().await;
        let send = server
            .mock("GET", method_path("sendMessage").as_str())
            .match_query(Matcher::UrlEncoded(
                "text".into(),
                "Darling, the command /dance isn't implemented yet".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(56, SARA, "Darling"))
            .expect(1)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), config());
        build_dispatcher()
            .dispatch(&state, update_from(SARA, "/dance now"))
            .await
            .expect("dispatch");
        send.assert_async().await;
    }

    #[tokio::test]
    async fn reset_hour_clears_flag_without_reminding() {
        let state = offline_state(config());
        state.flags.set_presa(true);

        let hour = state.config.reminder_reset_hour;
        assert!(intake_reminder_tick(&state, hour).await.is_none());
        assert!(!state.flags.presa());
    }

    #[tokio::test]
    async fn taken_intake_silences_reminder() {
        let state = offline_state(config());
        state.flags.set_presa(true);

        let hour = (state.config.reminder_reset_hour + 6) % 24;
        assert!(intake_reminder_tick(&state, hour).await.is_none());
        assert!(state.flags.presa());
    }

    #[tokio::test]
    async fn pending_intake_sends_reminder() {
        let mut server = mockito::Server::new_async().await;
        let send = server
            .mock("GET", method_path("sendMessage").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chat_id".into(), SARA.to_string()),
                Matcher::UrlEncoded("text".into(), "<b>Did you take it?</b>".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(70, SARA, "Did you take it?"))
            .expect(1)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), config());
        let hour = (state.config.reminder_reset_hour + 6) % 24;
        let sent = intake_reminder_tick(&state, hour).await;

        assert_eq!(sent.and_then(|message| message.id()), Some(70));
        send.assert_async().await;
    }

    #[tokio::test]
    async fn reminder_uses_configured_markup() {
        let mut server = mockito::Server::new_async().await;
        let send = server
            .mock("GET", method_path("sendMessage").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("text".into(), "*Did you take the\\_pill?*".into()),
                Matcher::UrlEncoded("parse_mode".into(), "Markdown".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(71, SARA, "Did you take the_pill?"))
            .expect(1)
            .create_async()
            .await;

        let config = Config {
            parse_mode: ParseMode::Markdown,
            reminder_text: "Did you take the_pill?".to_string(),
            ..config()
        };
        let state = AppState::new(test_bot(&server), config);
        let hour = (state.config.reminder_reset_hour + 6) % 24;
        intake_reminder_tick(&state, hour).await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn reminder_job_is_registered_only_when_enabled() {
        let state = offline_state(config());
        let job_id = schedule_intake_reminder(&state)
            .expect("schedule")
            .expect("job id");
        assert!(state.bot.scheduler().contains(&job_id));
        state.bot.scheduler().shutdown();

        let disabled = offline_state(Config {
            reminder_interval_minutes: 0,
            ..config()
        });
        assert_eq!(schedule_intake_reminder(&disabled), Ok(None));
    }
}
