use chrono::Utc;
use rand::Rng;
use tracing::info;

use crate::handlers::command::{CommandContext, CommandError};
use crate::handlers::dispatcher::{CommandFuture, CommandGroup, CommandSpec};
use crate::handlers::command_groups;
use crate::telegram::format::ParseMode;
use crate::telegram::keyboard::{InlineButton, InlineKeyboard};
use crate::telegram::scheduler::{JobSchedule, SchedulerError};
use crate::utils::unicode::{describe_char, lookup_character};

pub const FACE_CHOICES: [[u32; 3]; 2] = [[6, 10, 20], [50, 100, 1000]];
pub const MAX_ROLLS: u32 = 1000;
/// One year.
pub const MAX_REMIND_MINUTES: u64 = 525_600;

const RANDOM_USAGE: &str = "/random min max";
const ROLL_USAGE: &str = "/roll [faces] [rolls]";
const UTF_USAGE: &str = "/utf text";
const STRING_USAGE: &str = "/string code";
const REMIND_USAGE: &str = "/remind minutes text";
const CANCEL_USAGE: &str = "/cancel job_id";

/// Commands anyone may run.
pub struct Standard;

impl CommandGroup for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn can_execute(&self, _ctx: &CommandContext) -> bool {
        true
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec {
                name: "echo",
                usage: "/echo text",
                description: "Repeat the text back",
                handler: echo,
            },
            CommandSpec {
                name: "random",
                usage: RANDOM_USAGE,
                description: "Draw an integer between min and max",
                handler: random,
            },
            CommandSpec {
                name: "roll",
                usage: ROLL_USAGE,
                description: "Roll dice, picking faces and rolls from a keyboard",
                handler: roll,
            },
            CommandSpec {
                name: "utf",
                usage: UTF_USAGE,
                description: "Describe every character of the text",
                handler: utf,
            },
            CommandSpec {
                name: "string",
                usage: STRING_USAGE,
                description: "Character for a code point, escape sequence or name",
                handler: string,
            },
            CommandSpec {
                name: "remind",
                usage: REMIND_USAGE,
                description: "Send the text back after some minutes",
                handler: remind,
            },
            CommandSpec {
                name: "cancel",
                usage: CANCEL_USAGE,
                description: "Cancel a reminder",
                handler: cancel,
            },
            CommandSpec {
                name: "help",
                usage: "/help",
                description: "List the commands",
                handler: help,
            },
        ]
    }
}

fn no_keyboard() -> InlineKeyboard {
    InlineKeyboard::default()
}

fn echo(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let text = format!("To you from you: {}", ctx.mode().escape(&ctx.joined_args()));
        Ok(ctx.answer(&text, &no_keyboard()).await)
    })
}

pub fn draw_between(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

fn random(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let min: i64 = ctx.parse_arg(0, RANDOM_USAGE)?;
        let max: i64 = ctx.parse_arg(1, RANDOM_USAGE)?;
        if min > max {
            return Err(CommandError::InvalidArgument {
                value: format!("{min} {max}"),
                reason: "min must not be greater than max".to_string(),
            });
        }
        let value = draw_between(min, max);
        Ok(ctx.answer(&value.to_string(), &no_keyboard()).await)
    })
}

pub fn faces_keyboard(command: &str) -> InlineKeyboard {
    let mut keyboard = InlineKeyboard::new();
    for (row, faces) in (1u32..).zip(FACE_CHOICES) {
        keyboard.add(
            row,
            faces
                .iter()
                .map(|face| InlineButton::new(face.to_string(), format!("/{command} {face}"))),
        );
    }
    keyboard
}

pub fn rolls_keyboard(command: &str, faces: u32) -> InlineKeyboard {
    let mut keyboard = InlineKeyboard::new();
    for row in 1u32..=3 {
        keyboard.add(
            row,
            (1..=3).map(|column| {
                let rolls = (row - 1) * 3 + column;
                InlineButton::new(rolls.to_string(), format!("/{command} {faces} {rolls}"))
            }),
        );
    }
    keyboard
}

/// Independent draws from `1..faces`.
pub fn roll_dice(faces: u32, rolls: u32) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    // TODO: the top face is never drawn; switch to 1..=faces once that is confirmed as intended
    (0..rolls).map(|_| rng.gen_range(1..faces)).collect()
}

pub fn roll_report(mode: ParseMode, faces: u32, draws: &[u32]) -> String {
    let mut lines = vec![mode.bold(&format!("Die with {faces} faces"))];
    lines.extend(
        draws
            .iter()
            .enumerate()
            .map(|(index, value)| format!("Roll {} of {}: {}", index + 1, draws.len(), value)),
    );
    lines.join("\n")
}

fn parse_faces(ctx: &CommandContext) -> Result<u32, CommandError> {
    let faces: u32 = ctx.parse_arg(0, ROLL_USAGE)?;
    if faces < 2 {
        return Err(CommandError::InvalidArgument {
            value: faces.to_string(),
            reason: "a die needs at least 2 faces".to_string(),
        });
    }
    Ok(faces)
}

fn roll(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        match ctx.args.len() {
            0 => {
                let keyboard = faces_keyboard(&ctx.name);
                Ok(ctx.answer("Choose the number of faces:", &keyboard).await)
            }
            1 => {
                let faces = parse_faces(ctx)?;
                let keyboard = rolls_keyboard(&ctx.name, faces);
                Ok(ctx.replace("Choose the number of rolls:", &keyboard).await)
            }
            _ => {
                let faces = parse_faces(ctx)?;
                let rolls: u32 = ctx.parse_arg(1, ROLL_USAGE)?;
                if !(1..=MAX_ROLLS).contains(&rolls) {
                    return Err(CommandError::InvalidArgument {
                        value: rolls.to_string(),
                        reason: format!("rolls must be between 1 and {MAX_ROLLS}"),
                    });
                }
                let report = roll_report(ctx.mode(), faces, &roll_dice(faces, rolls));
                Ok(ctx.replace(&report, &no_keyboard()).await)
            }
        }
    })
}

pub fn utf_report(mode: ParseMode, text: &str) -> String {
    text.chars()
        .map(|ch| {
            let info = describe_char(ch);
            format!(
                "Input: {}\nCode point: {}\nJSON: {}\nName: {}\nCategory: {}",
                mode.code(&mode.escape(&info.ch.to_string())),
                info.code_point,
                mode.code(&mode.escape(&info.json)),
                mode.escape(info.name.as_deref().unwrap_or("<unnamed>")),
                info.category
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn utf(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let text = ctx.joined_args();
        if text.is_empty() {
            return Err(CommandError::MissingArgument {
                usage: UTF_USAGE.to_string(),
            });
        }
        Ok(ctx.answer(&utf_report(ctx.mode(), &text), &no_keyboard()).await)
    })
}

fn string(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        ctx.arg(0, STRING_USAGE)?;
        let code = ctx.joined_args();
        let character = lookup_character(&code).ok_or_else(|| CommandError::InvalidArgument {
            value: code.clone(),
            reason: "not a code point, escape sequence or character name".to_string(),
        })?;
        let mode = ctx.mode();
        let text = format!(
            "The character for {} is {}",
            mode.escape(&code),
            mode.escape(&character)
        );
        Ok(ctx.answer(&text, &no_keyboard()).await)
    })
}

fn remind(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let minutes: u64 = ctx.parse_arg(0, REMIND_USAGE)?;
        if minutes > MAX_REMIND_MINUTES {
            return Err(CommandError::InvalidArgument {
                value: minutes.to_string(),
                reason: format!("reminders are limited to {MAX_REMIND_MINUTES} minutes"),
            });
        }
        let reminder = ctx.args.get(1..).unwrap_or_default().join(" ");
        if reminder.is_empty() {
            return Err(CommandError::MissingArgument {
                usage: REMIND_USAGE.to_string(),
            });
        }

        let bot = ctx.state.bot.clone();
        let chat_id = ctx.chat_id();
        let mode = ctx.mode();
        let reminder = mode.escape(&reminder);
        let run_date = Utc::now() + chrono::Duration::minutes(minutes as i64);
        let job_id = ctx.state.bot.add_cron_job(
            move || {
                let bot = bot.clone();
                let reminder = reminder.clone();
                async move {
                    bot.send_message(chat_id, &reminder, mode, None, &no_keyboard())
                        .await;
                }
            },
            true,
            &JobSchedule::at(run_date),
        )?;
        info!("Reminder {} set for chat {} in {} minute(s)", job_id, chat_id, minutes);

        let text = format!(
            "Reminder set for {minutes} minute(s). Cancel with {}",
            mode.code(&format!("/cancel {job_id}"))
        );
        Ok(ctx.answer(&text, &no_keyboard()).await)
    })
}

fn cancel(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move {
        let job_id = ctx.arg(0, CANCEL_USAGE)?;
        let mode = ctx.mode();
        let text = match ctx.state.bot.remove_cron_job(job_id) {
            Ok(()) => format!("Job {} cancelled", mode.code(&mode.escape(job_id))),
            Err(SchedulerError::JobNotFound(_)) => {
                format!("No job with id {}", mode.code(&mode.escape(job_id)))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(ctx.answer(&text, &no_keyboard()).await)
    })
}

pub fn help_text(ctx: &CommandContext) -> String {
    let mode = ctx.mode();
    let user = ctx.from_user();
    let mut lines = vec![format!(
        "Commands for {}:",
        mode.mention(&mode.escape(user.display_name()), user.id)
    )];
    for group in command_groups() {
        if !group.can_execute(ctx) {
            continue;
        }
        for spec in group.commands() {
            lines.push(format!(
                "{} - {}",
                mode.code(&mode.escape(spec.usage)),
                mode.italic(&mode.escape(spec.description))
            ));
        }
    }
    lines.join("\n")
}

fn help(ctx: &CommandContext) -> CommandFuture<'_> {
    Box::pin(async move { Ok(ctx.answer(&help_text(ctx), &no_keyboard()).await) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockito::Matcher;
    use serde_json::json;

    use crate::config::Config;
    use crate::handlers::build_dispatcher;
    use crate::state::AppState;
    use crate::telegram::bot::tests::{message_body, method_path, test_bot};
    use crate::telegram::bot::Bot;
    use crate::telegram::types::Update;

    fn labels(keyboard: &InlineKeyboard) -> Vec<Vec<String>> {
        keyboard
            .rows()
            .map(|row| row.iter().map(|button| button.text.clone()).collect())
            .collect()
    }

    fn message_update(text: &str) -> Update {
        Update::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 5, "first_name": "Ada"},
                "text": text
            }
        }))
    }

    fn offline_state() -> AppState {
        let bot = Bot::new("unused", "http://127.0.0.1:9", Duration::from_secs(1))
            .expect("http client");
        AppState::new(bot, Config::default())
    }

    #[test]
    fn random_draw_stays_in_range() {
        for _ in 0..200 {
            let value = draw_between(1, 6);
            assert!((1..=6).contains(&value));
        }
        assert_eq!(draw_between(4, 4), 4);
        assert!((-3..=-1).contains(&draw_between(-3, -1)));
    }

    #[test]
    fn face_keyboard_is_two_rows_of_three() {
        let keyboard = faces_keyboard("roll");
        assert_eq!(
            labels(&keyboard),
            vec![vec!["6", "10", "20"], vec!["50", "100", "1000"]]
        );
        let first = &keyboard.rows().next().expect("row")[0];
        assert_eq!(first.callback_data, "/roll 6");
    }

    #[test]
    fn roll_keyboard_is_three_rows_labeled_one_to_nine() {
        let keyboard = rolls_keyboard("roll", 20);
        assert_eq!(
            labels(&keyboard),
            vec![
                vec!["1", "2", "3"],
                vec!["4", "5", "6"],
                vec!["7", "8", "9"]
            ]
        );
        let last = keyboard.rows().last().expect("row").last().expect("button").clone();
        assert_eq!(last.callback_data, "/roll 20 9");
    }

    #[test]
    fn roll_report_has_one_numbered_line_per_draw() {
        let draws = roll_dice(6, 3);
        assert_eq!(draws.len(), 3);
        assert!(draws.iter().all(|value| (1..6).contains(value)));

        let report = roll_report(ParseMode::Html, 6, &draws);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "<b>Die with 6 faces</b>");
        assert!(lines[1].starts_with("Roll 1 of 3: "));
        assert!(lines[3].starts_with("Roll 3 of 3: "));
    }

    #[test]
    fn utf_report_describes_each_char() {
        let report = utf_report(ParseMode::Html, "A");
        assert!(report.contains("Code point: 65"));
        assert!(report.contains("Category: Lu"));
        assert!(report.contains("Name: LATIN CAPITAL LETTER A"));

        assert_eq!(utf_report(ParseMode::Html, "ab").split("\n\n").count(), 2);
    }

    #[test]
    fn help_lists_standard_commands() {
        let state = offline_state();
        let ctx = CommandContext::new(state, message_update("/help"), None);
        let text = help_text(&ctx);
        assert!(text.contains("<code>/roll [faces] [rolls]</code> - <i>Roll dice"));
        assert!(text.contains("tg://user?id=5"));
    }

    #[test]
    fn help_follows_the_configured_markup() {
        let config = Config {
            parse_mode: ParseMode::Markdown,
            ..Config::default()
        };
        let bot = Bot::new("unused", "http://127.0.0.1:9", Duration::from_secs(1))
            .expect("http client");
        let ctx = CommandContext::new(AppState::new(bot, config), message_update("/help"), None);
        let text = help_text(&ctx);
        assert!(text.contains("`/roll \\[faces] \\[rolls]` - _Roll dice"));
        assert!(text.contains("[Ada](tg://user?id=5)"));
    }

    #[tokio::test]
    async fn echo_replies_to_the_sender() {
        let mut server = mockito::Server::new_async().await;
        let send = server
            .mock("GET", method_path("sendMessage").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("text".into(), "To you from you: hi &lt;there&gt;".into()),
                Matcher::UrlEncoded("reply_to_message_id".into(), "10".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(11, 42, "To you from you: hi <there>"))
            .expect(1)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), Config::default());
        let sent = build_dispatcher()
            .dispatch(&state, message_update("/echo hi <there>"))
            .await
            .expect("dispatch");

        assert_eq!(sent.and_then(|message| message.id()), Some(11));
        send.assert_async().await;
    }

    #[tokio::test]
    async fn roll_with_two_arguments_replaces_the_prompt() {
        let mut server = mockito::Server::new_async().await;
        let edit = server
            .mock("GET", method_path("editMessageText").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("message_id".into(), "10".into()),
                Matcher::Regex("Roll(\\+|%20)3(\\+|%20)of(\\+|%20)3".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(10, 42, "rolled"))
            .expect(1)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), Config::default());
        let callback = Update::from_value(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 5, "first_name": "Ada"},
                "message": {"message_id": 10, "chat": {"id": 42}},
                "data": "/roll 6 3"
            }
        }));
        let sent = build_dispatcher()
            .dispatch(&state, callback)
            .await
            .expect("dispatch");

        assert_eq!(sent.and_then(|message| message.id()), Some(10));
        edit.assert_async().await;
    }

    #[tokio::test]
    async fn random_rejects_inverted_bounds() {
        let result = build_dispatcher()
            .dispatch(&offline_state(), message_update("/random 6 1"))
            .await;
        assert!(matches!(result, Err(CommandError::InvalidArgument { .. })));

        let result = build_dispatcher()
            .dispatch(&offline_state(), message_update("/random 1"))
            .await;
        assert!(matches!(result, Err(CommandError::MissingArgument { .. })));
    }

    #[tokio::test]
    async fn roll_rejects_single_faced_dice() {
        let result = build_dispatcher()
            .dispatch(&offline_state(), message_update("/roll 1 3"))
            .await;
        assert!(matches!(result, Err(CommandError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn cancel_unknown_job_answers_locally() {
        let mut server = mockito::Server::new_async().await;
        let send = server
            .mock("GET", method_path("sendMessage").as_str())
            .match_query(Matcher::UrlEncoded(
                "text".into(),
                "No job with id <code>missing</code>".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(12, 42, "No job"))
            .expect(1)
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), Config::default());
        let result = build_dispatcher()
            .dispatch(&state, message_update("/cancel missing"))
            .await;

        assert!(result.is_ok());
        send.assert_async().await;
    }

    #[tokio::test]
    async fn remind_registers_a_cancellable_job() {
        let mut server = mockito::Server::new_async().await;
        let _send = server
            .mock("GET", method_path("sendMessage").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_body(13, 42, "set"))
            .create_async()
            .await;

        let state = AppState::new(test_bot(&server), Config::default());
        let ctx = CommandContext::new(
            state.clone(),
            message_update("/remind 5 stretch"),
            crate::handlers::command::CommandLine::parse("/remind 5 stretch"),
        );
        remind(&ctx).await.expect("remind");

        let scheduler = state.bot.scheduler();
        assert_eq!(scheduler.job_count(), 1);
        scheduler.shutdown();
        assert_eq!(scheduler.job_count(), 0);
    }

    #[tokio::test]
    async fn remind_rejects_delays_beyond_a_year() {
        let state = offline_state();
        let text = format!("/remind {} later", MAX_REMIND_MINUTES + 1);
        let result = build_dispatcher()
            .dispatch(&state, message_update(&text))
            .await;

        assert!(matches!(result, Err(CommandError::InvalidArgument { .. })));
        assert_eq!(state.bot.scheduler().job_count(), 0);
    }
}
