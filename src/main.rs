use anyhow::Context;
use dotenvy::dotenv;
use serde_json::json;
use tracing::{error, info, warn};

mod config;
mod handlers;
mod state;
mod telegram;
mod utils;

use config::Config;
use handlers::build_dispatcher;
use handlers::dispatcher::Dispatcher;
use handlers::sara::schedule_intake_reminder;
use state::AppState;
use telegram::bot::Bot;
use telegram::keyboard::InlineKeyboard;
use telegram::types::Update;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level, &config.logs_dir);

    let bot = Bot::from_config(&config).context("failed to build the HTTP client")?;
    info!("Starting lampo_bot against {}", config.api_url);

    let state = AppState::new(bot, config);
    let dispatcher = build_dispatcher();

    match schedule_intake_reminder(&state) {
        Ok(Some(job_id)) => info!("Intake reminder scheduled as {job_id}"),
        Ok(None) => info!("Intake reminder disabled"),
        Err(err) => warn!("Intake reminder not scheduled: {err}"),
    }

    run_polling(&state, &dispatcher).await;

    let scheduler = state.bot.scheduler();
    info!("Stopping with {} scheduled job(s)", scheduler.job_count());
    scheduler.shutdown();
    Ok(())
}

/// Polls until Ctrl-C, handling each batch of updates in order.
async fn run_polling(state: &AppState, dispatcher: &Dispatcher) {
    let mut offset = 0;
    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            updates = state.bot.get_updates(offset) => updates,
        };

        if updates.is_empty() {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = tokio::time::sleep(state.config.poll_interval) => {}
            }
            continue;
        }

        for update in updates {
            offset = offset.max(update.update_id + 1);
            handle_update(state, dispatcher, update).await;
        }
    }
    info!("Ctrl-C received, stopping the polling loop");
}

async fn handle_update(state: &AppState, dispatcher: &Dispatcher, update: Update) {
    if let Some(callback_query_id) = update.callback_query_id() {
        state.bot.answer_callback_query(callback_query_id).await;
    }

    let update_id = update.update_id;
    let chat_id = update.message.chat.id;
    let message_id = update.message.id();
    let text = update.message.content().to_string();

    let Err(err) = dispatcher.dispatch(state, update).await else {
        return;
    };

    error!("Update {update_id} failed: {err}");
    let mode = state.config.parse_mode;
    state
        .bot
        .send_message(
            chat_id,
            &mode.escape(&err.to_string()),
            mode,
            message_id,
            &InlineKeyboard::default(),
        )
        .await;

    let owner = state.config.owner_chat_id;
    if owner != 0 && owner != chat_id {
        let report = json!({
            "update_id": update_id,
            "chat_id": chat_id,
            "text": text,
            "error": err.to_string(),
        });
        state.bot.dump(owner, &report).await;
    }
}
