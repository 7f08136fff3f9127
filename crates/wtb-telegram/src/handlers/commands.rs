use std::sync::Arc;

use teloxide::prelude::*;

use wtb_core::{
    bot::CacheStats,
    commands::{parse_command, SETTINGS_USAGE},
    domain::ChatId,
    formatting::escape_html,
    messaging::types::{ChatAction, Command},
};

use crate::router::AppState;

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h {mins}m");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

fn presence_block(line: Option<&str>) -> String {
    match line {
        Some(l) => format!("🌍 Now: {}", escape_html(l)),
        None => "🌍 Now: <i>warming up…</i>".to_string(),
    }
}

fn help_text(presence: Option<&str>) -> String {
    format!(
        "🌦️ <b>Weather Bot</b>\n\n\
{}\n\n\
<b>📋 Commands:</b>\n\
/weather &lt;city&gt; [days] [decimals] - Current conditions and forecast\n\
/settings set &lt;key&gt; &lt;value&gt; - Change a chat setting\n\
/settings get &lt;key&gt; - Show one setting\n\
/settings list - Show all settings\n\
/settings reset - Restore defaults\n\
/status - Show bot status\n\
/help - Show this help message\n\n\
<b>⚙️ Settings:</b>\n\
• units: metric | imperial\n\
• decimal_places: 1-5\n\
• forecast_days: 1-5\n\n\
<b>💡 Example:</b> <code>/weather New York 3 1</code>",
        presence_block(presence)
    )
}

fn status_text(uptime_secs: u64, cache: CacheStats, chats: usize, presence: Option<&str>) -> String {
    [
        "📊 <b>Bot Status</b>\n".to_string(),
        format!("⏱️ Uptime: {}", format_duration(uptime_secs)),
        format!(
            "🗂️ Cache: {} places, {} reports",
            cache.places, cache.reports
        ),
        format!("💬 Chats with settings: {chats}"),
        presence_block(presence),
    ]
    .join("\n")
}

fn command_from(msg: &Message) -> Option<Command> {
    let text = msg.text()?;
    let (name, args) = parse_command(text);
    let user = msg.from();
    Some(Command {
        chat_id: ChatId(msg.chat.id.0),
        user_id: user.map(|u| wtb_core::domain::UserId(u.id.0 as i64)),
        username: user.and_then(|u| u.username.clone()),
        name,
        args,
    })
}

async fn reply(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat_id, html).await {
        tracing::error!(chat = chat_id.0, "failed to send reply: {e}");
    }
}

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(cmd) = command_from(&msg) else {
        return Ok(());
    };
    let chat_id = cmd.chat_id;

    tracing::info!(
        chat = chat_id.0,
        user = cmd.user_id.map(|u| u.0),
        username = cmd.username.as_deref().unwrap_or("unknown"),
        command = %cmd.name,
        args = %cmd.args,
        "command received"
    );

    match cmd.name.as_str() {
        "start" | "help" => {
            let line = state.presence.current_line().await;
            reply(&state, chat_id, &help_text(line.as_deref())).await;
        }

        "status" => {
            let body = status_text(
                state.started_at.elapsed().as_secs(),
                state.weather.cache_stats().await,
                state.weather.settings().chat_count().await,
                state.presence.current_line().await.as_deref(),
            );
            reply(&state, chat_id, &body).await;
        }

        "weather" => {
            let messenger = state.messenger.clone();
            let body = state
                .weather
                .handle_weather_with(chat_id, &cmd.args, move || async move {
                    let _ = messenger.send_chat_action(chat_id, ChatAction::Typing).await;
                })
                .await;
            reply(&state, chat_id, &body).await;
        }

        "settings" => {
            if cmd.args.is_empty() {
                reply(&state, chat_id, &escape_html(SETTINGS_USAGE)).await;
                return Ok(());
            }
            let body = state.weather.handle_settings(chat_id, &cmd.args).await;
            reply(&state, chat_id, &body).await;
        }

        _ => {
            reply(
                &state,
                chat_id,
                &format!(
                    "Unknown command /{}. Try /help.",
                    escape_html(&cmd.name)
                ),
            )
            .await;
        }
    }

    Ok(())
}
