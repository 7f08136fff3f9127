use std::{sync::Arc, time::Instant};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use wtb_core::{
    bot::WeatherBot, config::Config, messaging::port::MessagingPort, presence::PresenceTicker,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub weather: Arc<WeatherBot>,
    pub presence: Arc<PresenceTicker>,
    pub messenger: Arc<dyn MessagingPort>,
    pub started_at: Instant,
}

/// Commands advertised in the Telegram client's command menu.
pub fn command_menu() -> Vec<BotCommand> {
    vec![
        BotCommand::new("weather", "Weather for a city: <city> [days 1-5] [decimals 1-5]"),
        BotCommand::new("settings", "set|get|list|reset chat settings"),
        BotCommand::new("status", "Bot status"),
        BotCommand::new("help", "Show help"),
    ]
}

/// Long-poll Telegram until Ctrl-C.
pub async fn run_polling(
    cfg: Arc<Config>,
    weather: Arc<WeatherBot>,
    presence: Arc<PresenceTicker>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(
            username = %me.username(),
            application_id = cfg.application_id,
            "bot started"
        ),
        Err(e) => anyhow::bail!("telegram getMe failed: {e}"),
    }

    match bot.set_my_commands(command_menu()).await {
        Ok(_) => tracing::info!("synced command menu"),
        Err(e) => tracing::warn!("failed to sync command menu: {e}"),
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let state = Arc::new(AppState {
        cfg,
        weather,
        presence,
        messenger,
        started_at: Instant::now(),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_menu_names_are_valid_telegram_commands() {
        let menu = command_menu();
        assert_eq!(menu.len(), 4);
        for c in &menu {
            assert!(c.command.len() <= 32);
            assert!(c
                .command
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'));
            assert!(!c.description.is_empty() && c.description.len() <= 256);
        }
    }
}
