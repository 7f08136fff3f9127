//! Periodic maintenance: drop inactive chats and expired cache entries.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{bot::WeatherBot, settings::now_secs, Result};

pub const RETRY_AFTER_ERROR: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub chats_removed: usize,
    pub cache_entries_removed: usize,
}

/// Run one maintenance pass.
pub async fn sweep(bot: &WeatherBot) -> Result<SweepReport> {
    let cache_entries_removed = bot.purge_caches().await;
    let chats_removed = bot.settings().cleanup_inactive(now_secs()).await?;
    Ok(SweepReport {
        chats_removed,
        cache_entries_removed,
    })
}

/// Sweep every `every`; after a failed sweep wait [`RETRY_AFTER_ERROR`] instead.
pub fn spawn(bot: Arc<WeatherBot>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = match sweep(&bot).await {
                Ok(report) => {
                    tracing::info!(
                        chats_removed = report.chats_removed,
                        cache_entries_removed = report.cache_entries_removed,
                        "housekeeping done"
                    );
                    every
                }
                Err(e) => {
                    tracing::error!("housekeeping failed: {e}");
                    RETRY_AFTER_ERROR.min(every)
                }
            };

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(wait) => {}
            }
        }
        tracing::debug!("housekeeping stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bot::tests::{FakeForecast, FakeGeocoder},
        domain::ChatId,
        settings::{SettingKey, SettingsStore},
    };

    fn bot(name: &str) -> Arc<WeatherBot> {
        let dir = std::env::temp_dir().join(format!("wtb-housekeeping-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{name}.json"));
        let _ = std::fs::remove_file(&path);

        Arc::new(WeatherBot::new(
            Arc::new(FakeGeocoder::default()),
            Arc::new(FakeForecast::default()),
            Arc::new(SettingsStore::open(path)),
            Duration::from_millis(1),
        ))
    }

    #[tokio::test]
    async fn sweep_purges_expired_cache_entries_and_keeps_active_chats() {
        let bot = bot("sweep");
        bot.settings()
            .set(ChatId(1), SettingKey::Units, "imperial")
            .await
            .unwrap();
        let _ = bot.handle_weather(ChatId(1), "Tokyo").await;
        assert_eq!(bot.cache_stats().await.places, 1);

        sleep(Duration::from_millis(5)).await;
        let report = sweep(&bot).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                chats_removed: 0,
                cache_entries_removed: 2
            }
        );
        assert_eq!(bot.settings().chat_count().await, 1);
    }

    #[tokio::test]
    async fn spawned_task_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = spawn(bot("cancel"), Duration::from_secs(3600), cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
