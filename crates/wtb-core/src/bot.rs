//! The weather bot application service.
//!
//! Owns the upstream ports, the lookup caches and the settings store. Every
//! public `*_reply` method turns failures into a user-facing message, so the
//! chat adapter never has to interpret errors itself.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    cache::TtlCache,
    commands::{parse_settings_args, parse_weather_args, SettingsCommand},
    domain::ChatId,
    errors::Error,
    formatting::{escape_html, format_weather_reply},
    ports::{ForecastSource, Geocoder},
    settings::SettingsStore,
    weather::{Place, WeatherQuery, WeatherResult},
    Result,
};

pub const NOT_FOUND_REPLY: &str = "Could not find the specified location.";
pub const UPSTREAM_REPLY: &str = "Could not fetch weather data.";
pub const GENERIC_REPLY: &str = "An error occurred while processing your request.";

/// Map an error to the message shown in chat.
pub fn user_message(err: &Error) -> String {
    match err {
        Error::InvalidInput(msg) => format!("❌ {}", escape_html(msg)),
        Error::NotFound(_) => NOT_FOUND_REPLY.to_string(),
        Error::Upstream(_) => UPSTREAM_REPLY.to_string(),
        _ => GENERIC_REPLY.to_string(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub places: usize,
    pub reports: usize,
}

pub struct WeatherBot {
    geocoder: Arc<dyn Geocoder>,
    forecast: Arc<dyn ForecastSource>,
    settings: Arc<SettingsStore>,
    places: Mutex<TtlCache<String, Place>>,
    reports: Mutex<TtlCache<String, WeatherResult>>,
}

impl WeatherBot {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        forecast: Arc<dyn ForecastSource>,
        settings: Arc<SettingsStore>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            geocoder,
            forecast,
            settings,
            places: Mutex::new(TtlCache::new(cache_ttl)),
            reports: Mutex::new(TtlCache::new(cache_ttl)),
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Parse `/weather` arguments and fill defaults from the chat's settings.
    ///
    /// Runs before any upstream call so bad input is rejected cheaply.
    pub async fn prepare_weather(&self, chat: ChatId, args: &str) -> Result<WeatherQuery> {
        let parsed = parse_weather_args(args)?;
        let defaults = self.settings.chat_settings(chat).await;

        WeatherQuery::new(
            &parsed.city,
            parsed
                .forecast_days
                .unwrap_or(i64::from(defaults.forecast_days)),
            parsed.rnd.unwrap_or(i64::from(defaults.decimal_places)),
            defaults.units,
        )
    }

    /// Geocode, fetch and format a validated query.
    pub async fn answer_weather(&self, query: &WeatherQuery) -> Result<String> {
        let place = self.resolve_place(&query.city).await?;
        let weather = self.fetch_weather(&place, query.forecast_days).await?;
        Ok(format_weather_reply(
            &place,
            &weather,
            query.rnd,
            query.forecast_days,
            query.units,
        ))
    }

    pub async fn handle_weather(&self, chat: ChatId, args: &str) -> String {
        self.handle_weather_with(chat, args, || async {}).await
    }

    /// Like [`Self::handle_weather`], running `before_upstream` once the
    /// arguments are valid and before any geocoding or forecast call.
    pub async fn handle_weather_with<F, Fut>(
        &self,
        chat: ChatId,
        args: &str,
        before_upstream: F,
    ) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let result = async {
            let query = self.prepare_weather(chat, args).await?;
            before_upstream().await;
            self.answer_weather(&query).await
        }
        .await;

        match result {
            Ok(html) => html,
            Err(e) => {
                log_failure("weather", chat, &e);
                user_message(&e)
            }
        }
    }

    pub async fn resolve_place(&self, city: &str) -> Result<Place> {
        let key = city.trim().to_lowercase();
        if let Some(place) = self.places.lock().await.get(&key) {
            tracing::debug!(city = %key, "geocode cache hit");
            return Ok(place);
        }

        let place = self.geocoder.geocode(city.trim()).await?;
        self.places.lock().await.insert(key, place.clone());
        Ok(place)
    }

    pub async fn fetch_weather(&self, place: &Place, forecast_days: u8) -> Result<WeatherResult> {
        let key = place.coordinates.cache_key(forecast_days);
        if let Some(report) = self.reports.lock().await.get(&key) {
            tracing::debug!(%key, "weather cache hit");
            return Ok(report);
        }

        let report = self.forecast.fetch(place.coordinates, forecast_days).await?;
        self.reports.lock().await.insert(key, report.clone());
        Ok(report)
    }

    pub async fn handle_settings(&self, chat: ChatId, args: &str) -> String {
        match self.run_settings(chat, args).await {
            Ok(html) => html,
            Err(e) => {
                log_failure("settings", chat, &e);
                user_message(&e)
            }
        }
    }

    async fn run_settings(&self, chat: ChatId, args: &str) -> Result<String> {
        match parse_settings_args(args)? {
            SettingsCommand::Set { key, value } => {
                let stored = self.settings.set(chat, key, &value).await?;
                Ok(format!(
                    "✅ Updated {key} to {}",
                    escape_html(&stored)
                ))
            }
            SettingsCommand::Get { key } => {
                let value = self.settings.get(chat, key).await;
                Ok(format!(
                    "{key} = <code>{}</code>\nValid values: {}",
                    escape_html(&value),
                    key.valid_values()
                ))
            }
            SettingsCommand::List => {
                let mut lines = vec!["⚙️ <b>Chat Settings</b>".to_string()];
                for (key, value) in self.settings.list(chat).await {
                    lines.push(format!("• {key}: <code>{}</code>", escape_html(&value)));
                }
                Ok(lines.join("\n"))
            }
            SettingsCommand::Reset => {
                self.settings.reset(chat).await?;
                let mut lines = vec!["♻️ <b>Settings Reset</b>".to_string()];
                for (key, value) in self.settings.list(chat).await {
                    lines.push(format!("• {key}: <code>{}</code>", escape_html(&value)));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            places: self.places.lock().await.len(),
            reports: self.reports.lock().await.len(),
        }
    }

    /// Drop expired cache entries; returns how many were removed.
    pub async fn purge_caches(&self) -> usize {
        let places = self.places.lock().await.purge_expired();
        let reports = self.reports.lock().await.purge_expired();
        places + reports
    }
}

fn log_failure(command: &str, chat: ChatId, e: &Error) {
    match e {
        Error::InvalidInput(_) | Error::NotFound(_) => {
            tracing::info!(command, chat = chat.0, "rejected: {e}")
        }
        _ => tracing::error!(command, chat = chat.0, "failed: {e}"),
    }
}
