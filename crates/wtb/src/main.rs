use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use wtb_core::{
    bot::WeatherBot, config::Config, housekeeping, ports::ForecastSource, ports::Geocoder,
    presence::PresenceTicker, settings::SettingsStore,
};
use wtb_providers::{OpenMeteoClient, OpenWeatherGeocoder};

#[tokio::main]
async fn main() -> Result<(), wtb_core::Error> {
    wtb_core::logging::init("wtb")?;

    let cfg = Arc::new(Config::load()?);

    let geocoder: Arc<dyn Geocoder> = Arc::new(OpenWeatherGeocoder::new_with_base_url(
        &cfg.geocoding_api_key,
        &cfg.geocoding_base_url,
    )?);
    let forecast: Arc<dyn ForecastSource> =
        Arc::new(OpenMeteoClient::new_with_base_url(&cfg.open_meteo_base_url)?);
    let settings = Arc::new(SettingsStore::open(&cfg.settings_file));

    let weather = Arc::new(WeatherBot::new(
        geocoder.clone(),
        forecast.clone(),
        settings,
        cfg.cache_ttl,
    ));
    let presence = Arc::new(PresenceTicker::new(geocoder, forecast));

    let cancel = CancellationToken::new();
    let tasks = [
        presence
            .clone()
            .spawn(cfg.presence_interval, cancel.child_token()),
        housekeeping::spawn(weather.clone(), cfg.cleanup_interval, cancel.child_token()),
    ];

    let result = wtb_telegram::router::run_polling(cfg, weather, presence).await;

    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!("background task ended abnormally: {e}");
        }
    }

    result.map_err(|e| wtb_core::Error::External(format!("telegram bot failed: {e}")))
}
