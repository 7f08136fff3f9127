use async_trait::async_trait;

use crate::{
    weather::{Coordinates, Place, WeatherResult},
    Result,
};

/// Resolves a place name to coordinates.
///
/// Implementations return `Error::NotFound` when the name cannot be resolved
/// and `Error::Upstream` when the service itself fails.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, city: &str) -> Result<Place>;
}

/// Fetches current conditions plus a daily forecast for a location.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, at: Coordinates, forecast_days: u8) -> Result<WeatherResult>;
}
