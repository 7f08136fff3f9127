//! Weather data model shared by the command layer and the HTTP adapters.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;

use crate::{errors::Error, Result};

pub const MIN_FORECAST_DAYS: i64 = 1;
pub const MAX_FORECAST_DAYS: i64 = 5;
pub const MIN_ROUNDING: i64 = 1;
pub const MAX_ROUNDING: i64 = 5;

pub const INVALID_PARAMETERS: &str = "Invalid parameters. Values must be between 1 and 5.";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Stable key for caching lookups at these coordinates.
    pub fn cache_key(&self, forecast_days: u8) -> String {
        format!("{},{},{}", self.latitude, self.longitude, forecast_days)
    }
}

/// A geocoded place.
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Unit system used when rendering a report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            _ => Err(Error::InvalidInput(
                "Please select either metric or imperial".to_string(),
            )),
        }
    }
}

/// A validated `/weather` invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherQuery {
    pub city: String,
    pub forecast_days: u8,
    pub rnd: u8,
    pub units: Units,
}

impl WeatherQuery {
    /// Build a query, rejecting out-of-range `forecast_days` / `rnd`.
    pub fn new(city: &str, forecast_days: i64, rnd: i64, units: Units) -> Result<Self> {
        let city = city.trim();
        if city.is_empty() {
            return Err(Error::InvalidInput("Please provide a city name.".to_string()));
        }
        if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&forecast_days)
            || !(MIN_ROUNDING..=MAX_ROUNDING).contains(&rnd)
        {
            return Err(Error::InvalidInput(INVALID_PARAMETERS.to_string()));
        }

        Ok(Self {
            city: city.to_string(),
            forecast_days: forecast_days as u8,
            rnd: rnd as u8,
            units,
        })
    }

    /// Cache key for the geocoding lookup of this query's city.
    pub fn city_key(&self) -> String {
        self.city.to_lowercase()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub utc_offset_seconds: i32,
}

/// Current conditions, in metric units as returned upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentConditions {
    /// Observation time (unix seconds, UTC).
    pub time: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub feels_like: f64,
    pub precipitation: f64,
    pub rain: f64,
    pub weather_code: i32,
    pub cloud_cover: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub wind_gusts: f64,
}

/// One day of the forecast. Upstream may leave individual values empty.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_code: Option<i32>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub feels_like_max: Option<f64>,
    pub feels_like_min: Option<f64>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
    pub precip_probability: Option<f64>,
    pub wind_speed_max: Option<f64>,
    pub rain_sum: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeatherResult {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}
