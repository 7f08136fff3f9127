use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use wtb_core::{
    config::DEFAULT_OPEN_METEO_BASE_URL,
    errors::Error,
    ports::ForecastSource,
    weather::{Coordinates, CurrentConditions, DailyForecast, LocationInfo, WeatherResult},
    Result,
};

use crate::{http_client, upstream_status};

const TIMEOUT: Duration = Duration::from_secs(10);

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
precipitation,rain,weather_code,cloud_cover,wind_speed_10m,wind_direction_10m,wind_gusts_10m";

const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,\
apparent_temperature_max,apparent_temperature_min,sunrise,sunset,\
precipitation_probability_max,wind_speed_10m_max,rain_sum";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    elevation: f64,
    #[serde(default)]
    utc_offset_seconds: i32,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    timezone_abbreviation: String,
    current: CurrentBlock,
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: i64,
    temperature_2m: f64,
    relative_humidity_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    precipitation: Option<f64>,
    rain: Option<f64>,
    weather_code: Option<i32>,
    cloud_cover: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
}

/// Daily series are parallel arrays indexed by day; any entry may be null.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DailyBlock {
    time: Vec<i64>,
    weather_code: Vec<Option<i32>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    apparent_temperature_max: Vec<Option<f64>>,
    apparent_temperature_min: Vec<Option<f64>>,
    sunrise: Vec<Option<i64>>,
    sunset: Vec<Option<i64>>,
    precipitation_probability_max: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<Option<f64>>,
    rain_sum: Vec<Option<f64>>,
}

fn at<T: Copy>(series: &[Option<T>], i: usize) -> Option<T> {
    series.get(i).copied().flatten()
}

/// Calendar date at the location for a unix timestamp.
fn local_date(unix: i64, utc_offset_seconds: i32) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(unix + i64::from(utc_offset_seconds), 0)
        .map(|dt| dt.date_naive())
}

impl ForecastResponse {
    fn into_result(self) -> Result<WeatherResult> {
        let offset = self.utc_offset_seconds;
        let c = self.current;
        let d = self.daily;

        // Never report more days than the shortest series covers.
        let days = [
            d.time.len(),
            d.weather_code.len(),
            d.temperature_2m_max.len(),
            d.temperature_2m_min.len(),
            d.rain_sum.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0);

        let daily = d
            .time
            .iter()
            .take(days)
            .enumerate()
            .map(|(i, &t)| {
                let date = local_date(t, offset).ok_or_else(|| {
                    Error::Upstream(format!("open-meteo returned an invalid day timestamp {t}"))
                })?;
                Ok(DailyForecast {
                    date,
                    weather_code: at(&d.weather_code, i),
                    max_temp: at(&d.temperature_2m_max, i),
                    min_temp: at(&d.temperature_2m_min, i),
                    feels_like_max: at(&d.apparent_temperature_max, i),
                    feels_like_min: at(&d.apparent_temperature_min, i),
                    sunrise: at(&d.sunrise, i),
                    sunset: at(&d.sunset, i),
                    precip_probability: at(&d.precipitation_probability_max, i),
                    wind_speed_max: at(&d.wind_speed_10m_max, i),
                    rain_sum: at(&d.rain_sum, i),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(WeatherResult {
            location: LocationInfo {
                latitude: self.latitude,
                longitude: self.longitude,
                elevation: self.elevation,
                timezone: self.timezone,
                timezone_abbreviation: self.timezone_abbreviation,
                utc_offset_seconds: offset,
            },
            current: CurrentConditions {
                time: c.time,
                temperature: c.temperature_2m,
                humidity: c.relative_humidity_2m.unwrap_or_default(),
                feels_like: c.apparent_temperature.unwrap_or(c.temperature_2m),
                precipitation: c.precipitation.unwrap_or_default(),
                rain: c.rain.unwrap_or_default(),
                weather_code: c.weather_code.unwrap_or_default(),
                cloud_cover: c.cloud_cover.unwrap_or_default(),
                wind_speed: c.wind_speed_10m.unwrap_or_default(),
                wind_direction: c.wind_direction_10m.unwrap_or_default(),
                wind_gusts: c.wind_gusts_10m.unwrap_or_default(),
            },
            daily,
        })
    }
}

/// Open-Meteo `/v1/forecast` client (metric units, local timezone).
#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    base_url: String,
    http: reqwest::Client,
}

impl OpenMeteoClient {
    pub fn new() -> Result<Self> {
        Self::new_with_base_url(DEFAULT_OPEN_METEO_BASE_URL)
    }

    pub fn new_with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(TIMEOUT)?,
        })
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    async fn fetch(&self, at: Coordinates, forecast_days: u8) -> Result<WeatherResult> {
        let url = format!("{}/v1/forecast", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("latitude", at.latitude.to_string()),
                ("longitude", at.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
                ("timeformat", "unixtime".to_string()),
                ("forecast_days", forecast_days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("open-meteo request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(upstream_status("open-meteo", resp).await);
        }

        let body: ForecastResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("open-meteo json error: {e}")))?;

        let result = body.into_result()?;
        tracing::debug!(
            lat = at.latitude,
            lon = at.longitude,
            days = result.daily.len(),
            "forecast fetched"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn london() -> serde_json::Value {
        json!({
            "latitude": 51.5,
            "longitude": -0.12,
            "elevation": 23.0,
            "utc_offset_seconds": 0,
            "timezone": "Europe/London",
            "timezone_abbreviation": "GMT",
            "current": {
                "time": 1709301600,
                "interval": 900,
                "temperature_2m": 12.3,
                "relative_humidity_2m": 81,
                "apparent_temperature": 10.1,
                "precipitation": 0.2,
                "rain": 0.2,
                "weather_code": 61,
                "cloud_cover": 100,
                "wind_speed_10m": 14.2,
                "wind_direction_10m": 250,
                "wind_gusts_10m": 30.6
            },
            "daily": {
                "time": [1709251200, 1709337600],
                "weather_code": [61, 3],
                "temperature_2m_max": [13.1, 11.0],
                "temperature_2m_min": [7.4, null],
                "apparent_temperature_max": [11.0, 9.2],
                "apparent_temperature_min": [5.0, 3.3],
                "sunrise": [1709275440, 1709361720],
                "sunset": [1709315580, 1709402100],
                "precipitation_probability_max": [80, 20],
                "wind_speed_10m_max": [22.4, 18.0],
                "rain_sum": [1.26, 0.0]
            }
        })
    }

    #[tokio::test]
    async fn fetch_maps_current_and_daily_blocks() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "51.5073"))
            .and(query_param("longitude", "-0.1276"))
            .and(query_param("forecast_days", "2"))
            .and(query_param("timezone", "auto"))
            .and(query_param("timeformat", "unixtime"))
            .and(query_param("current", CURRENT_FIELDS))
            .and(query_param("daily", DAILY_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(london()))
            .mount(&mock_server)
            .await;

        let client = OpenMeteoClient::new_with_base_url(&mock_server.uri()).unwrap();
        let w = client
            .fetch(
                Coordinates {
                    latitude: 51.5073,
                    longitude: -0.1276,
                },
                2,
            )
            .await
            .unwrap();

        assert_eq!(w.location.timezone, "Europe/London");
        assert_eq!(w.current.temperature, 12.3);
        assert_eq!(w.current.humidity, 81.0);
        assert_eq!(w.current.weather_code, 61);
        assert_eq!(w.daily.len(), 2);
        assert_eq!(w.daily[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(w.daily[0].rain_sum, Some(1.26));
        assert_eq!(w.daily[1].min_temp, None);
        assert_eq!(w.daily[1].sunset, Some(1709402100));
    }

    #[tokio::test]
    async fn server_error_is_upstream() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = OpenMeteoClient::new_with_base_url(&mock_server.uri()).unwrap();
        let err = client
            .fetch(
                Coordinates {
                    latitude: 0.0,
                    longitude: 0.0,
                },
                1,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn malformed_body_is_upstream() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": true})))
            .mount(&mock_server)
            .await;

        let client = OpenMeteoClient::new_with_base_url(&mock_server.uri()).unwrap();
        let err = client
            .fetch(
                Coordinates {
                    latitude: 0.0,
                    longitude: 0.0,
                },
                1,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
    }

    #[test]
    fn ragged_daily_series_are_truncated() {
        let mut body = london();
        body["daily"]["rain_sum"] = json!([0.4]);
        let parsed: ForecastResponse = serde_json::from_value(body).unwrap();
        let w = parsed.into_result().unwrap();
        assert_eq!(w.daily.len(), 1);
        assert_eq!(w.daily[0].rain_sum, Some(0.4));
    }

    #[test]
    fn daily_dates_use_local_offset() {
        // 2024-03-01 15:00 UTC is already 2024-03-02 in Tokyo.
        assert_eq!(
            local_date(1_709_305_200, 9 * 3600),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
        assert_eq!(
            local_date(1_709_305_200, 0),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }
}
