use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use wtb_core::{
    config::DEFAULT_GEOCODING_BASE_URL,
    errors::Error,
    ports::Geocoder,
    weather::{Coordinates, Place},
    Result,
};

use crate::{http_client, upstream_status};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct DirectMatch {
    name: String,
    lat: f64,
    lon: f64,
}

/// OpenWeatherMap direct geocoding (`/geo/1.0/direct`).
#[derive(Clone, Debug)]
pub struct OpenWeatherGeocoder {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenWeatherGeocoder {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::new_with_base_url(api_key, DEFAULT_GEOCODING_BASE_URL)
    }

    pub fn new_with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(TIMEOUT)?,
        })
    }
}

#[async_trait]
impl Geocoder for OpenWeatherGeocoder {
    async fn geocode(&self, city: &str) -> Result<Place> {
        let url = format!("{}/geo/1.0/direct", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("q", city), ("limit", "1"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("geocoding request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(upstream_status("geocoding", resp).await);
        }

        let matches: Vec<DirectMatch> = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("geocoding json error: {e}")))?;

        let Some(m) = matches.into_iter().next() else {
            return Err(Error::NotFound(city.to_string()));
        };
        tracing::debug!(city, name = %m.name, lat = m.lat, lon = m.lon, "geocoded");

        Ok(Place {
            name: m.name,
            coordinates: Coordinates {
                latitude: m.lat,
                longitude: m.lon,
            },
        })
    }
}
