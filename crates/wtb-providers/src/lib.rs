//! HTTP adapters for the weather ports: OpenWeatherMap geocoding and the
//! Open-Meteo forecast API.

mod geocoding;
mod open_meteo;

pub use geocoding::OpenWeatherGeocoder;
pub use open_meteo::OpenMeteoClient;

use std::time::Duration;

use wtb_core::{errors::Error, Result};

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::External(format!("http client build error: {e}")))
}

/// Map a non-success response to `Error::Upstream`, keeping a short body excerpt.
async fn upstream_status(service: &str, resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Error::Upstream(format!(
        "{service} returned {status}: {}",
        body.chars().take(200).collect::<String>()
    ))
}
