//! Rotating "temperature in some city" status line.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    cache::TtlCache,
    errors::Error,
    formatting::format_presence_line,
    ports::{ForecastSource, Geocoder},
    weather::Place,
    Result,
};

pub const CITIES: [&str; 17] = [
    "Tokyo",
    "New York",
    "London",
    "Paris",
    "Sydney",
    "Moscow",
    "Dubai",
    "Singapore",
    "Rome",
    "Toronto",
    "Berlin",
    "Madrid",
    "Seoul",
    "Mumbai",
    "Cairo",
    "Montreal",
    "Chicago",
];

const PLACE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Random city picker drawing from a shrinking pool.
///
/// Once every city in the pool has been shown, the pool refills with all
/// cities except the most recent half of the picks.
#[derive(Debug)]
pub struct CityRotation {
    cities: Vec<&'static str>,
    available: Vec<&'static str>,
    recent: VecDeque<&'static str>,
    window: usize,
}

impl CityRotation {
    pub fn new(cities: &[&'static str]) -> Self {
        Self {
            cities: cities.to_vec(),
            available: cities.to_vec(),
            recent: VecDeque::new(),
            window: cities.len() / 2,
        }
    }

    pub fn next_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&'static str> {
        if self.available.is_empty() {
            self.available = self
                .cities
                .iter()
                .copied()
                .filter(|c| !self.recent.contains(c))
                .collect();
            if self.available.is_empty() {
                self.available = self.cities.clone();
                self.recent.clear();
            }
        }
        if self.available.is_empty() {
            return None;
        }

        let idx = rng.gen_range(0..self.available.len());
        let city = self.available.swap_remove(idx);
        self.recent.push_back(city);
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }
        Some(city)
    }
}

struct TickerState {
    rotation: CityRotation,
    rng: StdRng,
    places: TtlCache<&'static str, Place>,
    line: Option<String>,
}

pub struct PresenceTicker {
    geocoder: Arc<dyn Geocoder>,
    forecast: Arc<dyn ForecastSource>,
    state: Mutex<TickerState>,
}

impl PresenceTicker {
    pub fn new(geocoder: Arc<dyn Geocoder>, forecast: Arc<dyn ForecastSource>) -> Self {
        Self::with_rng(geocoder, forecast, StdRng::from_entropy())
    }

    pub fn with_rng(
        geocoder: Arc<dyn Geocoder>,
        forecast: Arc<dyn ForecastSource>,
        rng: StdRng,
    ) -> Self {
        Self {
            geocoder,
            forecast,
            state: Mutex::new(TickerState {
                rotation: CityRotation::new(&CITIES),
                rng,
                places: TtlCache::new(PLACE_TTL),
                line: None,
            }),
        }
    }

    /// The most recent status line, if any tick has succeeded yet.
    pub async fn current_line(&self) -> Option<String> {
        self.state.lock().await.line.clone()
    }

    /// Pick the next city and refresh the line. On failure the previous line stays.
    pub async fn tick(&self) -> Result<String> {
        let (city, cached) = {
            let mut st = self.state.lock().await;
            let TickerState {
                rotation,
                rng,
                places,
                ..
            } = &mut *st;
            let Some(city) = rotation.next_with(rng) else {
                return Err(Error::Config("presence city list is empty".to_string()));
            };
            (city, places.get(&city))
        };

        let place = match cached {
            Some(p) => p,
            None => {
                let p = self.geocoder.geocode(city).await?;
                self.state.lock().await.places.insert(city, p.clone());
                p
            }
        };

        let weather = self.forecast.fetch(place.coordinates, 1).await?;
        let line = format_presence_line(city, weather.current.temperature);
        self.state.lock().await.line = Some(line.clone());
        Ok(line)
    }

    pub fn spawn(self: Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  _ = tick.tick() => {
                    match self.tick().await {
                      Ok(line) => tracing::info!(%line, "presence updated"),
                      Err(e) => tracing::warn!("presence update failed: {e}"),
                    }
                  }
                }
            }
            tracing::debug!("presence ticker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::bot::tests::{FakeForecast, FakeGeocoder};

    #[test]
    fn rotation_never_repeats_recent_cities() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut rotation = CityRotation::new(&CITIES);
        let mut history: Vec<&str> = Vec::new();

        for _ in 0..200 {
            let city = rotation.next_with(&mut rng).unwrap();
            let start = history.len().saturating_sub(CITIES.len() / 2);
            assert!(
                !history[start..].contains(&city),
                "{city} repeated within {:?}",
                &history[start..]
            );
            history.push(city);
        }
    }

    #[test]
    fn pool_is_exhausted_before_any_city_repeats() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut rotation = CityRotation::new(&CITIES);

        let mut first: Vec<&str> = (0..CITIES.len())
            .map(|_| rotation.next_with(&mut rng).unwrap())
            .collect();
        let last_half: Vec<&str> = first[CITIES.len() - CITIES.len() / 2..].to_vec();
        first.sort_unstable();
        let mut all = CITIES.to_vec();
        all.sort_unstable();
        assert_eq!(first, all);

        // The refilled pool holds everything but the last ⌊17/2⌋ picks, and
        // is drained completely before the next refill.
        let refill_len = CITIES.len() - CITIES.len() / 2;
        let mut second: Vec<&str> = (0..refill_len)
            .map(|_| rotation.next_with(&mut rng).unwrap())
            .collect();
        assert!(second.iter().all(|c| !last_half.contains(c)));
        second.sort_unstable();
        second.dedup();
        assert_eq!(second.len(), refill_len);
    }

    #[test]
    fn tiny_pools_still_yield_a_city() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut rotation = CityRotation::new(&["Oslo"]);
        assert_eq!(rotation.next_with(&mut rng), Some("Oslo"));
        assert_eq!(rotation.next_with(&mut rng), Some("Oslo"));

        let mut empty = CityRotation::new(&[]);
        assert_eq!(empty.next_with(&mut rng), None);
    }

    #[tokio::test]
    async fn tick_sets_line_and_caches_places() {
        let geocoder = Arc::new(FakeGeocoder::default());
        let forecast = Arc::new(FakeForecast::default());
        let ticker = PresenceTicker::with_rng(
            geocoder.clone(),
            forecast.clone(),
            StdRng::seed_from_u64(3),
        );
        assert_eq!(ticker.current_line().await, None);

        let line = ticker.tick().await.unwrap();
        assert!(line.starts_with("21.3°C in "), "{line}");
        assert_eq!(ticker.current_line().await, Some(line));

        // Every city gets geocoded at most once within the cache window.
        for _ in 0..40 {
            ticker.tick().await.unwrap();
        }
        assert!(geocoder.calls.load(Ordering::SeqCst) <= CITIES.len());
        assert_eq!(forecast.calls.load(Ordering::SeqCst), 41);
    }

    #[tokio::test]
    async fn failed_tick_keeps_previous_line() {
        let geocoder = Arc::new(FakeGeocoder::default());
        let ok = PresenceTicker::with_rng(
            geocoder.clone(),
            Arc::new(FakeForecast::default()),
            StdRng::seed_from_u64(5),
        );
        let line = ok.tick().await.unwrap();

        let failing = PresenceTicker::with_rng(
            geocoder,
            Arc::new(FakeForecast {
                fail: true,
                ..Default::default()
            }),
            StdRng::seed_from_u64(5),
        );
        failing.state.lock().await.line = Some(line.clone());
        assert!(failing.tick().await.is_err());
        assert_eq!(failing.current_line().await, Some(line));
    }
}
