//! Formatting utilities (weather reports as Telegram HTML).

use chrono::{DateTime, Utc};

use crate::weather::{DailyForecast, Place, Units, WeatherResult};

const WIND_DIRECTIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Weather code ranges `[start, end)` and their emoji.
const WEATHER_CODE_RANGES: [(i32, i32, &str); 9] = [
    (0, 1, "☀️"),
    (1, 4, "🌤️"),
    (4, 10, "☁️"),
    (10, 20, "🌫️"),
    (20, 50, "🌧️"),
    (50, 60, "❄️"),
    (60, 80, "🌨️"),
    (80, 90, "🌦️"),
    (90, 100, "⛈️"),
];

const MAX_RENDER_DECIMALS: u8 = 5;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn weather_emoji(code: i32) -> &'static str {
    WEATHER_CODE_RANGES
        .iter()
        .find(|(start, end, _)| *start <= code && code < *end)
        .map(|(_, _, emoji)| *emoji)
        .unwrap_or("❓")
}

/// 16-point compass name for a bearing in degrees.
pub fn wind_direction(degrees: f64) -> &'static str {
    let step = 360.0 / WIND_DIRECTIONS.len() as f64;
    let idx = (degrees / step).round().rem_euclid(WIND_DIRECTIONS.len() as f64) as usize;
    WIND_DIRECTIONS[idx % WIND_DIRECTIONS.len()]
}

/// Unit-aware number rendering with a fixed number of decimals.
#[derive(Clone, Copy, Debug)]
pub struct UnitFormatter {
    pub units: Units,
    pub rnd: usize,
}

impl UnitFormatter {
    pub fn new(units: Units, rnd: u8) -> Self {
        Self {
            units,
            rnd: rnd.min(MAX_RENDER_DECIMALS) as usize,
        }
    }

    pub fn temp(&self, celsius: f64) -> String {
        match self.units {
            Units::Metric => format!("{:.*}°C", self.rnd, celsius),
            Units::Imperial => format!("{:.*}°F", self.rnd, celsius * 9.0 / 5.0 + 32.0),
        }
    }

    pub fn temp_feels(&self, celsius: f64, feels_like: Option<f64>) -> String {
        match feels_like {
            Some(f) => format!("{} (Feels like: {})", self.temp(celsius), self.temp(f)),
            None => self.temp(celsius),
        }
    }

    pub fn speed(&self, kmh: f64) -> String {
        match self.units {
            Units::Metric => format!("{:.*}km/h", self.rnd, kmh),
            Units::Imperial => format!("{:.*}mph", self.rnd, kmh * 0.621371),
        }
    }

    pub fn precip(&self, mm: f64) -> String {
        match self.units {
            Units::Metric => format!("{:.*}mm", self.rnd, mm),
            Units::Imperial => format!("{:.*}in", self.rnd, mm * 0.0393701),
        }
    }

    pub fn plain(&self, v: f64) -> String {
        format!("{:.*}", self.rnd, v)
    }
}

fn latitude_label(v: f64, f: &UnitFormatter) -> String {
    let hemi = if v < 0.0 { 'S' } else { 'N' };
    format!("{}°{hemi}", f.plain(v.abs()))
}

fn longitude_label(v: f64, f: &UnitFormatter) -> String {
    let hemi = if v < 0.0 { 'W' } else { 'E' };
    format!("{}°{hemi}", f.plain(v.abs()))
}

fn local_time(unix: i64, utc_offset_seconds: i32) -> String {
    DateTime::<Utc>::from_timestamp(unix + i64::from(utc_offset_seconds), 0)
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn or_na(v: Option<String>) -> String {
    v.unwrap_or_else(|| "n/a".to_string())
}

fn format_day(day: &DailyForecast, f: &UnitFormatter) -> String {
    let code_line = match day.weather_code {
        Some(code) => format!("{} Weather Code: {code}", weather_emoji(code)),
        None => "❓ Weather Code: n/a".to_string(),
    };
    let max = or_na(day.max_temp.map(|t| f.temp_feels(t, day.feels_like_max)));
    let min = or_na(day.min_temp.map(|t| f.temp_feels(t, day.feels_like_min)));
    let avg = or_na(
        day.max_temp
            .zip(day.min_temp)
            .map(|(hi, lo)| f.temp((hi + lo) / 2.0)),
    );
    let rain = or_na(day.rain_sum.map(|r| f.precip(r)));
    let chance = day
        .precip_probability
        .map(|p| format!(" ({}% chance)", p as i64))
        .unwrap_or_default();

    format!(
        "<b>📅 {}</b>\n{code_line}\n🌡️ Max: {max}\n🌡️ Min: {min}\n🌡️ Avg: {avg}\n🌧️ Rain: {rain}{chance}",
        day.date.format("%Y-%m-%d")
    )
}

/// Render a full weather report.
///
/// Renders at most `forecast_days` daily entries. `rnd` is clamped to 0–5.
pub fn format_weather_reply(
    place: &Place,
    weather: &WeatherResult,
    rnd: u8,
    forecast_days: u8,
    units: Units,
) -> String {
    let f = UnitFormatter::new(units, rnd);
    let loc = &weather.location;
    let cur = &weather.current;

    let mut sections = Vec::new();

    sections.push(format!(
        "<b>Weather in {}</b>\n📍 Coordinates: {}, {}\n⛰️ Elevation: {}m\n🌍 Timezone: {} ({})",
        escape_html(&place.name),
        latitude_label(loc.latitude, &f),
        longitude_label(loc.longitude, &f),
        f.plain(loc.elevation),
        escape_html(&loc.timezone),
        escape_html(&loc.timezone_abbreviation),
    ));

    sections.push(format!(
        "<b>📊 Current Conditions</b>\n\
         🌡️ Temperature: {}\n\
         💧 Humidity: {}%\n\
         ☁️ Cloud Cover: {}%\n\
         💨 Wind: {} {} (Gusts: {})\n\
         🌧️ Rain: {}",
        f.temp_feels(cur.temperature, Some(cur.feels_like)),
        cur.humidity as i64,
        cur.cloud_cover as i64,
        f.speed(cur.wind_speed),
        wind_direction(cur.wind_direction),
        f.speed(cur.wind_gusts),
        f.precip(cur.rain),
    ));

    for day in weather.daily.iter().take(usize::from(forecast_days)) {
        sections.push(format_day(day, &f));
    }

    sections.push(format!(
        "<i>Data from Open-Meteo | Local time: {} {}</i>",
        local_time(cur.time, loc.utc_offset_seconds),
        escape_html(&loc.timezone_abbreviation),
    ));

    sections.join("\n\n")
}

/// One-line status used by the presence ticker (always metric, one decimal).
pub fn format_presence_line(city: &str, celsius: f64) -> String {
    format!("{celsius:.1}°C in {city}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::weather::{Coordinates, CurrentConditions, LocationInfo};

    fn london() -> (Place, WeatherResult) {
        let place = Place {
            name: "London".to_string(),
            coordinates: Coordinates {
                latitude: 51.5073,
                longitude: -0.1276,
            },
        };
        let day = |d: u32, code: i32, hi: f64, lo: f64| DailyForecast {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            weather_code: Some(code),
            max_temp: Some(hi),
            min_temp: Some(lo),
            feels_like_max: Some(hi - 1.0),
            feels_like_min: Some(lo - 2.0),
            sunrise: None,
            sunset: None,
            precip_probability: Some(80.0),
            wind_speed_max: Some(20.0),
            rain_sum: Some(1.26),
        };
        let weather = WeatherResult {
            location: LocationInfo {
                latitude: 51.5,
                longitude: -0.12,
                elevation: 23.0,
                timezone: "Europe/London".to_string(),
                timezone_abbreviation: "GMT".to_string(),
                utc_offset_seconds: 0,
            },
            current: CurrentConditions {
                // 2024-03-01 14:00:00 UTC
                time: 1_709_301_600,
                temperature: 12.347,
                humidity: 81.7,
                feels_like: 10.1,
                precipitation: 0.2,
                rain: 0.2,
                weather_code: 61,
                cloud_cover: 75.0,
                wind_speed: 14.2,
                wind_direction: 250.0,
                wind_gusts: 30.1,
            },
            daily: vec![day(1, 61, 14.0, 8.0), day(2, 3, 15.5, 9.5), day(3, 0, 17.0, 7.0)],
        };
        (place, weather)
    }

    #[test]
    fn metric_report_matches_expected_rounding() {
        let (place, weather) = london();
        let out = format_weather_reply(&place, &weather, 2, 2, Units::Metric);

        assert!(out.starts_with("<b>Weather in London</b>"));
        assert!(out.contains("📍 Coordinates: 51.50°N, 0.12°W"));
        assert!(out.contains("⛰️ Elevation: 23.00m"));
        assert!(out.contains("🌍 Timezone: Europe/London (GMT)"));
        assert!(out.contains("🌡️ Temperature: 12.35°C (Feels like: 10.10°C)"));
        assert!(out.contains("💧 Humidity: 81%"));
        assert!(out.contains("💨 Wind: 14.20km/h WSW (Gusts: 30.10km/h)"));
        assert!(out.contains("🌧️ Rain: 0.20mm"));
        assert!(out.contains("<b>📅 2024-03-01</b>\n🌨️ Weather Code: 61"));
        assert!(out.contains("🌡️ Max: 14.00°C (Feels like: 13.00°C)"));
        assert!(out.contains("🌡️ Avg: 11.00°C"));
        assert!(out.contains("🌧️ Rain: 1.26mm (80% chance)"));
        assert!(out.contains("<b>📅 2024-03-02</b>"));
        assert!(!out.contains("2024-03-03"));
        assert!(out.ends_with("<i>Data from Open-Meteo | Local time: 2024-03-01 14:00 GMT</i>"));
    }

    #[test]
    fn imperial_report_converts_units() {
        let (place, weather) = london();
        let out = format_weather_reply(&place, &weather, 1, 1, Units::Imperial);

        // 12.347°C = 54.22°F, 10.1°C = 50.18°F
        assert!(out.contains("🌡️ Temperature: 54.2°F (Feels like: 50.2°F)"));
        // 14.2 km/h * 0.621371 = 8.82 mph
        assert!(out.contains("💨 Wind: 8.8mph WSW"));
        // 1.26 mm * 0.0393701 = 0.0496 in
        assert!(out.contains("🌧️ Rain: 0.0in (80% chance)"));
        assert!(out.contains("🌡️ Max: 57.2°F"));
    }

    #[test]
    fn missing_daily_values_render_as_na() {
        let (place, mut weather) = london();
        weather.daily[0].max_temp = None;
        weather.daily[0].weather_code = None;
        weather.daily[0].precip_probability = None;

        let out = format_weather_reply(&place, &weather, 1, 1, Units::Metric);
        assert!(out.contains("❓ Weather Code: n/a"));
        assert!(out.contains("🌡️ Max: n/a"));
        assert!(out.contains("🌡️ Avg: n/a"));
        assert!(out.contains("🌧️ Rain: 1.3mm\n\n<i>"));
    }

    #[test]
    fn place_names_are_escaped() {
        let (mut place, weather) = london();
        place.name = "<script>".to_string();
        let out = format_weather_reply(&place, &weather, 1, 1, Units::Metric);
        assert!(out.contains("Weather in &lt;script&gt;"));
    }

    #[test]
    fn compass_points() {
        assert_eq!(wind_direction(0.0), "N");
        assert_eq!(wind_direction(11.0), "N");
        assert_eq!(wind_direction(12.0), "NNE");
        assert_eq!(wind_direction(90.0), "E");
        assert_eq!(wind_direction(250.0), "WSW");
        assert_eq!(wind_direction(355.0), "N");
        assert_eq!(wind_direction(360.0), "N");
    }

    #[test]
    fn emoji_ranges() {
        assert_eq!(weather_emoji(0), "☀️");
        assert_eq!(weather_emoji(3), "🌤️");
        assert_eq!(weather_emoji(45), "🌧️");
        assert_eq!(weather_emoji(55), "❄️");
        assert_eq!(weather_emoji(73), "🌨️");
        assert_eq!(weather_emoji(81), "🌦️");
        assert_eq!(weather_emoji(95), "⛈️");
        assert_eq!(weather_emoji(100), "❓");
        assert_eq!(weather_emoji(-1), "❓");
    }

    #[test]
    fn presence_line_is_metric_one_decimal() {
        assert_eq!(format_presence_line("Tokyo", 21.349), "21.3°C in Tokyo");
    }
}
