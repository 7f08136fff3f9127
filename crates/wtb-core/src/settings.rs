//! Per-chat key/value settings persisted to a flat JSON file.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::ChatId,
    errors::Error,
    weather::{Units, MAX_FORECAST_DAYS, MAX_ROUNDING, MIN_FORECAST_DAYS, MIN_ROUNDING},
    Result,
};

const DAY_SECS: i64 = 86_400;
pub const INACTIVE_AFTER_DAYS: i64 = 30;
pub const STALE_AFTER_DAYS: i64 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingKey {
    Units,
    DecimalPlaces,
    ForecastDays,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [Self::DecimalPlaces, Self::ForecastDays, Self::Units];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Units => "units",
            Self::DecimalPlaces => "decimal_places",
            Self::ForecastDays => "forecast_days",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let k = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == k)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Unknown setting {s:?}. Known settings: {}",
                    Self::ALL.map(|k| k.as_str()).join(", ")
                ))
            })
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            Self::Units => "metric",
            Self::DecimalPlaces => "2",
            Self::ForecastDays => "3",
        }
    }

    pub fn valid_values(&self) -> &'static str {
        match self {
            Self::Units => "metric, imperial",
            Self::DecimalPlaces | Self::ForecastDays => "1, 2, 3, 4, 5",
        }
    }

    /// Check `raw` against this key's domain and return the normalized value.
    pub fn validate(&self, raw: &str) -> Result<String> {
        match self {
            Self::Units => raw.parse::<Units>().map(|u| u.as_str().to_string()),
            Self::DecimalPlaces => validate_range(self, raw, MIN_ROUNDING, MAX_ROUNDING),
            Self::ForecastDays => validate_range(self, raw, MIN_FORECAST_DAYS, MAX_FORECAST_DAYS),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate_range(key: &SettingKey, raw: &str, min: i64, max: i64) -> Result<String> {
    let n = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("Invalid value format for {key}")))?;
    if !(min..=max).contains(&n) {
        return Err(Error::InvalidInput(format!(
            "Please select a value between {min} and {max}"
        )));
    }
    Ok(n.to_string())
}

/// Typed view of a chat's settings, used to fill `/weather` defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatSettings {
    pub units: Units,
    pub decimal_places: u8,
    pub forecast_days: u8,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            decimal_places: 2,
            forecast_days: 3,
        }
    }
}

impl ChatSettings {
    /// Values that fail validation (e.g. a hand-edited file) fall back to defaults.
    fn from_values(values: &BTreeMap<String, String>) -> Self {
        let d = Self::default();
        let pick = |key: SettingKey| values.get(key.as_str()).and_then(|v| key.validate(v).ok());

        Self {
            units: pick(SettingKey::Units)
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.units),
            decimal_places: pick(SettingKey::DecimalPlaces)
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.decimal_places),
            forecast_days: pick(SettingKey::ForecastDays)
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.forecast_days),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ChatRecord {
    settings: BTreeMap<String, String>,
    last_updated: i64,
    last_accessed: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    chats: BTreeMap<i64, ChatRecord>,
}

pub struct SettingsStore {
    path: PathBuf,
    state: Mutex<SettingsFile>,
}

impl SettingsStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match load_settings_file(&path) {
            Ok(Some(data)) => {
                tracing::info!(
                    chats = data.chats.len(),
                    path = %path.display(),
                    "loaded chat settings"
                );
                data
            }
            Ok(None) => SettingsFile::default(),
            Err(e) => {
                tracing::error!(path = %path.display(), "failed to read settings file: {e}");
                SettingsFile::default()
            }
        };

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Effective value for `key` (stored value or the key's default).
    pub async fn get(&self, chat: ChatId, key: SettingKey) -> String {
        let mut st = self.state.lock().await;
        let now = now_secs();
        match st.chats.get_mut(&chat.0) {
            Some(rec) => {
                rec.last_accessed = now;
                rec.settings
                    .get(key.as_str())
                    .cloned()
                    .unwrap_or_else(|| key.default_value().to_string())
            }
            None => key.default_value().to_string(),
        }
    }

    /// All known keys with their effective values, in key order.
    pub async fn list(&self, chat: ChatId) -> Vec<(SettingKey, String)> {
        let mut st = self.state.lock().await;
        let now = now_secs();
        let rec = st.chats.get_mut(&chat.0);
        let values = match rec {
            Some(rec) => {
                rec.last_accessed = now;
                rec.settings.clone()
            }
            None => BTreeMap::new(),
        };

        SettingKey::ALL
            .into_iter()
            .map(|k| {
                let v = values
                    .get(k.as_str())
                    .cloned()
                    .unwrap_or_else(|| k.default_value().to_string());
                (k, v)
            })
            .collect()
    }

    pub async fn chat_settings(&self, chat: ChatId) -> ChatSettings {
        let mut st = self.state.lock().await;
        let now = now_secs();
        match st.chats.get_mut(&chat.0) {
            Some(rec) => {
                rec.last_accessed = now;
                ChatSettings::from_values(&rec.settings)
            }
            None => ChatSettings::default(),
        }
    }

    /// Validate and store `value` under `key`; returns the normalized value.
    pub async fn set(&self, chat: ChatId, key: SettingKey, value: &str) -> Result<String> {
        let normalized = key.validate(value)?;

        let mut st = self.state.lock().await;
        let now = now_secs();
        let mut next = st.clone();
        let rec = next.chats.entry(chat.0).or_default();
        rec.settings
            .insert(key.as_str().to_string(), normalized.clone());
        rec.last_updated = now;
        rec.last_accessed = now;

        // Memory only changes once the file write succeeded.
        save_settings_file(&self.path, &next).await?;
        *st = next;
        tracing::debug!(chat = chat.0, %key, value = %normalized, "setting updated");
        Ok(normalized)
    }

    /// Restore every key of `chat` to its default.
    pub async fn reset(&self, chat: ChatId) -> Result<()> {
        let mut st = self.state.lock().await;
        let now = now_secs();
        let mut next = st.clone();
        let rec = next.chats.entry(chat.0).or_default();
        rec.settings = SettingKey::ALL
            .into_iter()
            .map(|k| (k.as_str().to_string(), k.default_value().to_string()))
            .collect();
        rec.last_updated = now;
        rec.last_accessed = now;

        save_settings_file(&self.path, &next).await?;
        *st = next;
        Ok(())
    }

    /// Remove chats not accessed for 30 days or not updated for 90 days.
    pub async fn cleanup_inactive(&self, now: i64) -> Result<usize> {
        let inactive_cutoff = now - INACTIVE_AFTER_DAYS * DAY_SECS;
        let stale_cutoff = now - STALE_AFTER_DAYS * DAY_SECS;

        let mut st = self.state.lock().await;
        let mut next = st.clone();
        next.chats.retain(|_, rec| {
            rec.last_accessed >= inactive_cutoff && rec.last_updated >= stale_cutoff
        });
        let removed = st.chats.len() - next.chats.len();

        // Also flushes `last_accessed` bumps made by reads since the last write.
        save_settings_file(&self.path, &next).await?;
        *st = next;
        Ok(removed)
    }

    pub async fn chat_count(&self) -> usize {
        self.state.lock().await.chats.len()
    }
}

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

fn load_settings_file(path: &Path) -> Result<Option<SettingsFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let data: SettingsFile = serde_json::from_str(&txt)?;
    Ok(Some(data))
}

async fn save_settings_file(path: &Path, data: &SettingsFile) -> Result<()> {
    let txt = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&tmp, txt).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
