use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_GEOCODING_BASE_URL: &str = "http://api.openweathermap.org";
pub const DEFAULT_OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com";

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub application_id: i64,
    pub geocoding_api_key: String,

    // Upstream endpoints
    pub geocoding_base_url: String,
    pub open_meteo_base_url: String,

    // Storage
    pub settings_file: PathBuf,

    // Runtime intervals
    pub cache_ttl: Duration,
    pub presence_interval: Duration,
    pub cleanup_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let token_id = bot_id_from_token(&telegram_bot_token).ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN is not in the `<id>:<secret>` format".to_string())
        })?;

        let application_id = match env_str("APPLICATION_ID").and_then(configured) {
            Some(raw) => {
                let id = raw.trim().parse::<i64>().map_err(|_| {
                    Error::Config(format!("APPLICATION_ID must be numeric, got {raw:?}"))
                })?;
                if id != token_id {
                    return Err(Error::Config(format!(
                        "APPLICATION_ID {id} does not match the bot token id {token_id}"
                    )));
                }
                id
            }
            None => token_id,
        };

        let geocoding_api_key = env_str("GEOCODING_API_KEY")
            .and_then(configured)
            .or_else(|| env_str("GEOCODINGAPIKEY").and_then(configured))
            .ok_or_else(|| {
                Error::Config("GEOCODING_API_KEY environment variable is required".to_string())
            })?;

        let geocoding_base_url = env_str("GEOCODING_BASE_URL")
            .and_then(configured)
            .unwrap_or_else(|| DEFAULT_GEOCODING_BASE_URL.to_string());
        let open_meteo_base_url = env_str("OPEN_METEO_BASE_URL")
            .and_then(configured)
            .unwrap_or_else(|| DEFAULT_OPEN_METEO_BASE_URL.to_string());

        let settings_file = PathBuf::from(
            env_str("SETTINGS_FILE").unwrap_or_else(|| "wtb-settings.json".to_string()),
        );

        let cache_ttl = Duration::from_secs(env_u64("WEATHER_CACHE_TTL_SECS").unwrap_or(300));
        let presence_interval =
            Duration::from_secs(env_u64("PRESENCE_INTERVAL_SECS").unwrap_or(15 * 60).max(1));
        let cleanup_interval =
            Duration::from_secs(env_u64("CLEANUP_INTERVAL_SECS").unwrap_or(86_400).max(1));

        Ok(Self {
            telegram_bot_token,
            application_id,
            geocoding_api_key,
            geocoding_base_url,
            open_meteo_base_url,
            settings_file,
            cache_ttl,
            presence_interval,
            cleanup_interval,
        })
    }
}

/// The numeric part before `:` in a Telegram bot token is the bot's user id.
pub fn bot_id_from_token(token: &str) -> Option<i64> {
    let (id, secret) = token.trim().split_once(':')?;
    if secret.is_empty() {
        return None;
    }
    id.parse::<i64>().ok()
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(configured)
        .ok_or_else(|| Error::Config(format!("{key} is not properly configured in .env file")))
}

/// Treat empty values and `.env.example` placeholders (`your_...`) as unset.
fn configured(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() || t.starts_with("your_") {
        None
    } else {
        Some(t.to_string())
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}
