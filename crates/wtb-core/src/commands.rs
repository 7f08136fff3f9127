//! Command-line parsing for chat commands.

use crate::{errors::Error, settings::SettingKey, Result};

pub const WEATHER_USAGE: &str = "Usage: /weather <city> [forecast_days 1-5] [decimals 1-5]";
pub const SETTINGS_USAGE: &str =
    "Usage: /settings set <key> <value> | /settings get <key> | /settings list | /settings reset";

/// Split `/cmd@botname arg1 ...` into the lower-cased command name and the rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Raw `/weather` arguments before defaults and range checks are applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeatherArgs {
    pub city: String,
    pub forecast_days: Option<i64>,
    pub rnd: Option<i64>,
}

/// An optionally signed run of digits. Values past `i64` saturate so they
/// still fail range validation instead of joining the city name.
fn parse_int_token(token: &str) -> Option<i64> {
    let digits = token.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(token.parse::<i64>().unwrap_or(if token.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// Parse `<city words…> [forecast_days] [rnd]`.
///
/// Up to two trailing integer tokens are taken as numbers, but the first
/// token always belongs to the city.
pub fn parse_weather_args(args: &str) -> Result<WeatherArgs> {
    let mut tokens: Vec<&str> = args.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(Error::InvalidInput(WEATHER_USAGE.to_string()));
    }

    let mut numbers: Vec<i64> = Vec::new();
    while numbers.len() < 2 && tokens.len() > 1 {
        let Some(n) = tokens.last().and_then(|t| parse_int_token(t)) else {
            break;
        };
        numbers.push(n);
        tokens.pop();
    }
    numbers.reverse();

    Ok(WeatherArgs {
        city: tokens.join(" "),
        forecast_days: numbers.first().copied(),
        rnd: numbers.get(1).copied(),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingsCommand {
    Set { key: SettingKey, value: String },
    Get { key: SettingKey },
    List,
    Reset,
}

pub fn parse_settings_args(args: &str) -> Result<SettingsCommand> {
    let mut parts = args.split_whitespace();
    let usage = || Error::InvalidInput(SETTINGS_USAGE.to_string());

    let sub = parts.next().ok_or_else(usage)?.to_lowercase();
    match sub.as_str() {
        "set" => {
            let key = SettingKey::parse(parts.next().ok_or_else(usage)?)?;
            let value = parts.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Err(usage());
            }
            Ok(SettingsCommand::Set { key, value })
        }
        "get" => {
            let key = SettingKey::parse(parts.next().ok_or_else(usage)?)?;
            Ok(SettingsCommand::Get { key })
        }
        "list" => Ok(SettingsCommand::List),
        "reset" => Ok(SettingsCommand::Reset),
        _ => Err(usage()),
    }
}
