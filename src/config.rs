use std::{
    env::{self, VarError},
    str::FromStr,
    time::Duration,
};

use teloxide::types::UserId;
use thiserror::Error;
use url::Url;

use crate::chat::ThresholdRange;

const DEFAULT_POLL_INTERVAL: u64 = 10;
const DEFAULT_FLUSH_INTERVAL: u64 = 1;
const DEFAULT_FLUSH_EMPTY_POLLS: usize = 10;
const DEFAULT_THRESHOLD_MIN: i64 = 50;
const DEFAULT_THRESHOLD_MAX: i64 = 70;
const DEFAULT_REQUEST_TIMEOUT: u64 = 30;
const DEFAULT_LONG_POLL_TIMEOUT: u64 = 0;

/// Errors raised while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{name} environment variable is required")]
    Missing {
        /// Variable name.
        name: &'static str,
        /// Lookup failure.
        #[source]
        source: VarError,
    },
    /// A variable is set but unusable.
    #[error("{name} has an invalid value: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
    /// No sticker ids were given.
    #[error("STICKER_FILE_IDS must contain at least one sticker id")]
    EmptyStickerPool,
    /// Threshold bounds must satisfy `1 <= min <= max`.
    #[error("Invalid threshold range {min}..={max}: bounds must satisfy 1 <= min <= max")]
    InvalidThresholdRange {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Represents the application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the bot API, including the token path. Always ends with `/`.
    pub api_base_url: Url,
    /// The pool of sticker file ids to pick from.
    pub sticker_pool: Vec<String>,
    /// The bot's own user id, used to detect it joining or leaving a chat.
    pub bot_id: UserId,
    /// Substring that marks a message as mentioning the bot.
    pub bot_handle: String,
    /// Delay between steady-state polling cycles.
    pub poll_interval: Duration,
    /// Delay between polls while flushing stale updates on startup.
    pub flush_interval: Duration,
    /// Number of consecutive empty polls that ends the startup flush.
    pub flush_empty_polls: usize,
    /// Range the per-chat sticker threshold is drawn from.
    pub threshold_range: ThresholdRange,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Long polling timeout handed to `getUpdates`. Zero disables long polling.
    pub long_poll_timeout: u64,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_base_url = parse_base_url(&required("BOT_API_URL")?)?;

        let sticker_pool: Vec<String> = required("STICKER_FILE_IDS")?
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if sticker_pool.is_empty() {
            return Err(ConfigError::EmptyStickerPool);
        }

        let bot_id = required("BOT_ID")?;
        let bot_id = bot_id
            .trim()
            .parse()
            .map(UserId)
            .map_err(|_| ConfigError::Invalid { name: "BOT_ID", value: bot_id })?;

        let bot_handle = required("BOT_HANDLE")?;
        if bot_handle.trim().is_empty() {
            return Err(ConfigError::Invalid { name: "BOT_HANDLE", value: bot_handle });
        }

        let min = or_default("THRESHOLD_MIN", DEFAULT_THRESHOLD_MIN);
        let max = or_default("THRESHOLD_MAX", DEFAULT_THRESHOLD_MAX);
        let threshold_range =
            ThresholdRange::new(min, max).ok_or(ConfigError::InvalidThresholdRange { min, max })?;

        Ok(Self {
            api_base_url,
            sticker_pool,
            bot_id,
            bot_handle,
            poll_interval: Duration::from_secs(or_default("POLL_INTERVAL", DEFAULT_POLL_INTERVAL)),
            flush_interval: Duration::from_secs(or_default(
                "FLUSH_INTERVAL",
                DEFAULT_FLUSH_INTERVAL,
            )),
            flush_empty_polls: or_default("FLUSH_EMPTY_POLLS", DEFAULT_FLUSH_EMPTY_POLLS),
            threshold_range,
            request_timeout: Duration::from_secs(or_default(
                "REQUEST_TIMEOUT",
                DEFAULT_REQUEST_TIMEOUT,
            )),
            long_poll_timeout: or_default("LONG_POLL_TIMEOUT", DEFAULT_LONG_POLL_TIMEOUT),
        })
    }
}

fn required(name: &'static str) -> Result<String> {
    env::var(name).map_err(|source| ConfigError::Missing { name, source })
}

fn or_default<T: FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parses the API base URL, making sure relative joins keep the token path.
fn parse_base_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') { raw.to_string() } else { format!("{raw}/") };
    let url = Url::parse(&with_slash)
        .map_err(|_| ConfigError::Invalid { name: "BOT_API_URL", value: raw.to_string() })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid { name: "BOT_API_URL", value: raw.to_string() });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use temp_env::with_vars;

    use super::*;

    const API_URL: &str = "https://api.telegram.org/bot123:abc";

    #[test]
    fn test_from_env() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some("first, second ,third")),
                ("BOT_ID", Some("156655373")),
                ("BOT_HANDLE", Some("@sticker_bot")),
                ("POLL_INTERVAL", Some("5")),
                ("FLUSH_INTERVAL", Some("2")),
                ("FLUSH_EMPTY_POLLS", Some("3")),
                ("THRESHOLD_MIN", Some("10")),
                ("THRESHOLD_MAX", Some("20")),
                ("REQUEST_TIMEOUT", Some("15")),
                ("LONG_POLL_TIMEOUT", Some("25")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.api_base_url.as_str(), "https://api.telegram.org/bot123:abc/");
                assert_eq!(config.sticker_pool, vec!["first", "second", "third"]);
                assert_eq!(config.bot_id, UserId(156655373));
                assert_eq!(config.bot_handle, "@sticker_bot");
                assert_eq!(config.poll_interval, Duration::from_secs(5));
                assert_eq!(config.flush_interval, Duration::from_secs(2));
                assert_eq!(config.flush_empty_polls, 3);
                assert_eq!(config.threshold_range, ThresholdRange::new(10, 20).unwrap());
                assert_eq!(config.request_timeout, Duration::from_secs(15));
                assert_eq!(config.long_poll_timeout, 25);
            },
        );
    }

    #[test]
    fn test_defaults() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some("only")),
                ("BOT_ID", Some("1")),
                ("BOT_HANDLE", Some("@sticker_bot")),
                ("POLL_INTERVAL", None),
                ("FLUSH_INTERVAL", None),
                ("FLUSH_EMPTY_POLLS", None),
                ("THRESHOLD_MIN", None),
                ("THRESHOLD_MAX", Some("not a number")),
                ("REQUEST_TIMEOUT", None),
                ("LONG_POLL_TIMEOUT", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.poll_interval, Duration::from_secs(DEFAULT_POLL_INTERVAL));
                assert_eq!(config.flush_interval, Duration::from_secs(DEFAULT_FLUSH_INTERVAL));
                assert_eq!(config.flush_empty_polls, DEFAULT_FLUSH_EMPTY_POLLS);
                assert_eq!(
                    config.threshold_range,
                    ThresholdRange::new(DEFAULT_THRESHOLD_MIN, DEFAULT_THRESHOLD_MAX).unwrap()
                );
                assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT));
                assert_eq!(config.long_poll_timeout, DEFAULT_LONG_POLL_TIMEOUT);
            },
        );
    }

    #[test]
    fn test_base_url_keeps_trailing_slash() {
        let url = parse_base_url("https://api.telegram.org/bot123:abc/").unwrap();
        assert_eq!(url.as_str(), "https://api.telegram.org/bot123:abc/");
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_missing_api_url_error() {
        with_vars(
            [
                ("BOT_API_URL", None),
                ("STICKER_FILE_IDS", Some("only")),
                ("BOT_ID", Some("1")),
                ("BOT_HANDLE", Some("@sticker_bot")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Missing { name: "BOT_API_URL", .. }));
            },
        );
    }

    #[test]
    fn test_empty_sticker_pool_error() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some(" , ,")),
                ("BOT_ID", Some("1")),
                ("BOT_HANDLE", Some("@sticker_bot")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::EmptyStickerPool));
            },
        );
    }

    #[test]
    fn test_invalid_bot_id_error() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some("only")),
                ("BOT_ID", Some("sticker")),
                ("BOT_HANDLE", Some("@sticker_bot")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid { name: "BOT_ID", .. }));
            },
        );
    }

    #[test]
    fn test_empty_handle_error() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some("only")),
                ("BOT_ID", Some("1")),
                ("BOT_HANDLE", Some("  ")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid { name: "BOT_HANDLE", .. }));
            },
        );
    }

    #[test]
    fn test_inverted_threshold_range_error() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some("only")),
                ("BOT_ID", Some("1")),
                ("BOT_HANDLE", Some("@sticker_bot")),
                ("THRESHOLD_MIN", Some("80")),
                ("THRESHOLD_MAX", Some("70")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::InvalidThresholdRange { min: 80, max: 70 }));
            },
        );
    }

    #[test]
    fn test_non_positive_threshold_min_error() {
        with_vars(
            [
                ("BOT_API_URL", Some(API_URL)),
                ("STICKER_FILE_IDS", Some("only")),
                ("BOT_ID", Some("1")),
                ("BOT_HANDLE", Some("@sticker_bot")),
                ("THRESHOLD_MIN", Some("0")),
                ("THRESHOLD_MAX", Some("70")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::InvalidThresholdRange { min: 0, max: 70 }));
            },
        );
    }
}
