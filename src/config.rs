use crate::error::Error;
use crate::services::retry::RetryPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ACCESS_API: &str = "https://rest-mainnet.onflow.org";
pub const DEFAULT_FLOWSCAN_API: &str = "https://query.flowgraph.co/";
pub const DEFAULT_EPOCHS_CSV_URL: &str =
    "https://raw.githubusercontent.com/psiemens/stakeout/main/epochs.csv";

pub struct Config {
    pub access_api: String,
    pub flowscan_api: String,
    pub epochs_csv_url: String,
    pub rewards_indexer_api: Option<String>,
    pub directory_page_size: u32,
    pub indexer_page_size: u32,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub max_response_bytes: usize,
    pub reward_window: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 8)?,
            initial_delay: Duration::from_millis(parse_or(&lookup, "RETRY_INITIAL_DELAY_MS", 500)?),
            multiplier: parse_or(&lookup, "RETRY_MULTIPLIER", 2)?,
            max_delay: Duration::from_millis(parse_or(&lookup, "RETRY_MAX_DELAY_MS", 30_000)?),
        };
        if retry.max_attempts == 0 {
            return Err(Error::config("RETRY_MAX_ATTEMPTS must be at least 1"));
        }
        if retry.multiplier < 2 {
            return Err(Error::config("RETRY_MULTIPLIER must be at least 2"));
        }

        let directory_page_size: u32 = parse_or(&lookup, "DIRECTORY_PAGE_SIZE", 50)?;
        let indexer_page_size: u32 = parse_or(&lookup, "INDEXER_PAGE_SIZE", 100)?;
        if directory_page_size == 0 || indexer_page_size == 0 {
            return Err(Error::config("page sizes must be positive"));
        }

        let window_hours: i64 = parse_or(&lookup, "REWARD_WINDOW_HOURS", 24)?;
        if window_hours < 0 {
            return Err(Error::config("REWARD_WINDOW_HOURS must not be negative"));
        }
        let reward_window = chrono::Duration::try_hours(window_hours)
            .ok_or_else(|| Error::config(format!("REWARD_WINDOW_HOURS={window_hours} is too large")))?;

        Ok(Self {
            access_api: lookup("FLOW_ACCESS_API").unwrap_or_else(|| DEFAULT_ACCESS_API.to_string()),
            flowscan_api: lookup("FLOWSCAN_API")
                .unwrap_or_else(|| DEFAULT_FLOWSCAN_API.to_string()),
            epochs_csv_url: lookup("EPOCHS_CSV_URL")
                .unwrap_or_else(|| DEFAULT_EPOCHS_CSV_URL.to_string()),
            rewards_indexer_api: lookup("REWARDS_INDEXER_API").filter(|v| !v.is_empty()),
            directory_page_size,
            indexer_page_size,
            retry,
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?),
            max_response_bytes: parse_or(&lookup, "MAX_RESPONSE_BYTES", 20_000_000)?,
            reward_window,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.access_api, DEFAULT_ACCESS_API);
        assert_eq!(config.directory_page_size, 50);
        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_response_bytes, 20_000_000);
        assert!(config.rewards_indexer_api.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_with(&[
            ("RETRY_MAX_ATTEMPTS", "3"),
            ("DIRECTORY_PAGE_SIZE", "25"),
            ("REWARDS_INDEXER_API", "https://indexer.example"),
        ])
        .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.directory_page_size, 25);
        assert_eq!(
            config.rewards_indexer_api.as_deref(),
            Some("https://indexer.example")
        );
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let err = config_with(&[("REQUEST_TIMEOUT_SECS", "soon")])
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        let err = config_with(&[("RETRY_MAX_ATTEMPTS", "0")]).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn reward_window_out_of_range_is_config_error() {
        assert_eq!(
            config_with(&[]).unwrap().reward_window,
            chrono::Duration::hours(24)
        );
        for bad in ["9999999999999", "-1"] {
            let err = config_with(&[("REWARD_WINDOW_HOURS", bad)]).err().unwrap();
            assert!(matches!(err, Error::Config(_)), "{bad}");
        }
    }
}
