use crate::error::{Error, Result};
use reqwest::Url;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "http://localhost:8888";
const DEFAULT_VOTE_PATH: &str = "/.netlify/functions/vote";
const DEFAULT_RESULTS_PATH: &str = "/.netlify/functions/results";
const DEFAULT_DATABASE_URL: &str = "sqlite:vibe_vote.db";
const DEFAULT_APP_URL: &str = "http://localhost:8888/";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_QR_SIZE: u32 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub vote_url: Url,
    pub results_url: Url,
    pub database_url: String,
    pub poll_interval: Duration,
    pub failure_threshold: u32,
    pub fetch_timeout: Option<Duration>,
    pub app_url: String,
    pub qr_size: u32,
}

impl Config {
    // Read configuration from the process environment (after .env has been loaded)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = lookup("VOTE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = Url::parse(&api_base)
            .map_err(|e| Error::Config(format!("VOTE_API_BASE '{}': {}", api_base, e)))?;

        let vote_path = lookup("VOTE_SUBMIT_PATH").unwrap_or_else(|| DEFAULT_VOTE_PATH.to_string());
        let results_path = lookup("VOTE_RESULTS_PATH").unwrap_or_else(|| DEFAULT_RESULTS_PATH.to_string());
        let vote_url = join_endpoint(&api_base, &vote_path)?;
        let results_url = join_endpoint(&api_base, &results_path)?;

        let poll_interval_ms: u64 = parse_or(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(Error::Config("POLL_INTERVAL_MS must be greater than zero".to_string()));
        }

        let failure_threshold: u32 = parse_or(&lookup, "POLL_FAILURE_THRESHOLD", DEFAULT_FAILURE_THRESHOLD)?;
        if failure_threshold == 0 {
            return Err(Error::Config("POLL_FAILURE_THRESHOLD must be greater than zero".to_string()));
        }

        // 0 disables the timeout entirely
        let fetch_timeout_ms: u64 = parse_or(&lookup, "FETCH_TIMEOUT_MS", DEFAULT_FETCH_TIMEOUT_MS)?;
        let fetch_timeout = (fetch_timeout_ms > 0).then(|| Duration::from_millis(fetch_timeout_ms));

        let qr_size: u32 = parse_or(&lookup, "QR_SIZE", DEFAULT_QR_SIZE)?;
        if qr_size == 0 {
            return Err(Error::Config("QR_SIZE must be greater than zero".to_string()));
        }

        Ok(Self {
            vote_url,
            results_url,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            failure_threshold,
            fetch_timeout,
            app_url: lookup("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            qr_size,
        })
    }
}

/// Append an endpoint path to the API base, keeping any path prefix the base
/// carries (`https://host/app` + `/x` is `https://host/app/x`). A path that is
/// itself an absolute URL replaces the base.
fn join_endpoint(base: &Url, path: &str) -> Result<Url> {
    if let Ok(absolute) = Url::parse(path) {
        return Ok(absolute);
    }
    if base.cannot_be_a_base() {
        return Err(Error::Config(format!("VOTE_API_BASE '{}' cannot take a path", base)));
    }

    let prefix = base.path().trim_end_matches('/');
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.set_path(&format!("{}/{}", prefix, path.trim_start_matches('/')));
    Ok(url)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
