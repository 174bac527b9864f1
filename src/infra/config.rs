use std::{env, fmt::Display, str::FromStr, time::Duration};

use dotenvy::dotenv;

use crate::{domain::value_objects::SuccessCodes, error::AppError};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base_url: String, // sin "/" final
    pub token: Option<String>,
    pub http_timeout: Duration,
    pub progress_interval: Duration,
    pub version_interval: Duration,
    pub version_stale_after: Duration,
    pub reload_grace: Duration,
    pub success_codes: SuccessCodes,
    pub track_task_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:12712".to_string(),
            token: None,
            http_timeout: Duration::from_millis(10_000),
            progress_interval: Duration::from_millis(2_000),
            version_interval: Duration::from_millis(60_000),
            version_stale_after: Duration::from_millis(30_000),
            reload_grace: Duration::from_millis(3_000),
            success_codes: SuccessCodes::default(),
            track_task_id: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but reading from an arbitrary source (tests, embedding).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("COPILOT_BASE_URL").unwrap_or(defaults.base_url);
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AppError::Config("COPILOT_BASE_URL cannot be empty".into()));
        }

        // Token vacío == sin token
        let token = lookup("COPILOT_TOKEN").filter(|t| !t.trim().is_empty());

        let http_timeout = millis(&lookup, "HTTP_TIMEOUT_MS", defaults.http_timeout)?;
        let progress_interval =
            millis(&lookup, "PROGRESS_INTERVAL_MS", defaults.progress_interval)?;
        let version_interval = millis(&lookup, "VERSION_INTERVAL_MS", defaults.version_interval)?;
        let version_stale_after =
            millis(&lookup, "VERSION_STALE_MS", defaults.version_stale_after)?;
        let reload_grace = millis(&lookup, "RELOAD_GRACE_MS", defaults.reload_grace)?;

        let success_codes = match lookup("SUCCESS_CODES") {
            Some(raw) => raw
                .parse::<SuccessCodes>()
                .map_err(|err| AppError::Config(format!("invalid SUCCESS_CODES: {err}")))?,
            None => defaults.success_codes,
        };

        let track_task_id = lookup("TRACK_TASK_ID").filter(|t| !t.trim().is_empty());

        Ok(Self {
            base_url,
            token,
            http_timeout,
            progress_interval,
            version_interval,
            version_stale_after,
            reload_grace,
            success_codes,
            track_task_id,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| AppError::Config(format!("invalid {key}: {err}")))
        })
        .transpose()
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<F, u64>(lookup, key)? {
        Some(0) => Err(AppError::Config(format!("invalid {key}: must be greater than zero"))),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(default),
    }
}
