use crate::error::IngestionError;
use chrono::NaiveTime;
use std::collections::BTreeSet;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone)]
pub struct SoapConfig {
    pub endpoint: String,
    pub namespace: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_child_elements: usize,
}

impl SoapConfig {
    fn from_env() -> Result<Self, IngestionError> {
        let endpoint = std::env::var("SOAP_ENDPOINT").map_err(|_| {
            IngestionError::ConfigurationError("SOAP_ENDPOINT is required".to_string())
        })?;

        Ok(Self {
            endpoint,
            namespace: env_string(
                "SOAP_NAMESPACE",
                "http://sipsa.dane.gov.co/services/",
            ),
            connect_timeout_ms: env_parse("SOAP_CONNECT_TIMEOUT_MS", 10_000),
            read_timeout_ms: env_parse("SOAP_READ_TIMEOUT_MS", 60_000),
            max_retries: env_parse("SOAP_MAX_RETRIES", 3),
            retry_backoff_ms: env_parse("SOAP_RETRY_BACKOFF_MS", 500),
            max_child_elements: env_parse("SOAP_MAX_CHILD_ELEMENTS", 256),
        })
    }
}

/// Recognized configuration options, loaded directly from the process environment
/// (with `.env`-file support for local/CI runs via `dotenvy`) rather than a layered
/// config-file hierarchy.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub sentry_dsn: Option<String>,

    pub daily_window_start: NaiveTime,
    pub daily_window_end: NaiveTime,
    pub monthly_run_days: BTreeSet<u32>,
    pub monthly_window_start: NaiveTime,
    pub time_zone_offset_hours: i32,

    pub batch_size: usize,
    pub max_reject_rate: f64,
    pub max_reject_count: i64,

    pub soap: SoapConfig,

    pub daily_cron: String,
    pub monthly_cron_primary: String,
    pub monthly_cron_grace: String,
}

impl Config {
    pub fn from_env() -> Result<Self, IngestionError> {
        let daily_window_start = parse_time(&env_string("DAILY_WINDOW_START", "06:00:00"))?;
        let daily_window_end = parse_time(&env_string("DAILY_WINDOW_END", "16:00:00"))?;
        let monthly_window_start = parse_time(&env_string("MONTHLY_WINDOW_START", "06:00:00"))?;

        let monthly_run_days = env_string("MONTHLY_RUN_DAYS", "5,20")
            .split(',')
            .filter_map(|s| s.trim().parse::<u32>().ok())
            .collect::<BTreeSet<u32>>();

        if monthly_run_days.is_empty() {
            return Err(IngestionError::ConfigurationError(
                "MONTHLY_RUN_DAYS must name at least one day-of-month".to_string(),
            ));
        }

        let max_reject_rate: f64 = env_parse("MAX_REJECT_RATE", 0.01);
        if !(0.0..=1.0).contains(&max_reject_rate) {
            return Err(IngestionError::ConfigurationError(format!(
                "MAX_REJECT_RATE must be within [0,1], got {max_reject_rate}"
            )));
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            sentry_dsn: std::env::var("SENTRY_DSN").ok(),

            daily_window_start,
            daily_window_end,
            monthly_run_days,
            monthly_window_start,
            time_zone_offset_hours: env_parse("TIME_ZONE_OFFSET_HOURS", -5),

            batch_size: env_parse("BATCH_SIZE", 2000),
            max_reject_rate,
            max_reject_count: env_parse("MAX_REJECT_COUNT", 5000),

            soap: SoapConfig::from_env()?,

            daily_cron: env_string("CRON_DAILY", "0 30 6 * * *"),
            monthly_cron_primary: env_string("CRON_MONTHLY_PRIMARY", "0 30 6 5,20 * *"),
            monthly_cron_grace: env_string("CRON_MONTHLY_GRACE", "0 30 6 6,21 * *"),
        })
    }

    pub fn require_database_url(&self) -> Result<&str, IngestionError> {
        self.database_url.as_deref().ok_or_else(|| {
            IngestionError::ConfigurationError("DATABASE_URL is required".to_string())
        })
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, IngestionError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| IngestionError::ConfigurationError(format!("invalid time '{s}': {e}")))
}
