use std::env;
use std::ops::RangeInclusive;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub monitor_interval_secs: u64,
    pub reminder_window_minutes: i64,
    pub gps_retention_days: i64,
    pub incident_auto_close_days: i64,
    pub default_currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            monitor_interval_secs: parse_or_default("MONITOR_INTERVAL_SECS", 300)?,
            reminder_window_minutes: parse_or_default("REMINDER_WINDOW_MINUTES", 120)?,
            gps_retention_days: parse_or_default("GPS_RETENTION_DAYS", 90)?,
            incident_auto_close_days: parse_or_default("INCIDENT_AUTO_CLOSE_DAYS", 30)?,
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        ensure_range("EVENT_BUFFER_SIZE", self.event_buffer_size, 1..=1 << 20)?;
        ensure_range("MONITOR_INTERVAL_SECS", self.monitor_interval_secs, 1..=86_400)?;
        ensure_range(
            "REMINDER_WINDOW_MINUTES",
            self.reminder_window_minutes,
            1..=10_080,
        )?;
        ensure_range("GPS_RETENTION_DAYS", self.gps_retention_days, 1..=3_650)?;
        ensure_range(
            "INCIDENT_AUTO_CLOSE_DAYS",
            self.incident_auto_close_days,
            1..=3_650,
        )?;

        let currency = &self.default_currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::Internal(format!(
                "invalid DEFAULT_CURRENCY: {currency:?} is not a three-letter code"
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            monitor_interval_secs: 300,
            reminder_window_minutes: 120,
            gps_retention_days: 90,
            incident_auto_close_days: 30,
            default_currency: "USD".to_string(),
        }
    }
}

fn ensure_range<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<(), AppError>
where
    T: PartialOrd + std::fmt::Display,
{
    if !range.contains(&value) {
        return Err(AppError::Internal(format!(
            "invalid {key}: {value} is outside {}..={}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
