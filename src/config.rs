use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::limits::DEFAULT_MAX_BOOKING_DAYS;

/// Process configuration, read from `ROOMBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// No record log; nothing survives a restart.
    pub in_memory: bool,
    pub max_booking_days: u32,
    /// Appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            in_memory: false,
            max_booking_days: DEFAULT_MAX_BOOKING_DAYS,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            get(key).and_then(|s| s.trim().parse().ok())
        }
        let defaults = Self::default();

        Self {
            data_dir: get("ROOMBOOK_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            in_memory: get("ROOMBOOK_IN_MEMORY")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            max_booking_days: parse(&get, "ROOMBOOK_MAX_BOOKING_DAYS").unwrap_or(defaults.max_booking_days),
            compact_threshold: parse(&get, "ROOMBOOK_COMPACT_THRESHOLD").unwrap_or(defaults.compact_threshold),
            compact_interval: parse(&get, "ROOMBOOK_COMPACT_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            metrics_port: parse(&get, "ROOMBOOK_METRICS_PORT"),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("roombook.log")
    }
}
