use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumString};
use switchyard_meta::duration::parse_duration;

/// Environment prefix of every setting read by [`Settings::from_config`].
pub const ENV_PREFIX: &str = "SWITCHYARD_";

/// Configuration service
///
/// Key/value store seeded from the process environment.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| parse_bool(&v))
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// How an exception handler's target name is compared against an error type name.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExceptionMatch {
    #[default]
    Exact,
    /// The registered target contains the error type name.
    Substring,
}

/// Runtime settings of a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache_file_path: Option<PathBuf>,
    pub gzip_output_enabled: bool,
    pub request_log_enabled: bool,
    pub execute_time_log_enabled: bool,
    pub exception_match: ExceptionMatch,
    pub io_timeout: Duration,
    pub worker_count: usize,
    pub powered_by: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_file_path: None,
            gzip_output_enabled: false,
            request_log_enabled: false,
            execute_time_log_enabled: false,
            exception_match: ExceptionMatch::Exact,
            io_timeout: Duration::from_secs(1),
            worker_count: num_cpus::get(),
            powered_by: "switchyard".to_string(),
        }
    }
}

impl Settings {
    /// Reads `SWITCHYARD_*` keys, falling back to defaults for anything unset or unparsable.
    pub fn from_config(config: &ConfigService) -> Self {
        let key = |name: &str| format!("{ENV_PREFIX}{name}");
        let mut settings = Self::default();

        if let Some(path) = config.get(&key("CACHE_FILE")).filter(|p| !p.trim().is_empty()) {
            settings.cache_file_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(enabled) = config.get_bool(&key("GZIP")) {
            settings.gzip_output_enabled = enabled;
        }
        if let Some(enabled) = config.get_bool(&key("REQUEST_LOG")) {
            settings.request_log_enabled = enabled;
        }
        if let Some(enabled) = config.get_bool(&key("EXECUTE_TIME_LOG")) {
            settings.execute_time_log_enabled = enabled;
        }
        if let Some(mode) = config.get_parsed::<ExceptionMatch>(&key("EXCEPTION_MATCH")) {
            settings.exception_match = mode;
        }
        if let Some(secs) = config
            .get(&key("IO_TIMEOUT"))
            .and_then(|v| parse_duration(&v))
            .filter(|secs| *secs > 0)
        {
            settings.io_timeout = Duration::from_secs(secs);
        }
        if let Some(count) = config.get_parsed::<usize>(&key("WORKERS")).filter(|n| *n > 0) {
            settings.worker_count = count;
        }
        if let Some(name) = config.get(&key("POWERED_BY")) {
            settings.powered_by = name;
        }

        tracing::debug!(?settings, "Loaded settings");
        settings
    }

    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file_path = Some(path.into());
        self
    }

    pub fn with_gzip_output(mut self, enabled: bool) -> Self {
        self.gzip_output_enabled = enabled;
        self
    }

    pub fn with_request_log(mut self, enabled: bool) -> Self {
        self.request_log_enabled = enabled;
        self
    }

    pub fn with_execute_time_log(mut self, enabled: bool) -> Self {
        self.execute_time_log_enabled = enabled;
        self
    }

    pub fn with_exception_match(mut self, mode: ExceptionMatch) -> Self {
        self.exception_match = mode;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }
}
