use std::time::Duration;

use crate::constants::defaults;
use crate::error::{CampusError, Result};

/// Runtime settings of the execution engine.
///
/// Every field can be overridden through a `CAMPUS_*` environment variable via
/// [`EngineConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound of leaf commands running at the same time in the message executor
    pub worker_pool_size: usize,
    /// Upper bound of nested commands a parallel composite runs at the same time
    pub macro_pool_size: usize,
    pub watchdog_timeout_ms: u64,
    pub watchdog_poll_interval_ms: u64,
    pub input_queue_capacity: usize,
    /// Push messages through the processors as JSON text instead of in-memory values
    pub encode_messages: bool,
    pub shutdown_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cores = available_cores();
        Self {
            worker_pool_size: cores,
            macro_pool_size: cores,
            watchdog_timeout_ms: defaults::WATCHDOG_TIMEOUT_MS,
            watchdog_poll_interval_ms: defaults::WATCHDOG_POLL_INTERVAL_MS,
            input_queue_capacity: defaults::INPUT_QUEUE_CAPACITY,
            encode_messages: false,
            shutdown_timeout_ms: defaults::PROCESSOR_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(size) = env_parse::<usize>("CAMPUS_WORKER_POOL_SIZE")? {
            config.worker_pool_size = size;
        }

        if let Some(size) = env_parse::<usize>("CAMPUS_MACRO_POOL_SIZE")? {
            config.macro_pool_size = size;
        }

        if let Some(timeout) = env_parse::<u64>("CAMPUS_WATCHDOG_TIMEOUT_MS")? {
            config.watchdog_timeout_ms = timeout;
        }

        if let Some(interval) = env_parse::<u64>("CAMPUS_WATCHDOG_POLL_INTERVAL_MS")? {
            config.watchdog_poll_interval_ms = interval;
        }

        if let Some(capacity) = env_parse::<usize>("CAMPUS_INPUT_QUEUE_CAPACITY")? {
            config.input_queue_capacity = capacity;
        }

        if let Some(encode) = env_parse::<bool>("CAMPUS_ENCODE_MESSAGES")? {
            config.encode_messages = encode;
        }

        if let Some(timeout) = env_parse::<u64>("CAMPUS_SHUTDOWN_TIMEOUT_MS")? {
            config.shutdown_timeout_ms = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(CampusError::ConfigurationError(
                "worker_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.macro_pool_size == 0 {
            return Err(CampusError::ConfigurationError(
                "macro_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err(CampusError::ConfigurationError(
                "watchdog_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.watchdog_poll_interval_ms == 0 {
            return Err(CampusError::ConfigurationError(
                "watchdog_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.watchdog_poll_interval_ms > self.watchdog_timeout_ms {
            return Err(CampusError::ConfigurationError(format!(
                "watchdog_poll_interval_ms ({}) exceeds watchdog_timeout_ms ({})",
                self.watchdog_poll_interval_ms, self.watchdog_timeout_ms
            )));
        }
        if self.input_queue_capacity == 0 {
            return Err(CampusError::ConfigurationError(
                "input_queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    pub fn with_macro_pool_size(mut self, size: usize) -> Self {
        self.macro_pool_size = size;
        self
    }

    pub fn with_watchdog_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.watchdog_timeout_ms = timeout_ms;
        self
    }

    pub fn with_encoded_messages(mut self, encode: bool) -> Self {
        self.encode_messages = encode;
        self
    }

    /// Size the macro pool actually gets: never below the core count
    pub fn effective_macro_pool_size(&self) -> usize {
        self.macro_pool_size.max(available_cores())
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn watchdog_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(defaults::FALLBACK_PARALLELISM)
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CampusError::ConfigurationError(format!("Invalid {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
