//! Engine configuration.

use std::time::Duration;
use weft_core::error::{Result, WeftError};

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently live fan-out threads for one request.
    ///
    /// Rounded down to a power of two when the budget is derived from it.
    pub max_parallelism: usize,
    /// Consult and populate the run ledger for pure ops.
    pub cache_enabled: bool,
    /// Record type mismatches as diagnostics.
    pub strict_types: bool,
    /// Time-to-live of cross-request refined types.
    pub memo_window: Duration,
    /// Capacity of the cross-request refined type cache.
    pub memo_capacity: usize,
    /// Threads available to background (async) runs.
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 16,
            cache_enabled: true,
            strict_types: false,
            memo_window: Duration::from_millis(60_000),
            memo_capacity: 1024,
            worker_threads: 2,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `WEFT_MAX_PARALLELISM`: Fan-out thread budget
    /// - `WEFT_CACHE`: Enable the run cache ("true"/"false")
    /// - `WEFT_STRICT_TYPES`: Record type mismatches as diagnostics
    /// - `WEFT_MEMO_WINDOW_MS`: Refined type cache TTL in milliseconds
    /// - `WEFT_MEMO_CAPACITY`: Refined type cache capacity
    /// - `WEFT_WORKER_THREADS`: Background worker threads
    ///
    /// Unset or unparsable variables keep their defaults.
    ///
    /// # Example
    ///
    /// ```bash
    /// export WEFT_MAX_PARALLELISM=32
    /// export WEFT_STRICT_TYPES=true
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_parallelism: env_parse("WEFT_MAX_PARALLELISM").unwrap_or(defaults.max_parallelism),
            cache_enabled: env_bool("WEFT_CACHE").unwrap_or(defaults.cache_enabled),
            strict_types: env_bool("WEFT_STRICT_TYPES").unwrap_or(defaults.strict_types),
            memo_window: env_parse::<u64>("WEFT_MEMO_WINDOW_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.memo_window),
            memo_capacity: env_parse("WEFT_MEMO_CAPACITY").unwrap_or(defaults.memo_capacity),
            worker_threads: env_parse("WEFT_WORKER_THREADS").unwrap_or(defaults.worker_threads),
        }
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(WeftError::Config {
                field: "worker_threads".to_string(),
                cause: "must be at least 1".to_string(),
            });
        }
        if self.memo_capacity == 0 {
            return Err(WeftError::Config {
                field: "memo_capacity".to_string(),
                cause: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the fan-out thread budget.
    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = max.max(1); // At least 1
        self
    }

    /// Enable or disable the run cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Enable or disable strict type diagnostics.
    pub fn with_strict_types(mut self, strict: bool) -> Self {
        self.strict_types = strict;
        self
    }

    /// Set the refined type cache window.
    pub fn with_memo_window(mut self, window: Duration) -> Self {
        self.memo_window = window;
        self
    }

    /// Set the refined type cache capacity.
    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    /// Set the number of background worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_parallelism, 16);
        assert!(config.cache_enabled);
        assert!(!config.strict_types);
        assert_eq!(config.memo_window, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_clamp_parallelism() {
        let config = EngineConfig::default().with_max_parallelism(0);
        assert_eq!(config.max_parallelism, 1);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = EngineConfig::default()
            .with_worker_threads(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "E801");
    }
}
