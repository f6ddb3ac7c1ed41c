//! # Relay Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! strict_coherency = true
//! thread_name = "GPU"
//! pending_capacity = 512
//! shutdown_policy = "drain"
//! ```

use std::path::Path;

use gpu_relay_shared::{DEFAULT_PENDING_CAPACITY, DEFAULT_THREAD_NAME};
use serde::Deserialize;

use crate::error::{RelayError, RelayResult};

/// What the worker does with commands still pending when shutdown begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Exit immediately; pending commands are dropped unexecuted.
    #[default]
    Discard,
    /// Execute everything already pending, then exit.
    ///
    /// Callers blocked on idle stay blocked until their command has run.
    Drain,
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Initial strict cache-coherency mode.
    ///
    /// Strict mode queues region flushes and waits for them; relaxed mode
    /// replaces them with a plain idle wait. Can be changed at runtime with
    /// [`crate::Dispatcher::set_strict_coherency`].
    pub strict_coherency: bool,
    /// Name of the worker thread.
    pub thread_name: String,
    /// Commands pre-allocated in the pending and in-flight buffers.
    pub pending_capacity: usize,
    /// Fate of pending commands at shutdown.
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            strict_coherency: false,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            pending_capacity: DEFAULT_PENDING_CAPACITY,
            shutdown_policy: ShutdownPolicy::Discard,
        }
    }
}

impl RelayConfig {
    /// Accurate emulation config: strict coherency, full drain on shutdown.
    #[must_use]
    pub fn accurate() -> Self {
        Self {
            strict_coherency: true,
            shutdown_policy: ShutdownPolicy::Drain,
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConfigParse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> RelayResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConfigIo`] if the file cannot be read and
    /// [`RelayError::ConfigParse`] if its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RelayError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Sets strict coherency.
    #[must_use]
    pub fn with_strict_coherency(mut self, strict: bool) -> Self {
        self.strict_coherency = strict;
        self
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the buffer pre-allocation.
    #[must_use]
    pub fn with_pending_capacity(mut self, capacity: usize) -> Self {
        self.pending_capacity = capacity;
        self
    }

    /// Sets the shutdown policy.
    #[must_use]
    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.thread_name, "GPU");
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Discard);
    }

    #[test]
    fn test_full_config() {
        let config = RelayConfig::from_toml_str(
            r#"
            strict_coherency = true
            thread_name = "GPU-Test"
            pending_capacity = 32
            shutdown_policy = "drain"
            "#,
        )
        .unwrap();

        assert!(config.strict_coherency);
        assert_eq!(config.thread_name, "GPU-Test");
        assert_eq!(config.pending_capacity, 32);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Drain);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RelayConfig::from_toml_str("use_async_gpu = true").unwrap_err();
        assert!(matches!(err, RelayError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("gpu_relay_no_such_config.toml");
        let err = RelayConfig::load(&path).unwrap_err();
        assert!(matches!(err, RelayError::ConfigIo { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("gpu_relay_config_{id}.toml"));
        std::fs::write(&path, "strict_coherency = true\n").unwrap();

        let config = RelayConfig::load(&path).unwrap();
        assert!(config.strict_coherency);
        assert_eq!(config.pending_capacity, DEFAULT_PENDING_CAPACITY);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_builders() {
        let config = RelayConfig::default()
            .with_strict_coherency(true)
            .with_thread_name("Render")
            .with_pending_capacity(8)
            .with_shutdown_policy(ShutdownPolicy::Drain);
        assert!(config.strict_coherency);
        assert_eq!(config.thread_name, "Render");
        assert_eq!(config.pending_capacity, 8);
        assert_eq!(RelayConfig::accurate().shutdown_policy, ShutdownPolicy::Drain);
    }
}
