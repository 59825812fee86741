//! Application-level configuration loading: numbering policy, season lock timing and backend.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "UMPIRE_SCHEDULE_CONFIG_PATH";
/// Environment variable that overrides the configured storage backend.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

/// Which [`CellStore`](crate::dao::cell_store::CellStore) implementation the binary installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process tables; data is lost on restart.
    #[default]
    Memory,
    /// MongoDB through the `mongo-store` feature.
    Mongo,
}

impl StorageBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "mongo" | "mongodb" => Some(Self::Mongo),
            _ => None,
        }
    }
}

/// How saves are numbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingConfig {
    /// Recompute the whole season after every upsert, patch and delete.
    pub renumber_on_save: bool,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            renumber_on_save: true,
        }
    }
}

/// Season lock acquisition policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Attempts before proceeding without the lock.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles afterwards.
    pub initial_backoff: Duration,
    /// Upper bound for a single backoff.
    pub max_backoff: Duration,
    /// How long one attempt waits for a held lock.
    pub wait: Duration,
    /// Lifetime of a MongoDB lease whose holder vanished.
    pub lease: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(250),
            wait: Duration::from_millis(2000),
            lease: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Numbering policy.
    pub numbering: NumberingConfig,
    /// Season lock policy.
    pub lock: LockConfig,
    /// Selected storage backend.
    pub backend: StorageBackend,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        renumber_on_save = app_config.numbering.renumber_on_save,
                        backend = ?app_config.backend,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(raw) = env::var(STORAGE_BACKEND_ENV) {
            match StorageBackend::parse(&raw) {
                Some(backend) => config.backend = backend,
                None => warn!(value = %raw, "unknown {STORAGE_BACKEND_ENV}; keeping {:?}", config.backend),
            }
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    numbering: RawNumbering,
    lock: RawLock,
    storage: RawStorage,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawNumbering {
    renumber_on_save: bool,
}

impl Default for RawNumbering {
    fn default() -> Self {
        Self {
            renumber_on_save: NumberingConfig::default().renumber_on_save,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawLock {
    max_attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    wait_ms: u64,
    lease_ms: u64,
}

impl Default for RawLock {
    fn default() -> Self {
        let defaults = LockConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            initial_backoff_ms: duration_ms(defaults.initial_backoff),
            max_backoff_ms: duration_ms(defaults.max_backoff),
            wait_ms: duration_ms(defaults.wait),
            lease_ms: duration_ms(defaults.lease),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStorage {
    backend: StorageBackend,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let lock = value.lock;
        Self {
            numbering: NumberingConfig {
                renumber_on_save: value.numbering.renumber_on_save,
            },
            lock: LockConfig {
                // At least one attempt is always made.
                max_attempts: lock.max_attempts.max(1),
                initial_backoff: Duration::from_millis(lock.initial_backoff_ms),
                max_backoff: Duration::from_millis(lock.max_backoff_ms.max(lock.initial_backoff_ms)),
                wait: Duration::from_millis(lock.wait_ms),
                lease: Duration::from_millis(lock.lease_ms),
            },
            backend: value.storage.backend,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json)
            .expect("valid config")
            .into()
    }

    #[test]
    fn empty_file_matches_defaults() {
        let config = parse("{}");
        assert!(config.numbering.renumber_on_save);
        assert_eq!(config.lock, LockConfig::default());
        assert_eq!(config.backend, StorageBackend::Memory);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse(r#"{"lock": {"maxAttempts": 5, "waitMs": 100}, "storage": {"backend": "mongo"}}"#);
        assert_eq!(config.lock.max_attempts, 5);
        assert_eq!(config.lock.wait, Duration::from_millis(100));
        assert_eq!(config.lock.initial_backoff, Duration::from_millis(25));
        assert_eq!(config.backend, StorageBackend::Mongo);
    }

    #[test]
    fn renumbering_can_be_disabled() {
        let config = parse(r#"{"numbering": {"renumberOnSave": false}}"#);
        assert!(!config.numbering.renumber_on_save);
    }

    #[test]
    fn degenerate_lock_values_are_clamped() {
        let config = parse(r#"{"lock": {"maxAttempts": 0, "initialBackoffMs": 50, "maxBackoffMs": 10}}"#);
        assert_eq!(config.lock.max_attempts, 1);
        assert_eq!(config.lock.max_backoff, Duration::from_millis(50));
    }

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!(StorageBackend::parse(" MongoDB "), Some(StorageBackend::Mongo));
        assert_eq!(StorageBackend::parse("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse("couch"), None);
    }
}
