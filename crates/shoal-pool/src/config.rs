use crate::dialect::Dialect;
use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pool-wide settings.
///
/// Loaded from a flat JSON file and/or environment overrides; the pool
/// itself only ever sees the resolved struct. Interval and timeout fields
/// are in seconds to keep the file format plain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Seconds between health probe rounds. Zero disables the periodic
    /// prober (the initial round at open still runs).
    pub health_check_interval: u64,
    /// Total deadline for one upstream request, in seconds.
    pub request_timeout: u64,
    /// Retries after the initial attempt.
    pub max_retries: usize,
    /// Default concurrency ceiling for `process_batch`.
    pub max_concurrent_batch: usize,
    pub enable_metrics: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            health_check_interval: 30,
            request_timeout: 300,
            max_retries: 3,
            max_concurrent_batch: 50,
            enable_metrics: true,
        }
    }
}

impl PoolSettings {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| PoolError::Config(format!("invalid settings in {}: {e}", path.display())))
    }

    /// Applies `SHOAL_*` environment overrides on top of the current values.
    ///
    /// Unset variables leave the field untouched; unparsable values are an
    /// error rather than silently ignored.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(v) = env_parse::<u64>("SHOAL_HEALTH_CHECK_INTERVAL")? {
            self.health_check_interval = v;
        }
        if let Some(v) = env_parse::<u64>("SHOAL_REQUEST_TIMEOUT")? {
            self.request_timeout = v;
        }
        if let Some(v) = env_parse::<usize>("SHOAL_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_parse::<usize>("SHOAL_MAX_CONCURRENT_BATCH")? {
            self.max_concurrent_batch = v;
        }
        if let Some(v) = env_parse::<bool>("SHOAL_ENABLE_METRICS")? {
            self.enable_metrics = v;
        }
        Ok(self)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| PoolError::Config(format!("invalid {name}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn default_max_concurrent() -> u32 {
    5
}

/// Definition of one upstream worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub dialect: Dialect,
    pub model: String,
    /// Per-worker concurrency ceiling.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: u32,
}

#[derive(Deserialize)]
struct WorkersFile {
    workers: Vec<WorkerConfig>,
}

/// Loads worker definitions from a `{"workers": [...]}` JSON file.
pub fn load_workers(path: impl AsRef<Path>) -> Result<Vec<WorkerConfig>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|e| PoolError::Config(format!("cannot read {}: {e}", path.display())))?;
    let file: WorkersFile = serde_json::from_str(&data)
        .map_err(|e| PoolError::Config(format!("invalid workers file {}: {e}", path.display())))?;

    if file.workers.is_empty() {
        return Err(PoolError::Config(format!(
            "{} defines no workers",
            path.display()
        )));
    }
    for worker in &file.workers {
        if worker.max_concurrent_requests == 0 {
            return Err(PoolError::Config(format!(
                "worker {} has a zero concurrency ceiling",
                worker.id
            )));
        }
    }
    Ok(file.workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Process environment is shared across test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_settings_defaults() {
        let settings = PoolSettings::default();
        assert_eq!(settings.health_check_interval, 30);
        assert_eq!(settings.request_timeout, 300);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.max_concurrent_batch, 50);
        assert!(settings.enable_metrics);
    }

    #[test]
    fn test_settings_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_retries": 1, "request_timeout": 60}}"#).unwrap();

        let settings = PoolSettings::load(file.path()).unwrap();
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.request_timeout, 60);
        assert_eq!(settings.health_check_interval, 30);
    }

    #[test]
    fn test_settings_missing_file_errors() {
        let err = PoolSettings::load("/nonexistent/settings.json").unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SHOAL_MAX_RETRIES", "7");
        std::env::set_var("SHOAL_ENABLE_METRICS", "false");

        let settings = PoolSettings::default().apply_env().unwrap();
        assert_eq!(settings.max_retries, 7);
        assert!(!settings.enable_metrics);

        std::env::remove_var("SHOAL_MAX_RETRIES");
        std::env::remove_var("SHOAL_ENABLE_METRICS");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SHOAL_REQUEST_TIMEOUT", "soon");
        let err = PoolSettings::default().apply_env().unwrap_err();
        std::env::remove_var("SHOAL_REQUEST_TIMEOUT");

        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_load_workers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"workers": [
                {{"id": "a", "host": "127.0.0.1", "port": 11434, "dialect": "generate", "model": "llama3"}},
                {{"id": "b", "host": "127.0.0.1", "port": 1234, "dialect": "openai", "model": "qwen", "max_concurrent_requests": 2}}
            ]}}"#
        )
        .unwrap();

        let workers = load_workers(file.path()).unwrap();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].dialect, Dialect::Generate);
        assert_eq!(workers[0].max_concurrent_requests, 5);
        assert_eq!(workers[1].dialect, Dialect::Completions);
        assert_eq!(workers[1].max_concurrent_requests, 2);
    }

    #[test]
    fn test_load_workers_rejects_empty_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": []}}"#).unwrap();
        assert!(load_workers(file.path()).is_err());
    }

    #[test]
    fn test_load_workers_rejects_zero_ceiling() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"workers": [{{"id": "a", "host": "h", "port": 1, "dialect": "chat", "model": "m", "max_concurrent_requests": 0}}]}}"#
        )
        .unwrap();
        assert!(load_workers(file.path()).is_err());
    }
}
