use serde::{Deserialize, Serialize};

/// Quota subsystem configuration file (YAML).
///
/// Example `quota.yaml`:
/// ```yaml
/// use-informers: true
/// list-timeout-ms: 2000
/// cache-sync-timeout-secs: 30
/// resync-backoff-initial-ms: 100
/// resync-backoff-max-ms: 10000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaConfigFile {
    /// Serve usage from informer caches instead of querying the store directly.
    #[serde(default, alias = "use-informers")]
    pub use_informers: Option<bool>,
    #[serde(default, alias = "list-timeout-ms")]
    pub list_timeout_ms: Option<u64>,
    #[serde(default, alias = "cache-sync-timeout-secs")]
    pub cache_sync_timeout_secs: Option<u64>,
    #[serde(default, alias = "resync-backoff-initial-ms")]
    pub resync_backoff_initial_ms: Option<u64>,
    #[serde(default, alias = "resync-backoff-max-ms")]
    pub resync_backoff_max_ms: Option<u64>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to read config {}: {}", path, e)),
    };
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    let config: T = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path, e))?;
    Ok(config)
}
