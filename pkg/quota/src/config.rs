use std::time::Duration;

use pkg_constants::paths::DEFAULT_QUOTA_CONFIG;
use pkg_constants::quota::{
    DEFAULT_CACHE_SYNC_TIMEOUT_SECS, DEFAULT_LIST_TIMEOUT_MS, DEFAULT_RESYNC_BACKOFF_INITIAL_MS,
    DEFAULT_RESYNC_BACKOFF_MAX_MS,
};
use pkg_types::config::{QuotaConfigFile, load_config_file};

use crate::informer::ResyncBackoff;

/// Resolved quota subsystem settings.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub use_informers: bool,
    pub list_timeout: Duration,
    pub cache_sync_timeout: Duration,
    pub resync_backoff: ResyncBackoff,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self::from_file(QuotaConfigFile::default())
    }
}

impl QuotaConfig {
    /// Fill unset fields from defaults.
    pub fn from_file(file: QuotaConfigFile) -> Self {
        let initial = file
            .resync_backoff_initial_ms
            .unwrap_or(DEFAULT_RESYNC_BACKOFF_INITIAL_MS);
        let max = file
            .resync_backoff_max_ms
            .unwrap_or(DEFAULT_RESYNC_BACKOFF_MAX_MS)
            .max(initial);
        Self {
            use_informers: file.use_informers.unwrap_or(true),
            list_timeout: Duration::from_millis(file.list_timeout_ms.unwrap_or(DEFAULT_LIST_TIMEOUT_MS)),
            cache_sync_timeout: Duration::from_secs(
                file.cache_sync_timeout_secs
                    .unwrap_or(DEFAULT_CACHE_SYNC_TIMEOUT_SECS),
            ),
            resync_backoff: ResyncBackoff {
                initial: Duration::from_millis(initial),
                max: Duration::from_millis(max),
            },
        }
    }

    /// Load from a YAML file; a missing file yields defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let file: QuotaConfigFile = load_config_file(path)?;
        Ok(Self::from_file(file))
    }

    /// Load from the default config path.
    pub fn load_default() -> anyhow::Result<Self> {
        Self::load(DEFAULT_QUOTA_CONFIG)
    }
}
