//! Filesystem path constants.

/// Default quota subsystem config file path.
pub const DEFAULT_QUOTA_CONFIG: &str = "/etc/k3rs/quota.yaml";
