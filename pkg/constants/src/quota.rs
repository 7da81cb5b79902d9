//! Quota evaluation constants.

// ─── Resource names ───────────────────────────────────────────────────────

/// Object-count resource name for replication controllers.
pub const RESOURCE_REPLICATION_CONTROLLERS: &str = "count/replicationcontrollers";

/// Object-count resource name for config maps.
pub const RESOURCE_CONFIGMAPS: &str = "count/configmaps";

/// Object-count resource name for secrets.
pub const RESOURCE_SECRETS: &str = "count/secrets";

/// Object-count resource name for services.
pub const RESOURCE_SERVICES: &str = "count/services";

/// Object-count resource name for deployments.
pub const RESOURCE_DEPLOYMENTS: &str = "count/deployments.apps";

/// Object-count resource name for replica sets.
pub const RESOURCE_REPLICASETS: &str = "count/replicasets.apps";

// ─── Timings ──────────────────────────────────────────────────────────────

/// Default deadline for a direct-query list against the store, in milliseconds.
pub const DEFAULT_LIST_TIMEOUT_MS: u64 = 5_000;

/// How long start-up waits for every informer to reach `Synced`, in seconds.
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 30;

/// First delay before an informer relists after losing its event stream.
pub const DEFAULT_RESYNC_BACKOFF_INITIAL_MS: u64 = 100;

/// Upper bound on the relist backoff.
pub const DEFAULT_RESYNC_BACKOFF_MAX_MS: u64 = 10_000;
