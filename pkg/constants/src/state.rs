//! State store / change-event log constants.

/// Root prefix of every object key: `/registry/<resource>/<namespace>/<name>`.
pub const REGISTRY_PREFIX: &str = "/registry/";

/// Number of recent change events retained for `events_since` replay.
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// Capacity of the live broadcast channel. A subscriber that falls further
/// behind than this observes a lag and must relist.
pub const EVENT_BROADCAST_CAPACITY: usize = 1024;
