/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./playlist-sync.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Scheduler defaults
pub const DEFAULT_POLL_INTERVAL: &str = "15s";
pub const DEFAULT_ABSOLUTE_MAX_ATTEMPTS: i32 = 100;
pub const DEFAULT_SYNC_MAX_ATTEMPTS: i32 = 3;

// Fetcher defaults
pub const DEFAULT_FETCH_TIMEOUT: &str = "60s";
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 64 * 1024 * 1024; // 64MB
pub const DEFAULT_USER_AGENT: &str = concat!("playlist-sync/", env!("CARGO_PKG_VERSION"));

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_JSON: bool = false;

// Environment overrides
pub const ENV_PREFIX: &str = "PLAYLIST_SYNC_";
pub const ENV_SEPARATOR: &str = "__";
