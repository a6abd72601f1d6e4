/// Package name.
pub(crate) const PKG_NAME: &str = env!("CARGO_PKG_NAME");
/// Base configuration file name.
pub(crate) const CONFIG_NAME: &str = "config.toml";
/// Profile used when none is selected.
pub const DEFAULT_PROFILE: &str = "default";
/// Retained log sessions when nothing else is configured.
pub const DEFAULT_MAX_LOGS: usize = 10;
/// Highest verbosity level that changes behaviour.
pub const MAX_VERBOSITY: u8 = 3;

/// Directory names under the configuration root.
pub(crate) const PROFILES_DIR: &str = "profiles";
pub(crate) const LOCKS_DIR: &str = "locks";
pub(crate) const LOGS_DIR: &str = "logs";
pub(crate) const BACKUPS_DIR: &str = "backups";

/// Conventional files under the configuration root.
pub(crate) const PASSWORD_FILE_NAME: &str = "restic-password";
pub(crate) const EXCLUDE_FILE_NAME: &str = "excludes.txt";
pub(crate) const RCLONE_CONFIG_NAME: &str = "rclone.conf";
pub(crate) const REPORT_SUFFIX: &str = "backup-info.json";
