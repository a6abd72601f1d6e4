/// Starter `config.toml` printed by `snapsync template`.
pub const CONFIG_TEMPLATE: &str = r#"# snapsync configuration
#
# Profiles in <root>/profiles/<name>.toml override any key below except `root`.

# Configuration root holding locks/, logs/, backups/ and profiles/.
# Defaults to the directory of this file.
# root = "~/.config/snapsync"

# Directories to back up. Every entry must exist.
sources = ["~/Documents"]

# rclone remote that push/pull synchronize the configuration root with.
remote = "gdrive:snapsync"

# Address restic uses directly (e.g. "s3:s3.amazonaws.com/bucket").
# When set, the local repository and push/pull are not used.
# remote_repository = ""

# Keep snapshots younger than this many days after each backup. 0 disables pruning.
retention_days = 30

# Glob patterns excluded from backups.
exclude = ["*.tmp", ".cache"]

# Exclusion pattern file. Defaults to <root>/excludes.txt when present.
# exclude_file = "excludes.txt"

# restic credential: set one of these, or create <root>/restic-password.
# password = ""
# password_file = "restic-password"

# rclone configuration. Defaults to <root>/rclone.conf when present.
# rclone_config = "rclone.conf"

# restic_bin = "restic"
# rclone_bin = "rclone"

# Number of log sessions kept in <root>/logs.
max_logs = 10

# Ask before restoring over existing files.
restore_confirm = true

# Run `restic check` after every successful backup.
verify_after_backup = false

[features]
init = true
backup = true
restore = true
# push = true
# pull = true
list = true
stats = true
verify = true
export = true
"#;
