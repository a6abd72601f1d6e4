//! Configuration resolution.
//!
//! The effective configuration is layered from three sources, later layers
//! winning field by field:
//!
//! 1. the base `config.toml`,
//! 2. the selected profile fragment `<root>/profiles/<name>.toml`,
//! 3. command-line flags and their environment fallbacks ([`Overrides`]).
//!
//! The merged result is validated once and frozen into [`Config`], which every
//! routine receives by reference.

use crate::constants::{
    BACKUPS_DIR, CONFIG_NAME, DEFAULT_MAX_LOGS, EXCLUDE_FILE_NAME, LOCKS_DIR, LOGS_DIR, PKG_NAME,
    PASSWORD_FILE_NAME, PROFILES_DIR, RCLONE_CONFIG_NAME, REPORT_SUFFIX,
};
use crate::error::{Error, Result};
use crate::path_util::expand_path;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::{fs, io};
use tracing::{debug, warn};

/// One configuration layer as written on disk. Every field is optional so
/// that a profile only has to name what it changes.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    /// Configuration root. Only honoured in the base file.
    pub root: Option<String>,
    /// Directories to back up.
    pub sources: Option<Vec<String>>,
    /// rclone remote the configuration root is synchronized with.
    pub remote: Option<String>,
    /// restic repository addressed directly, bypassing the local repository.
    pub remote_repository: Option<String>,
    /// Keep snapshots younger than this many days. Zero disables pruning.
    pub retention_days: Option<u32>,
    /// Glob patterns passed to restic as `--exclude`.
    pub exclude: Option<Vec<String>>,
    /// File of exclusion patterns passed to restic as `--exclude-file`.
    pub exclude_file: Option<String>,
    pub password: Option<String>,
    pub password_file: Option<String>,
    pub rclone_config: Option<String>,
    pub restic_bin: Option<String>,
    pub rclone_bin: Option<String>,
    pub max_logs: Option<usize>,
    pub restore_confirm: Option<bool>,
    pub verify_after_backup: Option<bool>,
    pub features: PartialFeatures,
}

/// Per-step enable flags as written on disk.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PartialFeatures {
    pub init: Option<bool>,
    pub backup: Option<bool>,
    pub restore: Option<bool>,
    pub push: Option<bool>,
    pub pull: Option<bool>,
    pub list: Option<bool>,
    pub stats: Option<bool>,
    pub verify: Option<bool>,
    pub export: Option<bool>,
}

impl PartialConfig {
    /// Overlays `other` on top of `self`. Lists are replaced, not appended.
    pub fn merge(self, other: PartialConfig) -> PartialConfig {
        PartialConfig {
            root: other.root.or(self.root),
            sources: other.sources.or(self.sources),
            remote: other.remote.or(self.remote),
            remote_repository: other.remote_repository.or(self.remote_repository),
            retention_days: other.retention_days.or(self.retention_days),
            exclude: other.exclude.or(self.exclude),
            exclude_file: other.exclude_file.or(self.exclude_file),
            password: other.password.or(self.password),
            password_file: other.password_file.or(self.password_file),
            rclone_config: other.rclone_config.or(self.rclone_config),
            restic_bin: other.restic_bin.or(self.restic_bin),
            rclone_bin: other.rclone_bin.or(self.rclone_bin),
            max_logs: other.max_logs.or(self.max_logs),
            restore_confirm: other.restore_confirm.or(self.restore_confirm),
            verify_after_backup: other.verify_after_backup.or(self.verify_after_backup),
            features: self.features.merge(other.features),
        }
    }
}

impl PartialFeatures {
    fn merge(self, other: PartialFeatures) -> PartialFeatures {
        PartialFeatures {
            init: other.init.or(self.init),
            backup: other.backup.or(self.backup),
            restore: other.restore.or(self.restore),
            push: other.push.or(self.push),
            pull: other.pull.or(self.pull),
            list: other.list.or(self.list),
            stats: other.stats.or(self.stats),
            verify: other.verify.or(self.verify),
            export: other.export.or(self.export),
        }
    }
}

/// A transfer toggle that remembers whether the operator set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Unset,
    On,
    Off,
}

impl Toggle {
    /// Unset toggles default to enabled.
    pub fn is_enabled(self) -> bool {
        self != Toggle::Off
    }

    pub fn is_explicit_on(self) -> bool {
        self == Toggle::On
    }
}

impl From<Option<bool>> for Toggle {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Toggle::Unset,
            Some(true) => Toggle::On,
            Some(false) => Toggle::Off,
        }
    }
}

/// Effective per-step enable flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub init: bool,
    pub backup: bool,
    pub restore: bool,
    pub push: Toggle,
    pub pull: Toggle,
    pub list: bool,
    pub stats: bool,
    pub verify: bool,
    pub export: bool,
}

impl From<PartialFeatures> for Features {
    fn from(p: PartialFeatures) -> Self {
        Self {
            init: p.init.unwrap_or(true),
            backup: p.backup.unwrap_or(true),
            restore: p.restore.unwrap_or(true),
            push: p.push.into(),
            pull: p.pull.into(),
            list: p.list.unwrap_or(true),
            stats: p.stats.unwrap_or(true),
            verify: p.verify.unwrap_or(true),
            export: p.export.unwrap_or(true),
        }
    }
}

/// How restic gets its repository password.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Password given by value in the configuration.
    Value(String),
    /// Path to a password file.
    File(PathBuf),
    /// `RESTIC_PASSWORD*` is already present in the environment.
    Inherited,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Value(_) => f.write_str("Value(<redacted>)"),
            Credential::File(path) => f.debug_tuple("File").field(path).finish(),
            Credential::Inherited => f.write_str("Inherited"),
        }
    }
}

/// Settings supplied on the command line or through `SNAPSYNC_*` variables.
#[derive(Debug, Clone)]
pub struct Overrides {
    pub config_file: PathBuf,
    pub profile: String,
    pub dry_run: bool,
    pub verbosity: u8,
    pub max_logs: Option<usize>,
    pub remote_repository: Option<String>,
    pub assume_yes: bool,
    /// Whether the environment already carries a restic credential.
    pub inherited_credentials: bool,
}

/// The validated, immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_file: PathBuf,
    pub root: PathBuf,
    pub profile: String,
    pub sources: Vec<PathBuf>,
    pub remote: Option<String>,
    pub remote_repository: Option<String>,
    pub retention_days: u32,
    pub exclude: Vec<String>,
    pub exclude_file: Option<PathBuf>,
    pub credential: Credential,
    pub rclone_config: Option<PathBuf>,
    pub restic_bin: PathBuf,
    pub rclone_bin: PathBuf,
    pub max_logs: usize,
    pub restore_confirm: bool,
    pub verify_after_backup: bool,
    pub features: Features,
    pub dry_run: bool,
    pub verbosity: u8,
    pub assume_yes: bool,
}

impl Config {
    /// Loads the base file and the selected profile, applies overrides and
    /// validates the result.
    ///
    /// # Errors
    /// [`Error::MissingConfig`] if the base file is absent, [`Error::Parse`]
    /// for malformed TOML and [`Error::Config`] listing every violation found.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let config_file = std::path::absolute(&overrides.config_file)?;
        let base = read_fragment(&config_file)?
            .ok_or_else(|| Error::MissingConfig(config_file.clone()))?;
        let base_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let root = match &base.root {
            Some(root) => expand_path(root, &base_dir),
            None => base_dir,
        };

        validate_profile_name(&overrides.profile)?;
        let profile_file = root
            .join(PROFILES_DIR)
            .join(format!("{}.toml", overrides.profile));
        let merged = match read_fragment(&profile_file)? {
            Some(mut fragment) => {
                if fragment.root.take().is_some() {
                    warn!(
                        "Ignoring `root` in profile {}; the root is only read from the base configuration",
                        profile_file.display()
                    );
                }
                debug!("Loaded profile '{}' from {}", overrides.profile, profile_file.display());
                base.merge(fragment)
            }
            None => {
                debug!(
                    "No profile fragment at {}, using the base configuration",
                    profile_file.display()
                );
                base
            }
        };

        Self::build(merged, config_file, root, overrides)
    }

    /// Validates a merged layer and applies the override layer.
    pub fn build(
        merged: PartialConfig,
        config_file: PathBuf,
        root: PathBuf,
        overrides: &Overrides,
    ) -> Result<Self> {
        let mut violations = Vec::new();

        let sources: Vec<PathBuf> = merged
            .sources
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|s| expand_path(s, &root))
            .collect();
        if sources.is_empty() {
            violations.push("`sources` must list at least one directory".to_string());
        }
        for source in sources.iter().filter(|s| !s.is_dir()) {
            violations.push(format!(
                "Backup source '{}' is not an existing directory",
                source.display()
            ));
        }

        let credential = resolve_credential(&merged, &root, overrides.inherited_credentials)
            .map_err(|v| violations.push(v))
            .ok();

        let exclude_file = match merged.exclude_file {
            Some(file) => {
                let path = expand_path(&file, &root);
                if !path.is_file() {
                    violations.push(format!("Exclude file '{}' does not exist", path.display()));
                }
                Some(path)
            }
            None => Some(root.join(EXCLUDE_FILE_NAME)).filter(|p| p.is_file()),
        };

        let remote_repository = overrides
            .remote_repository
            .clone()
            .or(merged.remote_repository)
            .filter(|r| !r.trim().is_empty());
        let remote = merged.remote.filter(|r| !r.trim().is_empty());
        let features = Features::from(merged.features);

        let rclone_config = merged
            .rclone_config
            .map(|p| expand_path(&p, &root))
            .unwrap_or_else(|| root.join(RCLONE_CONFIG_NAME));
        let rclone_config = if rclone_config.is_file() {
            Some(rclone_config)
        } else {
            if transfers_possible(remote.as_deref(), remote_repository.as_deref(), &features) {
                warn!(
                    "rclone configuration {} not found; push and pull will use rclone's default configuration",
                    rclone_config.display()
                );
            }
            None
        };

        let Some(credential) = credential.filter(|_| violations.is_empty()) else {
            return Err(Error::Config(violations));
        };

        Ok(Self {
            config_file,
            sources,
            remote,
            remote_repository,
            retention_days: merged.retention_days.unwrap_or(0),
            exclude: merged.exclude.unwrap_or_default(),
            exclude_file,
            credential,
            rclone_config,
            restic_bin: program_path(merged.restic_bin.as_deref().unwrap_or("restic"), &root),
            rclone_bin: program_path(merged.rclone_bin.as_deref().unwrap_or("rclone"), &root),
            max_logs: overrides
                .max_logs
                .or(merged.max_logs)
                .unwrap_or(DEFAULT_MAX_LOGS),
            restore_confirm: merged.restore_confirm.unwrap_or(true),
            verify_after_backup: merged.verify_after_backup.unwrap_or(false),
            features,
            profile: overrides.profile.clone(),
            dry_run: overrides.dry_run,
            verbosity: overrides.verbosity,
            assume_yes: overrides.assume_yes,
            root,
        })
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Local repository used in Local-Sync Mode.
    pub fn local_repository(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR).join(&self.profile)
    }

    /// Destination of the `export` report.
    pub fn report_path(&self) -> PathBuf {
        self.root
            .join(format!("{}-{}", self.profile, REPORT_SUFFIX))
    }
}

/// Returns the default base configuration file, platform-specific.
#[cfg(not(target_os = "macos"))]
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(PKG_NAME).join(CONFIG_NAME))
}

/// Returns the default base configuration file, platform-specific.
#[cfg(target_os = "macos")]
pub fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join(PKG_NAME).join(CONFIG_NAME))
}

fn read_fragment(path: &Path) -> Result<Option<PartialConfig>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn validate_profile_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::config(format!(
            "Profile name '{name}' must be non-empty and must not contain path separators"
        )));
    }
    Ok(())
}

fn resolve_credential(
    merged: &PartialConfig,
    root: &Path,
    inherited: bool,
) -> std::result::Result<Credential, String> {
    match (&merged.password, &merged.password_file) {
        (Some(_), Some(_)) => Err("Set only one of `password` and `password_file`".to_string()),
        (Some(password), None) if password.is_empty() => {
            Err("`password` must not be empty".to_string())
        }
        (Some(password), None) => Ok(Credential::Value(password.clone())),
        (None, Some(file)) => {
            let path = expand_path(file, root);
            if path.is_file() {
                Ok(Credential::File(path))
            } else {
                Err(format!("Password file '{}' does not exist", path.display()))
            }
        }
        (None, None) => {
            let fallback = root.join(PASSWORD_FILE_NAME);
            if fallback.is_file() {
                debug!("Using conventional password file {}", fallback.display());
                Ok(Credential::File(fallback))
            } else if inherited {
                debug!("Using restic credentials from the environment");
                Ok(Credential::Inherited)
            } else {
                Err(format!(
                    "No restic credential: set `password` or `password_file`, or create {}",
                    fallback.display()
                ))
            }
        }
    }
}

/// Push or pull can only run with a remote, in local-sync mode, and when at
/// least one of them is switched on.
fn transfers_possible(
    remote: Option<&str>,
    remote_repository: Option<&str>,
    features: &Features,
) -> bool {
    remote.is_some()
        && remote_repository.is_none()
        && (features.push.is_enabled() || features.pull.is_enabled())
}

/// Bare program names are looked up on `PATH` later; anything that looks
/// like a path is expanded against the root.
fn program_path(program: &str, root: &Path) -> PathBuf {
    if program.contains(['/', '\\']) || program.starts_with('~') || program.starts_with("$HOME") {
        expand_path(program, root)
    } else {
        PathBuf::from(program)
    }
}
