//! Repository mode selection.
//!
//! A configured `remote_repository` selects [`Mode::Direct`]: restic talks to
//! that address and the rclone transfers are switched off. Otherwise
//! [`Mode::LocalSync`] keeps the repository under `<root>/backups/<profile>`
//! and `push`/`pull` carry the configuration root to the remote.

use crate::config::{Config, Toggle};
use crate::error::Result;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    LocalSync,
    Direct,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::LocalSync => f.write_str("local-sync"),
            Mode::Direct => f.write_str("direct"),
        }
    }
}

/// Whether a transfer step may run, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Enabled,
    /// Switched off in the configuration.
    Disabled,
    /// Switched off because the repository is addressed directly.
    DisabledByMode,
}

/// The resolved restic target for this invocation. Derived from [`Config`]
/// every run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub mode: Mode,
    /// Value passed to restic as `-r`.
    pub handle: String,
    /// Directory backing the repository in Local-Sync Mode.
    pub local_path: Option<PathBuf>,
    pub push: Availability,
    pub pull: Availability,
}

impl Repository {
    pub fn select(config: &Config) -> Self {
        match &config.remote_repository {
            Some(address) => {
                for (name, toggle) in [("push", config.features.push), ("pull", config.features.pull)] {
                    if toggle.is_explicit_on() {
                        warn!(
                            "{name} is enabled in the configuration but disabled because the repository is addressed directly ({address})"
                        );
                    } else {
                        debug!("{name} unavailable in direct repository mode");
                    }
                }
                Self {
                    mode: Mode::Direct,
                    handle: address.clone(),
                    local_path: None,
                    push: Availability::DisabledByMode,
                    pull: Availability::DisabledByMode,
                }
            }
            None => {
                let path = config.local_repository();
                Self {
                    mode: Mode::LocalSync,
                    handle: path.to_string_lossy().into_owned(),
                    local_path: Some(path),
                    push: availability(config.features.push),
                    pull: availability(config.features.pull),
                }
            }
        }
    }

    /// Creates the local repository directory when it is missing. Nothing is
    /// created under dry-run.
    pub fn prepare(&self, dry_run: bool) -> Result<()> {
        let Some(path) = &self.local_path else {
            return Ok(());
        };
        if path.is_dir() {
            return Ok(());
        }
        if dry_run {
            debug!("Dry run: not creating {}", path.display());
        } else {
            debug!("Creating local repository directory {}", path.display());
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Environment variables restic expects for the repository backend, if
    /// the handle names a backend that needs them.
    pub fn backend_credentials(&self) -> &'static [&'static str] {
        if self.mode != Mode::Direct {
            return &[];
        }
        let scheme = self.handle.split(':').next().unwrap_or_default();
        match scheme {
            "s3" => &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
            "b2" => &["B2_ACCOUNT_ID", "B2_ACCOUNT_KEY"],
            "azure" => &["AZURE_ACCOUNT_NAME"],
            "gs" => &["GOOGLE_PROJECT_ID"],
            "swift" => &["OS_AUTH_URL"],
            _ => &[],
        }
    }
}

fn availability(toggle: Toggle) -> Availability {
    if toggle.is_enabled() {
        Availability::Enabled
    } else {
        Availability::Disabled
    }
}
