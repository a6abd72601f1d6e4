//! Operation routines.
//!
//! Each routine is entered once per invocation from the dispatcher and either
//! completes or returns the error that ends the run. A routine whose feature
//! flag is off logs a warning and succeeds without touching anything.

mod backup;
mod query;
mod restore;
mod transfer;

pub use backup::{backup, enforce_retention, verify_after_backup};
pub use query::{export, init, list, stats, verify};
pub use restore::restore;
pub use transfer::{Direction, transfer};

use crate::config::Config;
use crate::engine::{Rclone, Restic, Runner};
use crate::error::Result;
use crate::repository::Repository;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything a routine may use. Routines never read ambient process state.
pub struct Context<'a> {
    pub config: &'a Config,
    pub repository: &'a Repository,
    pub runner: &'a Runner,
    /// Active log session, kept out of transfers.
    pub session_log: &'a Path,
}

impl<'a> Context<'a> {
    pub fn restic(&self) -> Restic<'a> {
        Restic::new(self.config, self.repository)
    }

    pub fn rclone(&self) -> Rclone<'a> {
        Rclone::new(self.config)
    }

    /// Checks that restic can be found before any state-changing step.
    pub fn require_restic(&self) -> Result<PathBuf> {
        self.runner.ensure_available(&self.config.restic_bin)
    }

    /// Returns `enabled`, warning when the step is switched off.
    fn enabled(&self, step: &str, enabled: bool) -> bool {
        if !enabled {
            warn!(
                "{step} is disabled for profile '{}', skipping",
                self.config.profile
            );
        }
        enabled
    }
}
