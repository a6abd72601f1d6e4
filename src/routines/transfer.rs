use super::Context;
use crate::constants::LOCKS_DIR;
use crate::error::{Error, Result};
use crate::repository::Availability;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Configuration root to remote.
    Push,
    /// Remote to configuration root.
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => f.write_str("push"),
            Direction::Pull => f.write_str("pull"),
        }
    }
}

/// Synchronizes the configuration root with the remote using rclone. The
/// active log session and the lock directory are never transferred.
pub async fn transfer(ctx: &Context<'_>, direction: Direction) -> Result<()> {
    let availability = match direction {
        Direction::Push => ctx.repository.push,
        Direction::Pull => ctx.repository.pull,
    };
    match availability {
        Availability::Enabled => {}
        Availability::Disabled => {
            ctx.enabled(&direction.to_string(), false);
            return Ok(());
        }
        Availability::DisabledByMode => {
            warn!(
                "{direction} is disabled: repository {} is addressed directly, skipping",
                ctx.repository.handle
            );
            return Ok(());
        }
    }

    let remote = ctx.config.remote.as_deref().ok_or_else(|| {
        Error::config(format!("`remote` must be set to {direction} in local-sync mode"))
    })?;
    ctx.runner.ensure_available(&ctx.config.rclone_bin)?;

    let (root, remote_os) = (ctx.config.root.as_os_str(), OsStr::new(remote));
    let (source, destination) = match direction {
        Direction::Push => (root, remote_os),
        Direction::Pull => (remote_os, root),
    };
    let excludes = excludes(&ctx.config.root, ctx.session_log);

    info!("Starting {direction} between {} and {remote}", ctx.config.root.display());
    ctx.runner
        .execute(&ctx.rclone().sync(source, destination, &excludes))
        .await?;
    if !ctx.runner.dry_run() {
        info!("{direction} completed successfully");
    }
    Ok(())
}

/// rclone filter rules, anchored at the root of the transfer.
fn excludes(root: &Path, session_log: &Path) -> Vec<String> {
    let mut rules = Vec::with_capacity(2);
    if let Ok(relative) = session_log.strip_prefix(root) {
        rules.push(format!("/{}", relative.to_string_lossy().replace('\\', "/")));
    }
    rules.push(format!("/{LOCKS_DIR}/**"));
    rules
}
