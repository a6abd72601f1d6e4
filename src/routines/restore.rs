use super::Context;
use crate::error::{Error, Result};
use dialoguer::Confirm;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_SNAPSHOT: &str = "latest";
const DEFAULT_TARGET: &str = "/";

/// Restores `snapshot` (default `latest`) into `target` (default `/`).
/// Declining the confirmation ends the run cleanly.
pub async fn restore(
    ctx: &Context<'_>,
    target: Option<PathBuf>,
    snapshot: Option<String>,
) -> Result<()> {
    if !ctx.enabled("restore", ctx.config.features.restore) {
        return Ok(());
    }
    ctx.require_restic()?;

    let target = target.unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET));
    let snapshot = snapshot.unwrap_or_else(|| DEFAULT_SNAPSHOT.to_string());
    let inv = ctx.restic().restore(&snapshot, &target);

    let needs_confirmation =
        !ctx.runner.dry_run() && ctx.config.restore_confirm && !ctx.config.assume_yes;
    if needs_confirmation && !confirm(&snapshot, &target).await? {
        warn!("Restore aborted by operator");
        return Ok(());
    }

    ctx.runner.execute(&inv).await?;
    if !ctx.runner.dry_run() {
        info!("Snapshot {snapshot} restored to {}", target.display());
    }
    Ok(())
}

async fn confirm(snapshot: &str, target: &Path) -> Result<bool> {
    if !io::stdin().is_terminal() {
        warn!("Restore needs confirmation but no terminal is attached; rerun with --yes");
        return Ok(false);
    }
    let prompt = format!(
        "Restore snapshot {snapshot} into {}? Existing files will be overwritten",
        target.display()
    );
    tokio::task::spawn_blocking(move || Confirm::new().with_prompt(prompt).default(false).interact())
        .await
        .map_err(|e| Error::Prompt(e.to_string()))?
        .map_err(prompt_error)
}

/// Ctrl-C at the prompt is an interruption, not a terminal failure.
fn prompt_error(e: dialoguer::Error) -> Error {
    match e {
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => {
            Error::Interrupted("Ctrl-C")
        }
        other => Error::Prompt(other.to_string()),
    }
}
