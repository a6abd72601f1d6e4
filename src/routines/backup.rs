use super::{Context, query};
use crate::error::Result;
use tracing::info;

/// Backs up every source, then prunes by age and optionally verifies. The
/// first failing step ends the chain.
pub async fn backup(ctx: &Context<'_>) -> Result<()> {
    if !ctx.enabled("backup", ctx.config.features.backup) {
        return Ok(());
    }
    ctx.require_restic()?;

    info!(
        "Backing up {} source(s) to {} repository {}",
        ctx.config.sources.len(),
        ctx.repository.mode,
        ctx.repository.handle
    );
    ctx.runner.execute(&ctx.restic().backup()).await?;
    if !ctx.runner.dry_run() {
        info!("Backup completed successfully");
    }

    enforce_retention(ctx).await?;
    verify_after_backup(ctx).await
}

/// Forgets and prunes snapshots outside the retention window. A window of
/// zero disables pruning.
pub async fn enforce_retention(ctx: &Context<'_>) -> Result<()> {
    let days = ctx.config.retention_days;
    if days == 0 {
        info!("Retention disabled (retention_days = 0), skipping prune");
        return Ok(());
    }
    info!("Pruning snapshots older than {days} day(s)");
    ctx.runner.execute(&ctx.restic().forget(days)).await
}

/// Runs the integrity check chained after a backup when enabled.
pub async fn verify_after_backup(ctx: &Context<'_>) -> Result<()> {
    if !ctx.config.verify_after_backup {
        return Ok(());
    }
    if ctx.runner.dry_run() {
        ctx.runner.preview(&ctx.restic().check());
        return Ok(());
    }
    query::check(ctx).await
}
