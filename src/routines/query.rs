use super::Context;
use crate::error::{Error, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Creates the repository unless it already exists.
pub async fn init(ctx: &Context<'_>) -> Result<()> {
    if !ctx.enabled("init", ctx.config.features.init) {
        return Ok(());
    }
    ctx.require_restic()?;
    let restic = ctx.restic();
    if ctx.runner.probe(&restic.probe()).await? {
        info!("Repository {} is already initialized", ctx.repository.handle);
        return Ok(());
    }
    ctx.runner.execute(&restic.init()).await?;
    if !ctx.runner.dry_run() {
        info!("Repository {} initialized", ctx.repository.handle);
    }
    Ok(())
}

pub async fn list(ctx: &Context<'_>) -> Result<()> {
    if !ctx.enabled("list", ctx.config.features.list) {
        return Ok(());
    }
    ctx.runner.query(&ctx.restic().snapshots(false)).await
}

pub async fn stats(ctx: &Context<'_>) -> Result<()> {
    if !ctx.enabled("stats", ctx.config.features.stats) {
        return Ok(());
    }
    ctx.runner.query(&ctx.restic().stats(false)).await
}

/// Explicit integrity check.
pub async fn verify(ctx: &Context<'_>) -> Result<()> {
    if !ctx.enabled("verify", ctx.config.features.verify) {
        return Ok(());
    }
    check(ctx).await
}

/// Runs `restic check`. A failing check is reported as possible corruption,
/// not as an ordinary engine failure.
pub(super) async fn check(ctx: &Context<'_>) -> Result<()> {
    info!("Checking repository {}", ctx.repository.handle);
    match ctx.runner.query(&ctx.restic().check()).await {
        Ok(()) => {
            info!("Repository check passed");
            Ok(())
        }
        Err(Error::Engine { invocation, .. }) => Err(Error::Integrity {
            repository: ctx.repository.handle.clone(),
            invocation,
        }),
        Err(e) => Err(e),
    }
}

#[derive(Serialize)]
struct BackupInfo<'a> {
    generated_at: String,
    profile: &'a str,
    mode: String,
    repository: &'a str,
    sources: &'a [PathBuf],
    retention_days: u32,
    snapshots: serde_json::Value,
    stats: serde_json::Value,
}

/// Writes a JSON report describing the profile and its snapshots to
/// `<root>/<profile>-backup-info.json`.
pub async fn export(ctx: &Context<'_>) -> Result<()> {
    if !ctx.enabled("export", ctx.config.features.export) {
        return Ok(());
    }
    let restic = ctx.restic();
    let (snapshots, stats) = (restic.snapshots(true), restic.stats(true));
    let path = ctx.config.report_path();
    if ctx.runner.dry_run() {
        ctx.runner.preview(&snapshots);
        ctx.runner.preview(&stats);
        info!("[dry-run] would write report to {}", path.display());
        return Ok(());
    }

    let report = BackupInfo {
        generated_at: Local::now().to_rfc3339(),
        profile: &ctx.config.profile,
        mode: ctx.repository.mode.to_string(),
        repository: &ctx.repository.handle,
        sources: &ctx.config.sources,
        retention_days: ctx.config.retention_days,
        snapshots: serde_json::from_slice(&ctx.runner.capture(&snapshots).await?)?,
        stats: serde_json::from_slice(&ctx.runner.capture(&stats).await?)?,
    };

    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("Backup info exported to {}", path.display());
    Ok(())
}
