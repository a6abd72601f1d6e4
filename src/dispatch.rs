//! Command dispatch.
//!
//! Every verb except `template` runs the same pipeline: resolve the
//! configuration, select the repository mode, take the execution lock, open a
//! log session and hand over to exactly one routine. Errors are logged here,
//! while the session is still attached, and returned to the binary which maps
//! them to an exit status.

use crate::cli::Command;
use crate::config::{Config, Overrides};
use crate::engine::Runner;
use crate::error::{Error, Result};
use crate::lock::ExecutionLock;
use crate::logging::{LogSession, SessionSink};
use crate::repository::Repository;
use crate::routines::{self, Context, Direction};
use crate::template::CONFIG_TEMPLATE;
use tracing::{debug, error, info, warn};

/// Runs one command to completion, or until `shutdown` resolves with the
/// name of the signal that stopped it.
pub async fn run<F>(
    command: Command,
    overrides: &Overrides,
    sink: &SessionSink,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = &'static str>,
{
    if command == Command::Template {
        print!("{CONFIG_TEMPLATE}");
        return Ok(());
    }

    let config = Config::resolve(overrides).inspect_err(report)?;
    let repository = Repository::select(&config);
    for var in repository.backend_credentials() {
        if std::env::var_os(var).is_none() {
            warn!("{var} is not set; restic may not be able to reach {}", repository.handle);
        }
    }

    let lock = ExecutionLock::acquire(&config.lock_dir()).inspect_err(report)?;
    let session = LogSession::start(&config.log_dir(), config.max_logs, sink).inspect_err(report)?;
    repository.prepare(config.dry_run).inspect_err(report)?;

    info!(
        "Running {} for profile '{}' ({} repository {}){}",
        verb(&command),
        config.profile,
        repository.mode,
        repository.handle,
        if config.dry_run { " [dry-run]" } else { "" }
    );
    let runner = Runner::new(config.dry_run, session.sink().clone());
    let ctx = Context {
        config: &config,
        repository: &repository,
        runner: &runner,
        session_log: session.path(),
    };
    // Nothing above awaits, so a signal received earlier is observed here.
    let result = tokio::select! {
        result = execute(command, &ctx) => result,
        signal = shutdown => Err(Error::Interrupted(signal)),
    };
    let result = result.inspect_err(report);
    if result.is_ok() {
        debug!("Finished, releasing {}", lock.path().display());
    }
    drop(session);
    result?;
    lock.release().inspect_err(report)
}

async fn execute(command: Command, ctx: &Context<'_>) -> Result<()> {
    match command {
        Command::Init => routines::init(ctx).await,
        Command::Backup => routines::backup(ctx).await,
        Command::Restore { path, snapshot } => routines::restore(ctx, path, snapshot).await,
        Command::Push => routines::transfer(ctx, Direction::Push).await,
        Command::Pull => routines::transfer(ctx, Direction::Pull).await,
        Command::List => routines::list(ctx).await,
        Command::Stats => routines::stats(ctx).await,
        Command::Verify => routines::verify(ctx).await,
        Command::Export => routines::export(ctx).await,
        // Printed before the pipeline starts.
        Command::Template => Ok(()),
    }
}

fn verb(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::Backup => "backup",
        Command::Restore { .. } => "restore",
        Command::Push => "push",
        Command::Pull => "pull",
        Command::List => "list",
        Command::Stats => "stats",
        Command::Verify => "verify",
        Command::Export => "export",
        Command::Template => "template",
    }
}

fn report(e: &Error) {
    match e {
        Error::Interrupted(_) => warn!("{e}"),
        _ => error!("{e}"),
    }
}
