//! Command-line interface definition for snapsync.

use crate::config::{Overrides, default_config_file};
use crate::constants::{DEFAULT_PROFILE, MAX_VERBOSITY};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Environment variables whose presence means restic already has a credential.
const RESTIC_CREDENTIAL_VARS: [&str; 3] = [
    "RESTIC_PASSWORD",
    "RESTIC_PASSWORD_FILE",
    "RESTIC_PASSWORD_COMMAND",
];

/// Command-line interface definition for snapsync.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Profile to apply on top of the base configuration.
    #[arg(short, long, global = true, env = "SNAPSYNC_PROFILE", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Show the engine commands that would run without running them.
    #[arg(
        short,
        long,
        global = true,
        env = "SNAPSYNC_DRY_RUN",
        value_parser = FalseyValueParser::new()
    )]
    pub dry_run: bool,

    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Verbosity level, combined with -v by taking the larger value.
    #[arg(long, global = true, hide = true, env = "SNAPSYNC_VERBOSE")]
    pub verbosity: Option<u8>,

    /// Base configuration file.
    #[arg(short, long, global = true, env = "SNAPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of log sessions to keep.
    #[arg(long, global = true, env = "SNAPSYNC_MAX_LOGS")]
    pub max_logs: Option<usize>,

    /// Address a restic repository directly instead of the local one.
    #[arg(long, global = true, env = "SNAPSYNC_REMOTE_REPOSITORY")]
    pub remote_repository: Option<String>,

    /// Do not ask before restoring.
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Supported snapsync commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the repository if it does not exist yet.
    Init,
    /// Back up all sources, then apply retention and optional verification.
    Backup,
    /// Restore a snapshot (default: latest) into a target (default: /).
    Restore {
        /// Directory to restore into.
        path: Option<PathBuf>,
        /// Snapshot id to restore.
        snapshot: Option<String>,
    },
    /// Upload the configuration root to the remote.
    Push,
    /// Download the configuration root from the remote.
    Pull,
    /// List snapshots.
    List,
    /// Show repository statistics.
    Stats,
    /// Check repository integrity.
    Verify,
    /// Write a JSON report about this profile and its snapshots.
    Export,
    /// Print a starter configuration file.
    Template,
}

impl Cli {
    /// Effective verbosity from `-v` and `SNAPSYNC_VERBOSE`.
    pub fn verbosity(&self) -> u8 {
        self.verbose
            .max(self.verbosity.unwrap_or(0))
            .min(MAX_VERBOSITY)
    }

    /// Settings from flags and `SNAPSYNC_*` variables, plus whether the
    /// environment already provides a restic credential.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self
                .config
                .clone()
                .or_else(default_config_file)
                .unwrap_or_else(|| PathBuf::from(crate::constants::CONFIG_NAME)),
            profile: self.profile.clone(),
            dry_run: self.dry_run,
            verbosity: self.verbosity(),
            max_logs: self.max_logs,
            remote_repository: self.remote_repository.clone(),
            assume_yes: self.yes,
            inherited_credentials: RESTIC_CREDENTIAL_VARS
                .iter()
                .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_restore_with_globals() {
        let cli = Cli::try_parse_from([
            "snapsync", "-p", "nightly", "restore", "/tmp/out", "abc123", "-d", "-vv", "-y",
        ])
        .unwrap();
        assert_eq!(cli.profile, "nightly");
        assert!(cli.dry_run);
        assert!(cli.yes);
        assert_eq!(cli.verbosity(), 2);
        assert_eq!(
            cli.command,
            Some(Command::Restore {
                path: Some(PathBuf::from("/tmp/out")),
                snapshot: Some("abc123".to_string()),
            })
        );
    }

    #[test]
    fn test_verbosity_is_capped() {
        let cli = Cli::try_parse_from(["snapsync", "-vvvvv", "list"]).unwrap();
        assert_eq!(cli.verbosity(), MAX_VERBOSITY);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["snapsync", "--frobnicate", "backup"]).is_err());
        assert!(Cli::try_parse_from(["snapsync", "archive"]).is_err());
    }

    #[test]
    fn test_no_command_parses_to_none() {
        let cli = Cli::try_parse_from(["snapsync", "-d"]).unwrap();
        assert!(cli.command.is_none());
    }
}
