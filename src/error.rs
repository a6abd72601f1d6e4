//! Error taxonomy for snapsync.
//!
//! Every routine returns [`Result`]; only the binary maps an [`Error`] to a
//! process exit status through [`Error::exit_code`].

use crate::sysexits;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Unified result type for all fallible operations in snapsync.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The base configuration file does not exist.
    #[error("Configuration file not found: {}. Run 'snapsync template' to generate one.", .0.display())]
    MissingConfig(PathBuf),

    /// The effective configuration failed validation.
    #[error("Invalid configuration:\n{}", format_violations(.0))]
    Config(Vec<String>),

    /// A configuration or profile file is not valid TOML.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A required external engine cannot be found.
    #[error("Required tool '{tool}' is not installed or not executable: {source}")]
    MissingTool {
        tool: String,
        #[source]
        source: which::Error,
    },

    /// Another live instance holds the execution lock.
    #[error("Another snapsync instance is running (pid {pid}, lock {})", path.display())]
    Locked { pid: u32, path: PathBuf },

    /// An external engine exited with a failure status.
    #[error("Command failed ({status}): {invocation}")]
    Engine { invocation: String, status: String },

    /// An external engine could not be started.
    #[error("Failed to start `{invocation}`: {source}")]
    Spawn {
        invocation: String,
        #[source]
        source: io::Error,
    },

    /// The repository integrity check reported a failure.
    #[error(
        "Integrity check failed for repository {repository}: possible repository corruption. \
         Inspect the repository before running further backups. Command: {invocation}"
    )]
    Integrity {
        repository: String,
        invocation: String,
    },

    /// The interactive confirmation could not be completed.
    #[error("Operator prompt failed: {0}")]
    Prompt(String),

    /// The run was stopped by a signal or by Ctrl-C at a prompt.
    #[error("Interrupted by {0}, releasing the lock")]
    Interrupted(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Failed to build report: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds a configuration error carrying a single violation.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(vec![message.into()])
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingConfig(_) => sysexits::EX_NOINPUT,
            Error::Config(_) | Error::Parse { .. } => sysexits::EX_CONFIG,
            Error::MissingTool { .. } => sysexits::EX_UNAVAILABLE,
            Error::Locked { .. } => sysexits::EX_TEMPFAIL,
            Error::Engine { .. } | Error::Spawn { .. } | Error::Json(_) => sysexits::EX_SOFTWARE,
            Error::Integrity { .. } => sysexits::EX_DATAERR,
            Error::Prompt(_) | Error::Io(_) => sysexits::EX_IOERR,
            Error::Interrupted(_) => sysexits::EX_INTERRUPTED,
        }
    }
}

fn format_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_every_violation() {
        let err = Error::Config(vec![
            "source '/a' does not exist".to_string(),
            "source '/b' does not exist".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("/a"));
        assert!(msg.contains("/b"));
        assert_eq!(err.exit_code(), sysexits::EX_CONFIG);
    }

    #[test]
    fn test_integrity_is_distinct_from_engine_failure() {
        let integrity = Error::Integrity {
            repository: "/r".to_string(),
            invocation: "restic -r /r check".to_string(),
        };
        let engine = Error::Engine {
            invocation: "restic -r /r check".to_string(),
            status: "exit status: 1".to_string(),
        };
        assert!(integrity.to_string().contains("possible repository corruption"));
        assert!(!engine.to_string().contains("corruption"));
        assert_ne!(integrity.exit_code(), engine.exit_code());
    }

    #[test]
    fn test_interrupted_exit_code() {
        let err = Error::Interrupted("SIGTERM");
        assert_eq!(err.exit_code(), sysexits::EX_INTERRUPTED);
        assert!(err.to_string().contains("SIGTERM"));
    }

    #[test]
    fn test_locked_exit_code() {
        let err = Error::Locked {
            pid: 42,
            path: PathBuf::from("/tmp/locks/snapsync.lock"),
        };
        assert_eq!(err.exit_code(), sysexits::EX_TEMPFAIL);
        assert!(err.to_string().contains("pid 42"));
    }
}
