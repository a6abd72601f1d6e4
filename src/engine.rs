//! External engine invocations.
//!
//! restic and rclone are always run from an argument vector, never through a
//! shell. [`Restic`] and [`Rclone`] build [`Invocation`]s from the effective
//! configuration; [`Runner`] executes them and tees their output into the log
//! session.

use crate::config::{Config, Credential};
use crate::error::{Error, Result};
use crate::logging::SessionSink;
use crate::repository::Repository;
use futures::try_join;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvVar {
    key: &'static str,
    value: OsString,
    secret: bool,
}

/// A fully specified engine call: program, argument vector and extra
/// environment for the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<EnvVar>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: &'static str, value: impl AsRef<OsStr>) -> Self {
        self.env.push(EnvVar {
            key,
            value: value.as_ref().to_os_string(),
            secret: false,
        });
        self
    }

    /// Like [`Invocation::env`], but the value is never displayed.
    pub fn secret_env(mut self, key: &'static str, value: impl AsRef<OsStr>) -> Self {
        self.env.push(EnvVar {
            key,
            value: value.as_ref().to_os_string(),
            secret: true,
        });
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(&self.args);
        for var in &self.env {
            cmd.env(var.key, &var.value);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for var in &self.env {
            if var.secret {
                write!(f, "{}=<redacted> ", var.key)?;
            } else {
                write!(f, "{}={} ", var.key, quote(&var.value))?;
            }
        }
        write!(f, "{}", quote(self.program.as_os_str()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Quotes an argument for display so it can be pasted into a POSIX shell.
fn quote(arg: &OsStr) -> String {
    let s = arg.to_string_lossy();
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        s.into_owned()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Builds restic invocations against the active repository.
pub struct Restic<'a> {
    config: &'a Config,
    repository: &'a Repository,
}

impl<'a> Restic<'a> {
    pub fn new(config: &'a Config, repository: &'a Repository) -> Self {
        Self { config, repository }
    }

    fn base(&self, subcommand: &str) -> Invocation {
        let mut inv = Invocation::new(&self.config.restic_bin)
            .arg("-r")
            .arg(&self.repository.handle)
            .arg(subcommand);
        if self.config.verbosity > 0 {
            inv = inv.arg(format!("--verbose={}", self.config.verbosity));
        }
        match &self.config.credential {
            Credential::Value(password) => inv.secret_env("RESTIC_PASSWORD", password),
            Credential::File(path) => inv.env("RESTIC_PASSWORD_FILE", path),
            Credential::Inherited => inv,
        }
    }

    /// Succeeds only if the repository already exists.
    pub fn probe(&self) -> Invocation {
        self.base("cat").arg("config")
    }

    pub fn init(&self) -> Invocation {
        self.base("init")
    }

    pub fn backup(&self) -> Invocation {
        let mut inv = self
            .base("backup")
            .args(&self.config.sources)
            .arg("--tag")
            .arg(&self.config.profile);
        for pattern in &self.config.exclude {
            inv = inv.arg("--exclude").arg(pattern);
        }
        if let Some(file) = &self.config.exclude_file {
            inv = inv.arg("--exclude-file").arg(file);
        }
        inv
    }

    pub fn restore(&self, snapshot: &str, target: &Path) -> Invocation {
        self.base("restore")
            .arg(snapshot)
            .arg("--target")
            .arg(target)
    }

    pub fn forget(&self, days: u32) -> Invocation {
        self.base("forget")
            .arg("--keep-within")
            .arg(format!("{days}d"))
            .arg("--prune")
    }

    pub fn check(&self) -> Invocation {
        self.base("check")
    }

    pub fn stats(&self, json: bool) -> Invocation {
        let inv = self.base("stats");
        if json { inv.arg("--json") } else { inv }
    }

    pub fn snapshots(&self, json: bool) -> Invocation {
        let inv = self.base("snapshots");
        if json { inv.arg("--json") } else { inv }
    }
}

/// Builds rclone invocations.
pub struct Rclone<'a> {
    config: &'a Config,
}

impl<'a> Rclone<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// `rclone sync source destination`, skipping the given filter patterns.
    pub fn sync(&self, source: &OsStr, destination: &OsStr, excludes: &[String]) -> Invocation {
        let mut inv = Invocation::new(&self.config.rclone_bin)
            .arg("sync")
            .arg(source)
            .arg(destination);
        if let Some(file) = &self.config.rclone_config {
            inv = inv.arg("--config").arg(file);
        }
        for pattern in excludes {
            inv = inv.arg("--exclude").arg(pattern);
        }
        match self.config.verbosity {
            0 => inv,
            1 => inv.arg("--progress").arg("-v"),
            _ => inv.arg("--progress").arg("-vv"),
        }
    }
}

/// Executes invocations. State-changing calls go through
/// [`Runner::execute`], which only displays them under dry-run.
#[derive(Debug, Clone)]
pub struct Runner {
    dry_run: bool,
    sink: SessionSink,
}

impl Runner {
    pub fn new(dry_run: bool, sink: SessionSink) -> Self {
        Self { dry_run, sink }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Locates the invocation's program.
    ///
    /// # Errors
    /// [`Error::MissingTool`] if it is not an executable on `PATH`.
    pub fn ensure_available(&self, program: &Path) -> Result<PathBuf> {
        which::which(program).map_err(|source| Error::MissingTool {
            tool: program.display().to_string(),
            source,
        })
    }

    /// Displays the invocation that a dry run skips.
    pub fn preview(&self, inv: &Invocation) {
        info!("[dry-run] would run: {inv}");
    }

    /// Runs a state-changing invocation, or only previews it under dry-run.
    pub async fn execute(&self, inv: &Invocation) -> Result<()> {
        if self.dry_run {
            self.preview(inv);
            return Ok(());
        }
        self.query(inv).await
    }

    /// Runs a read-only invocation, teeing its output into the session.
    pub async fn query(&self, inv: &Invocation) -> Result<()> {
        let status = self.run_teed(inv).await?;
        check_status(inv, status)
    }

    /// Runs an invocation silently and reports whether it succeeded.
    pub async fn probe(&self, inv: &Invocation) -> Result<bool> {
        let program = self.ensure_available(inv.program())?;
        debug!("Probing: {inv}");
        let status = inv
            .command(&program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| spawn_error(inv, source))?;
        Ok(status.success())
    }

    /// Runs an invocation and returns its standard output. Standard error is
    /// still teed.
    pub async fn capture(&self, inv: &Invocation) -> Result<Vec<u8>> {
        let program = self.ensure_available(inv.program())?;
        debug!("Running: {inv}");
        let mut child = inv
            .command(&program)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| spawn_error(inv, source))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let collect = async {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                out.read_to_end(&mut buf).await?;
            }
            Ok::<_, io::Error>(buf)
        };
        let (status, buf, ()) = try_join!(child.wait(), collect, pump(stderr, &self.sink, true))
            .map_err(|source| spawn_error(inv, source))?;
        check_status(inv, status)?;
        Ok(buf)
    }

    async fn run_teed(&self, inv: &Invocation) -> Result<ExitStatus> {
        let program = self.ensure_available(inv.program())?;
        debug!("Running: {inv}");
        let mut child = inv
            .command(&program)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| spawn_error(inv, source))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, (), ()) = try_join!(
            child.wait(),
            pump(stdout, &self.sink, false),
            pump(stderr, &self.sink, true)
        )
        .map_err(|source| spawn_error(inv, source))?;
        Ok(status)
    }
}

/// Copies child output line by line to the terminal and the session.
async fn pump<R>(reader: Option<R>, sink: &SessionSink, to_stderr: bool) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut lines = BufReader::new(reader).split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        let line = line.strip_suffix(b"\r").unwrap_or(&line);
        if to_stderr {
            let mut err = io::stderr().lock();
            err.write_all(line)?;
            err.write_all(b"\n")?;
        } else {
            let mut out = io::stdout().lock();
            out.write_all(line)?;
            out.write_all(b"\n")?;
        }
        sink.append_line(line)?;
    }
    Ok(())
}

fn check_status(inv: &Invocation, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::Engine {
            invocation: inv.to_string(),
            status: status.to_string(),
        })
    }
}

fn spawn_error(inv: &Invocation, source: io::Error) -> Error {
    Error::Spawn {
        invocation: inv.to_string(),
        source,
    }
}
