//! Diagnostics and log sessions.
//!
//! All diagnostics go through `tracing`. The subscriber installed by [`init`]
//! writes to the terminal and, once a [`LogSession`] is attached, to a
//! timestamped file under `<root>/logs/`. Engine output is appended to the
//! same file through [`SessionSink`].

use crate::error::Result;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use walkdir::WalkDir;

const LOG_EXTENSION: &str = "log";

/// Shared handle to the active session file. Writes are dropped while no
/// session is attached.
#[derive(Clone, Default)]
pub struct SessionSink {
    file: Arc<Mutex<Option<File>>>,
}

impl SessionSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<File>> {
        // A panic while holding the lock leaves the file usable.
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn attach(&self, file: File) {
        *self.slot() = Some(file);
    }

    fn detach(&self) {
        if let Some(mut file) = self.slot().take() {
            let _ = file.flush();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    /// Appends one line of engine output to the session.
    pub fn append_line(&self, line: &[u8]) -> io::Result<()> {
        if let Some(file) = self.slot().as_mut() {
            file.write_all(line)?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Write for SessionSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.slot().as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.slot().as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Installs the global subscriber: terminal output on stderr plus the
/// session file layer. Verbosity 0 is `info`, 1 `debug`, 2 and above `trace`.
pub fn init(verbosity: u8, sink: &SessionSink) {
    let filter = match verbosity {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let sink = sink.clone();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(move || sink.clone()),
        )
        .try_init();
}

/// One invocation's log file. Detaches from the sink when dropped.
#[derive(Debug)]
pub struct LogSession {
    path: PathBuf,
    sink: SessionSink,
}

impl std::fmt::Debug for SessionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl LogSession {
    /// Prunes `log_dir` down to `max_logs` files, then opens a new session
    /// file and attaches it to `sink`. Pruning runs first so the new file is
    /// never counted against the limit.
    pub fn start(log_dir: &Path, max_logs: usize, sink: &SessionSink) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let removed = prune(log_dir, max_logs)?;
        let (path, file) = create_session_file(log_dir)?;
        sink.attach(file);
        info!("Logging to {}", path.display());
        for old in removed {
            debug!("Removed old log {}", old.display());
        }
        Ok(Self {
            path,
            sink: sink.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sink(&self) -> &SessionSink {
        &self.sink
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        self.sink.detach();
    }
}

/// Deletes the oldest `*.log` files in `log_dir` until at most `max_logs`
/// remain. Returns the removed paths, oldest first.
pub fn prune(log_dir: &Path, max_logs: usize) -> Result<Vec<PathBuf>> {
    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in WalkDir::new(log_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION)
        {
            continue;
        }
        let modified = entry
            .metadata()
            .map_err(io::Error::from)?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((modified, path.to_path_buf()));
    }
    if logs.len() <= max_logs {
        return Ok(vec![]);
    }

    logs.sort();
    let excess = logs.len() - max_logs;
    let mut removed = Vec::with_capacity(excess);
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path)?;
        removed.push(path);
    }
    Ok(removed)
}

fn create_session_file(log_dir: &Path) -> Result<(PathBuf, File)> {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S-%3f").to_string();
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{stamp}.{LOG_EXTENSION}")
        } else {
            format!("{stamp}_{suffix}.{LOG_EXTENSION}")
        };
        let path = log_dir.join(name);
        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Creates `count` logs whose modification times increase with the index.
    fn seed_logs(dir: &Path, count: u64) -> Vec<PathBuf> {
        let base = SystemTime::now() - Duration::from_secs(10_000);
        (0..count)
            .map(|i| {
                let path = dir.join(format!("old-{i:02}.log"));
                let file = File::create(&path).unwrap();
                file.set_modified(base + Duration::from_secs(i * 60)).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_prune_keeps_most_recent() {
        let dir = tempdir().unwrap();
        let logs = seed_logs(dir.path(), 7);
        fs::write(dir.path().join("notes.txt"), "not a log").unwrap();

        let removed = prune(dir.path(), 3).unwrap();
        assert_eq!(removed, logs[..4].to_vec());
        for kept in &logs[4..] {
            assert!(kept.exists());
        }
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_prune_under_limit_is_noop() {
        let dir = tempdir().unwrap();
        seed_logs(dir.path(), 2);
        assert!(prune(dir.path(), 2).unwrap().is_empty());
        assert!(prune(dir.path(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_prune_to_zero() {
        let dir = tempdir().unwrap();
        seed_logs(dir.path(), 3);
        assert_eq!(prune(dir.path(), 0).unwrap().len(), 3);
    }

    #[test]
    fn test_session_is_not_counted_against_its_limit() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        seed_logs(&logs, 5);

        let sink = SessionSink::new();
        let session = LogSession::start(&logs, 2, &sink).unwrap();
        assert!(session.path().exists());
        assert!(sink.is_attached());

        let count = fs::read_dir(&logs).unwrap().count();
        assert_eq!(count, 3);
        drop(session);
        assert!(!sink.is_attached());
    }

    #[test]
    fn test_sink_appends_to_session() {
        let dir = tempdir().unwrap();
        let sink = SessionSink::new();
        sink.append_line(b"dropped").unwrap();

        let session = LogSession::start(dir.path(), 10, &sink).unwrap();
        sink.append_line(b"snapshot 1a2b3c saved").unwrap();
        let path = session.path().to_path_buf();
        drop(session);

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("snapshot 1a2b3c saved"));
        assert!(!content.contains("dropped"));
    }

    #[test]
    fn test_session_names_do_not_collide() {
        let dir = tempdir().unwrap();
        let (a, _) = create_session_file(dir.path()).unwrap();
        let (b, _) = create_session_file(dir.path()).unwrap();
        assert_ne!(a, b);
    }
}
