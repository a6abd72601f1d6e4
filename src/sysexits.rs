//! Exit statuses used by snapsync.
//! Values follow [SYSEXITS](https://man.freebsd.org/cgi/man.cgi?query=sysexits&sektion=3)
//! where a matching code exists.

/// value: 0 <br>
/// The run finished, including runs where the requested step was disabled or declined.
pub const EX_OK: i32 = 0;

/// value: 2 <br>
/// No command verb was given.
pub const EX_KEYWORD: i32 = 2;

/// value: 65 <br>
/// The repository integrity check failed; the repository may be corrupted.
pub const EX_DATAERR: i32 = 65;

/// value: 66 <br>
/// The base configuration file does not exist.
pub const EX_NOINPUT: i32 = 66;

/// value: 69 <br>
/// A required external engine is not installed or not executable.
pub const EX_UNAVAILABLE: i32 = 69;

/// value: 70 <br>
/// An external engine exited with a failure status or could not be started.
pub const EX_SOFTWARE: i32 = 70;

/// value: 71 <br>
/// The async runtime could not be started.
pub const EX_OSERR: i32 = 71;

/// value: 74 <br>
/// Local I/O failed: lock record, log session, report file or the operator prompt.
pub const EX_IOERR: i32 = 74;

/// value: 75 <br>
/// Another live instance holds the execution lock. Retry once it has finished.
pub const EX_TEMPFAIL: i32 = 75;

/// value: 78 <br>
/// The effective configuration is invalid.
pub const EX_CONFIG: i32 = 78;

/// value: 130 <br>
/// Interrupted by SIGINT or SIGTERM (128 + SIGINT, as shells report it).
pub const EX_INTERRUPTED: i32 = 130;
