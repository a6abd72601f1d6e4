//! snapsync: backup orchestration around restic and rclone.
//!
//! This crate sequences the two external engines: configuration layering,
//! repository mode selection, a single-instance lock, rotated log sessions and
//! the backup, retention and verification chain. Backup storage and transfer
//! are left entirely to the engines.

pub mod cli;
pub mod config;
pub(crate) mod constants;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lock;
pub mod logging;
pub(crate) mod path_util;
pub mod repository;
pub mod routines;
pub mod sysexits;
pub mod template;

pub use error::{Error, Result};
