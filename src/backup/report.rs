//! Backup Outcome Reports
//!
//! Backups and restores run in the background, so their outcomes reach the
//! owner through a channel instead of a return value. Every cycle emits
//! one [`BackupReport`] naming the process, how it went, and the error
//! when it failed.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::snapshot::codec::SnapshotError;

/// Errors that abort a single backup or restore cycle.
///
/// A failed cycle never takes the store down; the error travels through
/// the report sink and the next cycle runs on schedule.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The configured backup location exists but is not a directory
    #[error("backup path {0:?} is not a directory")]
    NotADirectory(PathBuf),

    /// Reading or writing the backup file failed
    #[error("backup file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backup file contents failed to decode
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Which background process produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupProcess {
    /// Periodic snapshot write
    Backup,
    /// Restore at store construction
    Restore,
}

impl BackupProcess {
    /// Stable token identifying the process.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupProcess::Backup => "backup",
            BackupProcess::Restore => "restoreBackup",
        }
    }
}

impl fmt::Display for BackupProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one backup or restore cycle ended.
#[derive(Debug)]
pub enum BackupStatus {
    /// The cycle completed
    Success,
    /// There was nothing to do: no backup file existed or it had no content
    Empty,
    /// The cycle was aborted
    Failed(BackupError),
}

impl BackupStatus {
    /// Stable token identifying the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Success => "success",
            BackupStatus::Empty => "empty",
            BackupStatus::Failed(_) => "fail",
        }
    }

    /// Returns `true` for [`BackupStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, BackupStatus::Success)
    }

    /// Returns `true` for [`BackupStatus::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, BackupStatus::Empty)
    }

    /// The error that aborted the cycle, if it failed.
    pub fn error(&self) -> Option<&BackupError> {
        match self {
            BackupStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one backup or restore cycle.
#[derive(Debug)]
pub struct BackupReport {
    pub process: BackupProcess,
    pub status: BackupStatus,
}

impl BackupReport {
    /// Creates a success report.
    pub fn success(process: BackupProcess) -> Self {
        Self {
            process,
            status: BackupStatus::Success,
        }
    }

    /// Creates an empty-outcome report.
    pub fn empty(process: BackupProcess) -> Self {
        Self {
            process,
            status: BackupStatus::Empty,
        }
    }

    /// Creates a failure report carrying the error that aborted the cycle.
    pub fn failed(process: BackupProcess, error: BackupError) -> Self {
        Self {
            process,
            status: BackupStatus::Failed(error),
        }
    }
}

impl fmt::Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            BackupStatus::Failed(error) => {
                write!(f, "{}: {} ({})", self.process, self.status, error)
            }
            _ => write!(f, "{}: {}", self.process, self.status),
        }
    }
}

/// Sending half of the report channel.
///
/// Sending through the unbounded channel never blocks a backup cycle; a
/// receiver that stops draining costs memory, not correctness.
pub type ReportSink = mpsc::UnboundedSender<BackupReport>;
