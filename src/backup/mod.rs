//! Backup Module
//!
//! Periodic persistence for a store. A backup-enabled store restores its
//! contents from the snapshot file while it is being constructed, then
//! rewrites that file from the live contents on a fixed interval until it
//! is shut down.
//!
//! Both halves run off the caller's critical path, so their outcomes are
//! delivered asynchronously: every restore and every backup cycle pushes
//! one [`BackupReport`] into the configured [`ReportSink`].
//!
//! ## Components
//!
//! - [`scheduler`]: the restore step and the periodic backup task
//! - [`report`]: cycle outcomes and the errors they can carry

pub mod report;
pub mod scheduler;

// Re-export commonly used types
pub use report::{BackupError, BackupProcess, BackupReport, BackupStatus, ReportSink};
pub use scheduler::BackupConfig;
