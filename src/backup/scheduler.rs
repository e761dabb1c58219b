//! Backup Scheduling and Restore
//!
//! The persistence side of the store: a synchronous restore performed
//! during construction, and a periodic Tokio task that snapshots the live
//! contents to disk for as long as the store exists.
//!
//! ## Design Decisions
//!
//! 1. **Restore before anything else** - the restore runs synchronously in
//!    the constructor. By the time the caller holds the store, every
//!    surviving record is installed, and the backup loop cannot race the
//!    restore and clobber the file with an empty snapshot.
//!
//! 2. **All-or-nothing restore** - the snapshot is decoded in full before
//!    any record is installed. A corrupt tail leaves the store empty
//!    rather than half-filled, and the decode error travels through the
//!    report sink.
//!
//! 3. **Fuzzy snapshots** - a backup walks the store without freezing it.
//!    Writes racing the walk may or may not be captured; they are durable
//!    by the next cycle at the latest. In exchange, gets and sets never
//!    stall behind file i/o.
//!
//! 4. **The folder is revalidated every cycle** - the backup directory can
//!    vanish underneath a long-lived store. Each cycle checks it again and
//!    reports a failure instead of tearing anything down.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backup::report::{BackupError, BackupProcess, BackupReport, ReportSink};
use crate::snapshot::codec::{self, SnapshotRecord};
use crate::store::engine::{Store, StoreInner};
use crate::store::kinds::{StoreKey, StoreValue};

/// Configuration for the backup side of a store.
///
/// # Example
///
/// ```
/// use emberkv::BackupConfig;
/// use std::path::PathBuf;
/// use std::time::Duration;
/// use tokio::sync::mpsc;
///
/// let (report_tx, _report_rx) = mpsc::unbounded_channel();
/// let config = BackupConfig::new(
///     "/var/lib/emberkv",
///     "store.ekv",
///     Duration::from_secs(60),
///     report_tx,
/// );
/// assert_eq!(config.file_path(), PathBuf::from("/var/lib/emberkv/store.ekv"));
/// ```
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Directory holding the backup file; must already exist
    pub folder: PathBuf,
    /// Name of the backup file inside `folder`
    pub file_name: String,
    /// How often the backup loop writes a snapshot
    pub interval: Duration,
    /// Channel through which cycle outcomes are delivered
    pub report_sink: ReportSink,
}

impl BackupConfig {
    pub fn new(
        folder: impl Into<PathBuf>,
        file_name: impl Into<String>,
        interval: Duration,
        report_sink: ReportSink,
    ) -> Self {
        Self {
            folder: folder.into(),
            file_name: file_name.into(),
            interval,
            report_sink,
        }
    }

    /// Full path of the backup file.
    pub fn file_path(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }

    /// Checks the folder and returns the backup file path.
    pub(crate) fn validated_path(&self) -> Result<PathBuf, BackupError> {
        let meta = std::fs::metadata(&self.folder)?;
        if !meta.is_dir() {
            return Err(BackupError::NotADirectory(self.folder.clone()));
        }
        Ok(self.file_path())
    }

    /// Delivers a report, ignoring a dropped receiver.
    pub(crate) fn report(&self, report: BackupReport) {
        let _ = self.report_sink.send(report);
    }
}

/// Restores a store from its backup file and reports the outcome.
///
/// Runs synchronously inside store construction. A missing file is
/// created empty and reported as [`BackupStatus::Empty`]; any failure
/// leaves the store untouched.
///
/// [`BackupStatus::Empty`]: crate::backup::report::BackupStatus::Empty
pub(crate) fn restore_store<K: StoreKey, V: StoreValue>(
    store: &Store<K, V>,
    config: &BackupConfig,
) {
    let report = match read_snapshot::<K, V>(config) {
        Ok(None) => {
            info!(
                file = %config.file_path().display(),
                "No backup content, starting empty"
            );
            BackupReport::empty(BackupProcess::Restore)
        }
        Ok(Some(records)) => {
            let installed = store.apply_snapshot(records);
            info!(
                file = %config.file_path().display(),
                entries = installed,
                "Backup restored"
            );
            BackupReport::success(BackupProcess::Restore)
        }
        Err(error) => {
            warn!(error = %error, "Backup restore failed");
            BackupReport::failed(BackupProcess::Restore, error)
        }
    };
    config.report(report);
}

/// Reads and decodes the backup file.
///
/// `Ok(None)` means there was nothing to restore: the file was missing
/// (it is created so the first backup cycle has somewhere to write) or
/// had no content.
fn read_snapshot<K: StoreKey, V: StoreValue>(
    config: &BackupConfig,
) -> Result<Option<Vec<SnapshotRecord<K, V>>>, BackupError> {
    let path = config.validated_path()?;

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            std::fs::File::create(&path)?;
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };
    if bytes.is_empty() {
        return Ok(None);
    }

    let records = codec::decode::<K, V>(&bytes)?;
    Ok(Some(records))
}

/// Background task that snapshots the store on a fixed interval.
///
/// Every cycle's outcome goes through the report sink. Runs until the
/// shutdown signal arrives.
pub(crate) async fn backup_loop<K: StoreKey, V: StoreValue>(
    inner: Arc<StoreInner<K, V>>,
    config: BackupConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(
        file = %config.file_path().display(),
        interval_ms = config.interval.as_millis(),
        "Backup loop started"
    );
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Backup loop received shutdown signal");
                    return;
                }
            }
        }

        let report = run_backup(&inner, &config).await;
        config.report(report);
    }
}

/// Runs one backup cycle and returns its report.
pub(crate) async fn run_backup<K: StoreKey, V: StoreValue>(
    inner: &StoreInner<K, V>,
    config: &BackupConfig,
) -> BackupReport {
    match write_snapshot(inner, config).await {
        Ok(written) => {
            debug!(entries = written, "Backup written");
            BackupReport::success(BackupProcess::Backup)
        }
        Err(error) => {
            warn!(error = %error, "Backup failed");
            BackupReport::failed(BackupProcess::Backup, error)
        }
    }
}

async fn write_snapshot<K: StoreKey, V: StoreValue>(
    inner: &StoreInner<K, V>,
    config: &BackupConfig,
) -> Result<usize, BackupError> {
    let path = config.validated_path()?;
    let records = inner.collect_records();
    let encoded = codec::encode(&records);
    tokio::fs::write(&path, &encoded).await?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::report::BackupStatus;
    use crate::store::engine::StoreConfig;
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;

    fn report_channel() -> (ReportSink, mpsc::UnboundedReceiver<BackupReport>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_file_path_joins() {
        let (tx, _rx) = report_channel();
        let config = BackupConfig::new("/data", "kv.snapshot", Duration::from_secs(1), tx);
        assert_eq!(config.file_path(), PathBuf::from("/data/kv.snapshot"));
    }

    #[tokio::test]
    async fn test_restore_missing_file_reports_empty_and_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);

        let store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.process, BackupProcess::Restore);
        assert!(report.status.is_empty());
        assert!(store.is_empty());
        assert!(dir.path().join("store.ekv").exists());
    }

    #[tokio::test]
    async fn test_restore_empty_file_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("store.ekv"), b"").unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);

        let store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        assert!(rx.recv().await.unwrap().status.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_restore_missing_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(
            dir.path().join("absent"),
            "store.ekv",
            Duration::from_secs(3600),
            tx,
        );

        let store: Store<String, i64> = Store::with_backup(StoreConfig::default(), config);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.process, BackupProcess::Restore);
        assert!(matches!(report.status, BackupStatus::Failed(BackupError::Io(_))));

        // The store still works, it just starts empty
        store.set("k".to_string(), 1);
        assert_eq!(store.get(&"k".to_string()), Some(1));
    }

    #[tokio::test]
    async fn test_restore_into_non_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plainfile");
        std::fs::write(&not_a_dir, b"x").unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(&not_a_dir, "store.ekv", Duration::from_secs(3600), tx);

        let _store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        let report = rx.recv().await.unwrap();
        assert!(matches!(
            report.status,
            BackupStatus::Failed(BackupError::NotADirectory(ref path)) if *path == not_a_dir
        ));
    }

    #[tokio::test]
    async fn test_restore_installs_records_with_absolute_deadlines() {
        let dir = tempfile::tempdir().unwrap();
        let deadline = Utc.with_ymd_and_hms(2030, 1, 15, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(500);
        let records = vec![
            SnapshotRecord::permanent(1i64, 50i64),
            SnapshotRecord::timed(3i64, 70i64, deadline),
        ];
        std::fs::write(dir.path().join("store.ekv"), codec::encode(&records)).unwrap();

        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);
        let store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.process, BackupProcess::Restore);
        assert!(report.status.is_success());

        assert_eq!(store.get(&1), Some(50));
        assert_eq!(store.get(&3), Some(70));
        assert_eq!(store.expires_at(&1), None);
        // The deadline survives the file format exactly
        assert_eq!(store.expires_at(&3), Some(deadline));
    }

    #[tokio::test]
    async fn test_restore_drops_records_already_expired() {
        let dir = tempfile::tempdir().unwrap();
        let past = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let records = vec![
            SnapshotRecord::timed("gone".to_string(), 1i64, past),
            SnapshotRecord::permanent("kept".to_string(), 2i64),
        ];
        std::fs::write(dir.path().join("store.ekv"), codec::encode(&records)).unwrap();

        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);
        let store: Store<String, i64> = Store::with_backup(StoreConfig::default(), config);

        assert!(rx.recv().await.unwrap().status.is_success());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"gone".to_string()), None);
        assert_eq!(store.get(&"kept".to_string()), Some(2));
    }

    #[tokio::test]
    async fn test_restore_kind_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("store.ekv"), b"string string\n?a&b&!").unwrap();

        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);
        let store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        let report = rx.recv().await.unwrap();
        assert!(matches!(
            report.status,
            BackupStatus::Failed(BackupError::Snapshot(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_restore_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // Second record is corrupt, so not even the first may be installed
        std::fs::write(dir.path().join("store.ekv"), b"int int\n?1&11&?2&oops&!").unwrap();

        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);
        let store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        assert!(matches!(
            rx.recv().await.unwrap().status,
            BackupStatus::Failed(BackupError::Snapshot(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_periodic_backup_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_millis(40), tx);
        let store: Store<String, String> = Store::with_backup(StoreConfig::default(), config);

        store.set("alpha".to_string(), "one".to_string());
        store.set("beta".to_string(), "two two".to_string());

        assert!(rx.recv().await.unwrap().status.is_empty()); // restore
        for _ in 0..2 {
            let report = rx.recv().await.unwrap();
            assert_eq!(report.process, BackupProcess::Backup);
            assert!(report.status.is_success());
        }

        store.shutdown();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let bytes = std::fs::read(dir.path().join("store.ekv")).unwrap();
        let mut records = codec::decode::<String, String>(&bytes).unwrap();
        records.sort_by(|a, b| a.key.cmp(&b.key));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], SnapshotRecord::permanent("alpha".to_string(), "one".to_string()));
        assert_eq!(
            records[1],
            SnapshotRecord::permanent("beta".to_string(), "two two".to_string())
        );
    }

    #[tokio::test]
    async fn test_backup_roundtrip_between_stores() {
        let dir = tempfile::tempdir().unwrap();

        {
            let (tx, _rx) = report_channel();
            let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_millis(50), tx);
            let store: Store<String, i64> = Store::with_backup(StoreConfig::default(), config);

            store.set("keep".to_string(), 10);
            store
                .set_with_expiry("fade".to_string(), 20, Duration::from_millis(600))
                .unwrap();

            tokio::time::sleep(Duration::from_millis(130)).await;
            store.shutdown();
        }

        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);
        let store: Store<String, i64> = Store::with_backup(
            StoreConfig::new().with_sweep_interval(Duration::from_millis(25)),
            config,
        );

        let report = rx.recv().await.unwrap();
        assert_eq!(report.process, BackupProcess::Restore);
        assert!(report.status.is_success());

        // Both entries restored; the timed one still has life left
        assert_eq!(store.get(&"keep".to_string()), Some(10));
        assert_eq!(store.get(&"fade".to_string()), Some(20));

        // The restored deadline is absolute, so it still fires here
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(store.get(&"fade".to_string()), None);
        assert_eq!(store.get(&"keep".to_string()), Some(10));
    }

    #[tokio::test]
    async fn test_backup_now_returns_report_directly() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_secs(3600), tx);
        let store: Store<String, i64> = Store::with_backup(StoreConfig::default(), config);

        store.set("now".to_string(), 1);

        let report = store.backup_now().await.unwrap();
        assert_eq!(report.process, BackupProcess::Backup);
        assert!(report.status.is_success());

        let bytes = std::fs::read(dir.path().join("store.ekv")).unwrap();
        let records = codec::decode::<String, i64>(&bytes).unwrap();
        assert_eq!(records, vec![SnapshotRecord::permanent("now".to_string(), 1)]);

        // Only the restore report went through the sink
        assert!(rx.recv().await.unwrap().status.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_backup_now_without_backup_config() {
        let store: Store<String, i64> = Store::new(StoreConfig::default());
        assert!(store.backup_now().await.is_none());
    }

    #[tokio::test]
    async fn test_backup_reports_failure_when_folder_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_millis(40), tx);
        let _store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        assert!(rx.recv().await.unwrap().status.is_empty()); // restore

        std::fs::remove_dir_all(dir.path()).unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.process, BackupProcess::Backup);
        assert!(matches!(report.status, BackupStatus::Failed(BackupError::Io(_))));
    }

    #[tokio::test]
    async fn test_shutdown_stops_backup_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = report_channel();
        let config = BackupConfig::new(dir.path(), "store.ekv", Duration::from_millis(40), tx);
        let store: Store<i64, i64> = Store::with_backup(StoreConfig::default(), config);

        assert!(rx.recv().await.unwrap().status.is_empty()); // restore
        assert!(rx.recv().await.unwrap().status.is_success()); // at least one cycle

        store.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(160)).await;
        assert!(rx.try_recv().is_err());
    }
}
