use std::{io, path::Path, time::Duration};

use chrono::{DateTime, Utc};
use fileforge_common::error::Result;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::archive::{ARCHIVE_EXTENSION, ArchiveStore, PARTIAL_SUFFIX};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub archives_removed: usize,
    pub work_dirs_removed: usize,
}

/// Removes output older than the retention window, regardless of job state.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    store: ArchiveStore,
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(store: ArchiveStore, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn run_loop(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(report) if report != SweepReport::default() => {
                    info!(
                        archives_removed = report.archives_removed,
                        work_dirs_removed = report.work_dirs_removed,
                        "retention sweep removed expired output"
                    );
                }
                Ok(_) => debug!("retention sweep found nothing to remove"),
                Err(err) => warn!(error = %err, "retention sweep failed"),
            }
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        self.sweep_before(Utc::now() - retention).await
    }

    /// Removes archives and work dirs last modified at or before `cutoff`.
    pub async fn sweep_before(&self, cutoff: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for path in list_entries(self.store.root()).await? {
            if !is_archive_file(&path) || !modified_before(&path, cutoff).await {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => report.archives_removed += 1,
                Err(err) => warn!(path = %path.display(), error = %err, "failed to remove expired archive"),
            }
        }

        for path in list_entries(&self.store.work_root()).await? {
            if !path.is_dir() || !modified_before(&path, cutoff).await {
                continue;
            }
            match fs::remove_dir_all(&path).await {
                Ok(()) => report.work_dirs_removed += 1,
                Err(err) => warn!(path = %path.display(), error = %err, "failed to remove stale work dir"),
            }
        }

        Ok(report)
    }
}

async fn list_entries(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        entries.push(entry.path());
    }
    Ok(entries)
}

fn is_archive_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let name = name.strip_suffix(PARTIAL_SUFFIX).unwrap_or(name);
    path.is_file() && name.ends_with(&format!(".{ARCHIVE_EXTENSION}"))
}

async fn modified_before(path: &Path, cutoff: DateTime<Utc>) -> bool {
    match fs::metadata(path).await.and_then(|metadata| metadata.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified) <= cutoff,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read modification time");
            false
        }
    }
}
