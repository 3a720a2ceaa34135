use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use fileforge_common::{
    error::{ForgeError, Result},
    names::split_extension,
    types::{Utility, WorkItemResult},
};
use tokio::fs;
use tracing::{debug, info, warn};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::id::validate_job_id;

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const PARTIAL_SUFFIX: &str = ".partial";
const WORK_DIR_NAME: &str = "work";

#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub name: String,
    pub path: PathBuf,
    pub entries: Vec<String>,
    pub size_bytes: u64,
}

/// Flat output directory: `<root>/<namespace>_<jobId>.zip` plus
/// per-job scratch space under `<root>/work/<jobId>/`.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_name(utility: Utility, job_id: &str) -> String {
        format!("{}_{job_id}.{ARCHIVE_EXTENSION}", utility.namespace())
    }

    pub fn archive_path(&self, utility: Utility, job_id: &str) -> PathBuf {
        self.root.join(Self::archive_name(utility, job_id))
    }

    pub fn work_root(&self) -> PathBuf {
        self.root.join(WORK_DIR_NAME)
    }

    pub fn work_dir(&self, job_id: &str) -> PathBuf {
        self.work_root().join(job_id)
    }

    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(self.work_root()).await?;
        Ok(())
    }

    /// Creates the job's scratch directory. Fails with `JobConflict` if it
    /// already exists, so two jobs never share one.
    pub async fn create_work_dir(&self, job_id: &str) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        fs::create_dir_all(self.work_root()).await?;
        let dir = self.work_dir(job_id);
        match fs::create_dir(&dir).await {
            Ok(()) => Ok(dir),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(ForgeError::JobConflict(job_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn archive_exists(&self, utility: Utility, job_id: &str) -> Result<bool> {
        match self.locate(utility, job_id).await {
            Ok(_) => Ok(true),
            Err(ForgeError::ArchiveNotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn remove_work_dir(&self, job_id: &str) {
        let dir = self.work_dir(job_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(job_id = %job_id, "removed job work dir"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(job_id = %job_id, dir = %dir.display(), error = %err, "failed to remove job work dir");
            }
        }
    }

    /// Packs every successful artifact into the job archive. Failed and skipped
    /// items are left out. Returns once the archive is fully on disk.
    pub async fn assemble(
        &self,
        utility: Utility,
        job_id: &str,
        results: &[WorkItemResult],
    ) -> Result<ArchiveInfo> {
        validate_job_id(job_id)?;
        fs::create_dir_all(&self.root).await?;

        let entries = plan_entries(results);
        let name = Self::archive_name(utility, job_id);
        let path = self.root.join(&name);
        let partial = self.root.join(format!("{name}{PARTIAL_SUFFIX}"));

        if let Err(err) = write_and_publish(&partial, &path, entries.clone()).await {
            discard_partial(job_id, &partial).await;
            return Err(err);
        }

        let size_bytes = fs::metadata(&path).await?.len();
        info!(job_id = %job_id, archive = %name, entries = entries.len(), size_bytes, "archive assembled");
        Ok(ArchiveInfo {
            name,
            path,
            entries: entries.into_iter().map(|(entry, _)| entry).collect(),
            size_bytes,
        })
    }

    /// Archive location for a finished job, or `ArchiveNotFound`.
    pub async fn locate(&self, utility: Utility, job_id: &str) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        let path = self.archive_path(utility, job_id);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(not_found(utility, job_id)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found(utility, job_id)),
            Err(err) => Err(ForgeError::Io(err)),
        }
    }

    pub async fn read(&self, utility: Utility, job_id: &str) -> Result<Vec<u8>> {
        let path = self.locate(utility, job_id).await?;
        Ok(fs::read(path).await?)
    }
}

async fn write_and_publish(
    partial: &Path,
    path: &Path,
    entries: Vec<(String, PathBuf)>,
) -> Result<()> {
    let target = partial.to_path_buf();
    tokio::task::spawn_blocking(move || write_zip(&target, &entries))
        .await
        .map_err(|err| ForgeError::Archive(format!("archive writer task failed: {err}")))??;
    fs::rename(partial, path).await?;
    Ok(())
}

async fn discard_partial(job_id: &str, partial: &Path) {
    match fs::remove_file(partial).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(job_id = %job_id, path = %partial.display(), error = %err, "failed to remove partial archive");
        }
    }
}

fn not_found(utility: Utility, job_id: &str) -> ForgeError {
    ForgeError::ArchiveNotFound {
        utility: utility.namespace().to_string(),
        job_id: job_id.to_string(),
    }
}

/// Deterministic, collision-free entry names in result order.
fn plan_entries(results: &[WorkItemResult]) -> Vec<(String, PathBuf)> {
    let mut used = HashSet::new();
    results
        .iter()
        .filter(|result| result.is_success())
        .filter_map(|result| result.artifact.as_ref())
        .map(|artifact| {
            let entry = unique_entry_name(&mut used, &artifact.file_name);
            (entry, artifact.path.clone())
        })
        .collect()
}

fn unique_entry_name(used: &mut HashSet<String>, file_name: &str) -> String {
    if used.insert(file_name.to_string()) {
        return file_name.to_string();
    }
    let (stem, ext) = split_extension(file_name);
    let mut counter = 2usize;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({counter}).{ext}"),
            None => format!("{stem} ({counter})"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn write_zip(path: &Path, entries: &[(String, PathBuf)]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (entry, source) in entries {
        writer
            .start_file(entry.as_str(), options)
            .map_err(|err| ForgeError::Archive(format!("failed to add {entry}: {err}")))?;
        let mut input = File::open(source).map_err(|err| {
            ForgeError::Archive(format!("artifact {} unreadable: {err}", source.display()))
        })?;
        io::copy(&mut input, &mut writer)?;
    }

    let mut inner = writer
        .finish()
        .map_err(|err| ForgeError::Archive(format!("failed to finalize archive: {err}")))?;
    io::Write::flush(&mut inner)?;
    inner
        .into_inner()
        .map_err(|err| ForgeError::Archive(format!("failed to flush archive: {err}")))?
        .sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use fileforge_common::types::Artifact;

    use super::*;

    async fn artifact(dir: &Path, disk_name: &str, file_name: &str, body: &str) -> Artifact {
        let path = dir.join(disk_name);
        fs::write(&path, body).await.unwrap();
        Artifact {
            path,
            file_name: file_name.to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: body.len() as u64,
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn only_successes_are_packed_without_collisions() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        let work = store.create_work_dir("job-1").await.unwrap();

        let results = vec![
            WorkItemResult::success("a", "ok", Some(artifact(&work, "0-a", "report.txt", "one").await)),
            WorkItemResult::failed("b", "boom"),
            WorkItemResult::success("c", "ok", Some(artifact(&work, "2-c", "report.txt", "two").await)),
            WorkItemResult::skipped("d", "empty"),
            WorkItemResult::success("e", "ok", Some(artifact(&work, "4-e", "report.txt", "three").await)),
        ];

        let info = store.assemble(Utility::Qr, "job-1", &results).await.unwrap();
        assert_eq!(info.name, "qr-bulk_job-1.zip");
        assert_eq!(
            entry_names(&info.path),
            vec!["report.txt", "report (2).txt", "report (3).txt"]
        );
        assert!(!temp.path().join("qr-bulk_job-1.zip.partial").exists());
    }

    #[tokio::test]
    async fn zero_successes_still_produce_an_archive() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        let results = vec![WorkItemResult::failed("a", "boom")];

        let info = store.assemble(Utility::Password, "empty", &results).await.unwrap();
        assert!(info.entries.is_empty());
        assert!(entry_names(&info.path).is_empty());
        assert_eq!(store.locate(Utility::Password, "empty").await.unwrap(), info.path);
    }

    #[tokio::test]
    async fn missing_artifact_fails_assembly() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        let ghost = Artifact {
            path: temp.path().join("does-not-exist"),
            file_name: "ghost.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 0,
        };
        let results = vec![WorkItemResult::success("a", "ok", Some(ghost))];

        let err = store.assemble(Utility::Fetch, "job", &results).await.unwrap_err();
        assert!(matches!(err, ForgeError::Archive(_)));
        assert!(matches!(
            store.locate(Utility::Fetch, "job").await,
            Err(ForgeError::ArchiveNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        let work = store.create_work_dir("job").await.unwrap();
        let results = vec![WorkItemResult::success(
            "a",
            "ok",
            Some(artifact(&work, "0-a", "a.txt", "hello").await),
        )];
        store.assemble(Utility::Resize, "job", &results).await.unwrap();

        let first = store.read(Utility::Resize, "job").await.unwrap();
        let second = store.read(Utility::Resize, "job").await.unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn work_dir_cannot_be_claimed_twice() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        store.create_work_dir("job").await.unwrap();
        assert!(matches!(
            store.create_work_dir("job").await,
            Err(ForgeError::JobConflict(_))
        ));
        assert!(!store.archive_exists(Utility::Qr, "job").await.unwrap());
    }

    #[tokio::test]
    async fn failed_publish_leaves_no_partial_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        // a directory in the way makes the final rename fail
        std::fs::create_dir_all(temp.path().join("qr-bulk_blocked.zip").join("occupied")).unwrap();

        let err = store.assemble(Utility::Qr, "blocked", &[]).await.unwrap_err();
        assert!(matches!(err, ForgeError::Io(_)));
        assert!(!temp.path().join("qr-bulk_blocked.zip.partial").exists());
    }

    #[tokio::test]
    async fn locate_rejects_traversal() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(temp.path());
        assert!(matches!(
            store.locate(Utility::Qr, "../secret").await,
            Err(ForgeError::InvalidArgument(_))
        ));
    }
}
