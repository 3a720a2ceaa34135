use std::path::PathBuf;

use async_trait::async_trait;
use fileforge_common::{
    error::Result,
    names::sanitize_file_name,
    types::{Artifact, Utility},
};

/// Where one work item runs and may write its artifact.
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub job_id: String,
    pub index: usize,
    pub work_dir: PathBuf,
}

impl WorkContext {
    pub fn new(job_id: impl Into<String>, index: usize, work_dir: PathBuf) -> Self {
        Self {
            job_id: job_id.into(),
            index,
            work_dir,
        }
    }

    /// Writes `bytes` as this item's artifact. The on-disk name is prefixed with
    /// the item index so siblings never overwrite each other.
    pub async fn write_artifact(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<Artifact> {
        let file_name = sanitize_file_name(file_name);
        let path = self
            .work_dir
            .join(format!("{:05}-{file_name}", self.index));
        tokio::fs::write(&path, bytes).await?;
        Ok(Artifact {
            path,
            file_name,
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkOutput {
    pub message: String,
    pub artifact: Option<Artifact>,
}

impl WorkOutput {
    pub fn with_artifact(message: impl Into<String>, artifact: Artifact) -> Self {
        Self {
            message: message.into(),
            artifact: Some(artifact),
        }
    }
}

/// A pluggable per-item transformation.
///
/// `run` bounds its own I/O (timeouts) and cleans up its own side effects on
/// failure. Returning `Err` or panicking marks only this item as failed.
#[async_trait]
pub trait WorkFunction: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Config: Send + Sync + 'static;

    fn utility(&self) -> Utility;

    /// Rejects the whole batch before any item runs.
    fn validate_config(&self, config: &Self::Config) -> Result<()>;

    fn identity(&self, index: usize, input: &Self::Input) -> String;

    /// Structural problems known before doing any work. `Err(reason)` skips the item.
    fn precheck(&self, _input: &Self::Input) -> std::result::Result<(), String> {
        Ok(())
    }

    async fn run(
        &self,
        ctx: &WorkContext,
        input: &Self::Input,
        config: &Self::Config,
    ) -> Result<WorkOutput>;
}
