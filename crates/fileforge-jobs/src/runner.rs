use std::{
    collections::HashSet,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
};

use fileforge_common::{
    error::{ForgeError, Result},
    types::{ItemStatus, Utility, WorkItemResult},
};
use fileforge_notify::{CompletePayload, JobEmitter, ProgressSink};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    aggregator::ResultSummary,
    archive::{ArchiveInfo, ArchiveStore},
    executor::execute_item,
    id::{JobIdAllocator, validate_job_id},
    job::Job,
    scheduler::{BoundedScheduler, SchedulePolicy},
    work::{WorkContext, WorkFunction},
};

pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_DOWNLOAD_PREFIX: &str = "/api";

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub max_concurrent: usize,
    pub policy: SchedulePolicy,
    /// Prefix of the download route advertised in `complete` events.
    pub download_prefix: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            policy: SchedulePolicy::default(),
            download_prefix: DEFAULT_DOWNLOAD_PREFIX.to_string(),
        }
    }
}

impl RunnerSettings {
    pub fn validate(&self) -> Result<BoundedScheduler> {
        BoundedScheduler::new(self.max_concurrent, self.policy)
    }
}

/// Returned by a successful submit, before any item has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    pub job_id: String,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub job_id: String,
    pub archive: ArchiveInfo,
    pub results: Vec<WorkItemResult>,
    pub summary: ResultSummary,
}

#[derive(Debug, Clone)]
pub struct SingleOutcome {
    pub result: WorkItemResult,
    pub content: Vec<u8>,
}

struct PreparedJob<W: WorkFunction> {
    job: Job,
    work: Arc<W>,
    inputs: Vec<W::Input>,
    config: Arc<W::Config>,
    work_dir: std::path::PathBuf,
}

/// Holds a job id for the lifetime of its run; released on drop.
struct JobClaim {
    active: Arc<Mutex<HashSet<String>>>,
    job_id: String,
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.job_id);
        }
    }
}

/// Submits batches and drives them to a terminal event.
#[derive(Clone)]
pub struct BatchRunner {
    sink: Arc<dyn ProgressSink>,
    archives: ArchiveStore,
    ids: Arc<JobIdAllocator>,
    active: Arc<Mutex<HashSet<String>>>,
    scheduler: BoundedScheduler,
    download_prefix: String,
}

impl BatchRunner {
    pub fn new(
        sink: Arc<dyn ProgressSink>,
        archives: ArchiveStore,
        settings: RunnerSettings,
    ) -> Result<Self> {
        let scheduler = settings.validate()?;
        Ok(Self {
            sink,
            archives,
            ids: Arc::new(JobIdAllocator::new()),
            active: Arc::new(Mutex::new(HashSet::new())),
            scheduler,
            download_prefix: settings.download_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn archives(&self) -> &ArchiveStore {
        &self.archives
    }

    pub fn scheduler(&self) -> BoundedScheduler {
        self.scheduler
    }

    pub fn download_url(&self, utility: Utility, job_id: &str) -> String {
        format!("{}/{utility}/download/{job_id}", self.download_prefix)
    }

    /// Validates, allocates the job id and returns immediately; the batch runs
    /// on a detached task. Setup failures are returned here and emit nothing.
    pub async fn submit<W: WorkFunction>(
        &self,
        work: Arc<W>,
        inputs: Vec<W::Input>,
        config: W::Config,
        job_id: Option<String>,
    ) -> Result<JobTicket> {
        let (claim, prepared) = self.prepare(work, inputs, config, job_id).await?;
        let ticket = JobTicket {
            job_id: prepared.job.id.clone(),
            total: prepared.job.total,
        };

        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(err) = runner.drive(prepared).await {
                debug!(job_id = %claim.job_id, error = %err, "detached batch ended with error");
            }
            drop(claim);
        });

        Ok(ticket)
    }

    /// Same as [`submit`](Self::submit) but awaits the terminal event.
    pub async fn run<W: WorkFunction>(
        &self,
        work: Arc<W>,
        inputs: Vec<W::Input>,
        config: W::Config,
        job_id: Option<String>,
    ) -> Result<BatchOutcome> {
        let (_claim, prepared) = self.prepare(work, inputs, config, job_id).await?;
        self.drive(prepared).await
    }

    /// Runs one input through the executor and returns the artifact bytes.
    /// No progress events are emitted.
    pub async fn run_single<W: WorkFunction>(
        &self,
        work: Arc<W>,
        input: W::Input,
        config: W::Config,
    ) -> Result<SingleOutcome> {
        work.validate_config(&config)?;
        self.archives.prepare().await?;
        let job_id = self.ids.allocate(work.utility());
        let work_dir = self.archives.create_work_dir(&job_id).await?;

        let ctx = WorkContext::new(job_id.clone(), 0, work_dir);
        let result = execute_item(work.as_ref(), &ctx, &input, &config).await;
        let outcome = match (&result.status, &result.artifact) {
            (ItemStatus::Success, Some(artifact)) => tokio::fs::read(&artifact.path)
                .await
                .map_err(ForgeError::from),
            (ItemStatus::Success, None) => Ok(Vec::new()),
            (ItemStatus::Skipped, _) => Err(ForgeError::InvalidArgument(result.message.clone())),
            _ => Err(ForgeError::WorkFailed(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| result.message.clone()),
            )),
        };
        self.archives.remove_work_dir(&job_id).await;

        Ok(SingleOutcome {
            content: outcome?,
            result,
        })
    }

    async fn prepare<W: WorkFunction>(
        &self,
        work: Arc<W>,
        inputs: Vec<W::Input>,
        config: W::Config,
        job_id: Option<String>,
    ) -> Result<(JobClaim, PreparedJob<W>)> {
        work.validate_config(&config)?;
        let utility = work.utility();
        let job_id = match job_id {
            Some(job_id) => {
                validate_job_id(&job_id)?;
                job_id
            }
            None => self.ids.allocate(utility),
        };

        let claim = self.claim(&job_id)?;
        self.archives.prepare().await?;
        if self.archives.archive_exists(utility, &job_id).await? {
            return Err(ForgeError::JobConflict(job_id));
        }
        let work_dir = self.archives.create_work_dir(&job_id).await?;

        info!(job_id = %job_id, utility = %utility, total = inputs.len(), "batch job accepted");
        let prepared = PreparedJob {
            job: Job::new(job_id, utility, inputs.len()),
            work,
            inputs,
            config: Arc::new(config),
            work_dir,
        };
        Ok((claim, prepared))
    }

    /// Reserves `job_id` while its batch is live. Fails with `JobConflict`
    /// when another batch holds it.
    fn claim(&self, job_id: &str) -> Result<JobClaim> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| ForgeError::InternalError("job id registry lock poisoned".to_string()))?;
        if !active.insert(job_id.to_string()) {
            return Err(ForgeError::JobConflict(job_id.to_string()));
        }
        Ok(JobClaim {
            active: Arc::clone(&self.active),
            job_id: job_id.to_string(),
        })
    }

    /// Never lets an error or panic escape: both become an `error` event.
    async fn drive<W: WorkFunction>(&self, prepared: PreparedJob<W>) -> Result<BatchOutcome> {
        let emitter = JobEmitter::new(Arc::clone(&self.sink), prepared.job.utility);
        let job_id = prepared.job.id.clone();

        let outcome = match AssertUnwindSafe(self.execute(prepared, &emitter))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => {
                error!(job_id = %job_id, error = %err, "batch job failed");
                emitter.emit_error(&job_id, err.to_string());
                Err(err)
            }
            Err(_) => {
                error!(job_id = %job_id, "batch driver panicked");
                let err = ForgeError::InternalError("batch driver panicked".to_string());
                emitter.emit_error(&job_id, err.to_string());
                Err(err)
            }
        };

        self.archives.remove_work_dir(&job_id).await;
        outcome
    }

    async fn execute<W: WorkFunction>(
        &self,
        prepared: PreparedJob<W>,
        emitter: &JobEmitter,
    ) -> Result<BatchOutcome> {
        let PreparedJob {
            mut job,
            work,
            inputs,
            config,
            work_dir,
        } = prepared;

        emitter.emit_start(&job.id, job.total);

        let thunks: Vec<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| {
                let work = Arc::clone(&work);
                let config = Arc::clone(&config);
                let ctx = WorkContext::new(job.id.clone(), index, work_dir.clone());
                move || async move {
                    let result = execute_item(work.as_ref(), &ctx, &input, config.as_ref()).await;
                    (index, result)
                }
            })
            .collect();

        let total = job.total;
        let job_id = job.id.clone();
        let results = &mut job.results;
        self.scheduler
            .run(thunks, |(index, result): (usize, WorkItemResult)| {
                match results.record(index, result.clone()) {
                    Ok(completed) => emitter.emit_item_progress(&job_id, completed, total, result),
                    Err(err) => warn!(job_id = %job_id, error = %err, "dropped work item result"),
                }
            })
            .await;

        let results = job.results.finish()?;
        let summary = ResultSummary::from_results(&results);
        let archive = self.archives.assemble(job.utility, &job.id, &results).await?;

        info!(
            job_id = %job.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch job complete"
        );
        emitter.emit_complete(
            &job.id,
            CompletePayload {
                job_id: job.id.clone(),
                total: job.total,
                succeeded: summary.succeeded,
                failed: summary.failed,
                skipped: summary.skipped,
                archive_name: archive.name.clone(),
                download_url: self.download_url(job.utility, &job.id),
                results: results.clone(),
            },
        );

        Ok(BatchOutcome {
            job_id: job.id,
            archive,
            results,
            summary,
        })
    }
}
