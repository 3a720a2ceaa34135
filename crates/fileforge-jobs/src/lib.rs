pub mod aggregator;
pub mod archive;
pub mod executor;
pub mod id;
pub mod job;
pub mod runner;
pub mod scheduler;
pub mod sweep;
pub mod work;

pub use aggregator::{ResultAggregator, ResultSummary};
pub use archive::{ArchiveInfo, ArchiveStore};
pub use executor::execute_item;
pub use id::{JobIdAllocator, validate_job_id};
pub use job::Job;
pub use runner::{BatchOutcome, BatchRunner, JobTicket, RunnerSettings, SingleOutcome};
pub use scheduler::{BoundedScheduler, SchedulePolicy};
pub use sweep::{RetentionSweeper, SweepReport};
pub use work::{WorkContext, WorkFunction, WorkOutput};
