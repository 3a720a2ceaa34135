use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("job id already in use: {0}")]
    JobConflict(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("archive not found: {utility}_{job_id}")]
    ArchiveNotFound { utility: String, job_id: String },
    #[error("archive error: {0}")]
    Archive(String),
    #[error("work failed: {0}")]
    WorkFailed(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::JobConflict(_) => "JobAlreadyExists",
            Self::JobNotFound(_) => "NoSuchJob",
            Self::ArchiveNotFound { .. } => "NoSuchArchive",
            Self::Archive(_) => "ArchiveError",
            Self::WorkFailed(_) => "WorkFailed",
            Self::InternalError(_) => "InternalError",
            Self::Io(_) => "InternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
