use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use fileforge_common::{
    error::{ForgeError, Result},
    types::Utility,
};
use uuid::Uuid;

const MAX_JOB_ID_LEN: usize = 128;
const RANDOM_SUFFIX_LEN: usize = 12;

/// Issues `<namespace>-<millis>-<seq>-<random>` job ids.
///
/// The namespace prefix is only for people reading logs; the time, sequence
/// and random parts alone keep ids unique.
#[derive(Debug, Default)]
pub struct JobIdAllocator {
    sequence: AtomicU64,
}

impl JobIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, utility: Utility) -> String {
        let millis = Utc::now().timestamp_millis().max(0);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{millis:x}-{sequence:x}-{}",
            utility.namespace(),
            &random[..RANDOM_SUFFIX_LEN]
        )
    }
}

/// Caller-supplied ids end up in file names, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_job_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_JOB_ID_LEN {
        return Err(ForgeError::InvalidArgument(format!(
            "job id must be 1..={MAX_JOB_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(ForgeError::InvalidArgument(format!(
            "job id contains unsupported characters: {id}"
        )));
    }
    Ok(())
}
