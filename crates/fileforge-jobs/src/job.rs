use chrono::{DateTime, Utc};
use fileforge_common::types::Utility;

use crate::aggregator::ResultAggregator;

/// One bulk (or single) operation. Lives only inside the task driving it.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub utility: Utility,
    pub total: usize,
    pub created_at: DateTime<Utc>,
    pub results: ResultAggregator,
}

impl Job {
    pub fn new(id: String, utility: Utility, total: usize) -> Self {
        Self {
            id,
            utility,
            total,
            created_at: Utc::now(),
            results: ResultAggregator::new(total),
        }
    }

    pub fn completed(&self) -> usize {
        self.results.completed()
    }
}
