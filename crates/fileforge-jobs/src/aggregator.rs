use fileforge_common::{
    error::{ForgeError, Result},
    types::{ItemStatus, WorkItemResult},
};
use serde::Serialize;

/// One slot per submitted item. Slots fill in completion order but the
/// finished collection is in submission order.
#[derive(Debug)]
pub struct ResultAggregator {
    slots: Vec<Option<WorkItemResult>>,
    completed: usize,
}

impl ResultAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            completed: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.slots.len()
    }

    /// Fills slot `index` and returns the new completed count.
    pub fn record(&mut self, index: usize, result: WorkItemResult) -> Result<usize> {
        if !result.status.is_terminal() {
            return Err(ForgeError::InternalError(format!(
                "work item {index} reported non-terminal status {:?}",
                result.status
            )));
        }
        let total = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            ForgeError::InternalError(format!("work item index {index} out of range 0..{total}"))
        })?;
        if slot.is_some() {
            return Err(ForgeError::InternalError(format!(
                "work item {index} recorded twice"
            )));
        }
        *slot = Some(result);
        self.completed += 1;
        Ok(self.completed)
    }

    /// Interim view for debugging; not used for delivery.
    pub fn snapshot(&self) -> Vec<&WorkItemResult> {
        self.slots.iter().flatten().collect()
    }

    pub fn finish(self) -> Result<Vec<WorkItemResult>> {
        let total = self.slots.len();
        let completed = self.completed;
        self.slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ForgeError::InternalError(format!(
                    "batch finished with {completed} of {total} items settled"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResultSummary {
    pub fn from_results(results: &[WorkItemResult]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut summary, result| {
                match result.status {
                    ItemStatus::Success => summary.succeeded += 1,
                    ItemStatus::Failed => summary.failed += 1,
                    ItemStatus::Skipped => summary.skipped += 1,
                    ItemStatus::Pending | ItemStatus::Processing => {}
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}
