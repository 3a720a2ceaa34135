use std::fmt;

use chrono::{DateTime, Utc};
use fileforge_common::types::{Utility, WorkItemResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Progress,
    Complete,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub job_id: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub job_id: String,
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
    pub result: WorkItemResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayload {
    pub job_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub archive_name: String,
    pub download_url: String,
    pub results: Vec<WorkItemResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub job_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Start(StartPayload),
    Progress(ProgressPayload),
    Complete(CompletePayload),
    Error(ErrorPayload),
}

/// A transient lifecycle message for one job. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub utility: Utility,
    pub job_id: String,
    pub payload: EventPayload,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    event: String,
    data: &'a EventPayload,
}

impl ProgressEvent {
    pub fn new(utility: Utility, job_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            utility,
            job_id: job_id.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Start(_) => EventKind::Start,
            EventPayload::Progress(_) => EventKind::Progress,
            EventPayload::Complete(_) => EventKind::Complete,
            EventPayload::Error(_) => EventKind::Error,
        }
    }

    /// `<namespace>:<kind>`, e.g. `qr-bulk:progress`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.utility.namespace(), self.kind())
    }

    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(&WireFrame {
            event: self.name(),
            data: &self.payload,
        })
    }
}

/// `completed / total * 100`, clamped to `[0, 100]`. An empty job is 100% done.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let value = (completed.min(total) as u128 * 100) / total as u128;
    value.min(100) as u8
}
