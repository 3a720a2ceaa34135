use std::{fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

/// The file-processing utilities exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Utility {
    Password,
    Qr,
    Fetch,
    Convert,
    Resize,
}

impl Utility {
    pub const ALL: [Utility; 5] = [
        Utility::Password,
        Utility::Qr,
        Utility::Fetch,
        Utility::Convert,
        Utility::Resize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Qr => "qr",
            Self::Fetch => "fetch",
            Self::Convert => "convert",
            Self::Resize => "resize",
        }
    }

    /// Namespace used for bulk job ids, event names and archive names.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Password => "password-bulk",
            Self::Qr => "qr-bulk",
            Self::Fetch => "fetch-bulk",
            Self::Convert => "convert-bulk",
            Self::Resize => "resize-bulk",
        }
    }
}

impl fmt::Display for Utility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Utility {
    type Err = ForgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|utility| utility.as_str() == value || utility.namespace() == value)
            .ok_or_else(|| ForgeError::InvalidArgument(format!("unknown utility: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

/// A file produced by one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(skip)]
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemResult {
    pub identity: String,
    pub status: ItemStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl WorkItemResult {
    pub fn success(identity: impl Into<String>, message: impl Into<String>, artifact: Option<Artifact>) -> Self {
        Self {
            identity: identity.into(),
            status: ItemStatus::Success,
            message: message.into(),
            artifact,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(identity: impl Into<String>, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "work item failed without an error message".to_string();
        }
        Self {
            identity: identity.into(),
            status: ItemStatus::Failed,
            message: format!("failed: {error}"),
            artifact: None,
            error: Some(error),
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            status: ItemStatus::Skipped,
            message: format!("skipped: {}", reason.into()),
            artifact: None,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utility_parses_name_and_namespace() {
        assert_eq!("qr".parse::<Utility>().ok(), Some(Utility::Qr));
        assert_eq!("resize-bulk".parse::<Utility>().ok(), Some(Utility::Resize));
        assert!("zip".parse::<Utility>().is_err());
    }

    #[test]
    fn failed_result_never_has_empty_error() {
        let result = WorkItemResult::failed("item-1", "  ");
        assert_eq!(result.status, ItemStatus::Failed);
        assert!(!result.error.unwrap_or_default().trim().is_empty());
    }

    #[test]
    fn artifact_path_is_not_serialized() {
        let result = WorkItemResult::success(
            "a",
            "ok",
            Some(Artifact {
                path: PathBuf::from("/srv/output/work/secret/a.txt"),
                file_name: "a.txt".to_string(),
                content_type: "text/plain".to_string(),
                size_bytes: 3,
            }),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("/srv/output"));
        assert!(json.contains("\"fileName\":\"a.txt\""));
        assert!(json.contains("\"status\":\"success\""));
    }
}
