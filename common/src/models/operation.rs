//! Long running operation status.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorDetail;

/// Lifecycle of a platform operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    #[default]
    #[serde(other)]
    Undefined,
}

impl OperationState {
    /// `NotStarted` and `Running` mean keep polling.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::NotStarted | Self::Running)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Undefined => "Undefined",
        };
        f.write_str(s)
    }
}

/// Body of `GET {operation location}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub status: OperationState,
    #[serde(default)]
    pub percent_complete: Option<u8>,
    #[serde(default)]
    pub created_time_utc: Option<String>,
    #[serde(default)]
    pub last_updated_time_utc: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}
