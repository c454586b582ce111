//! Job status types: the client-side job lifecycle, the server run-state
//! vocabulary, and lenient parsing of completion payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Phase of the single job the controller tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Loading,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary and action items produced by the processing service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub action_items: Vec<String>,
}

impl Summary {
    pub fn new(summary: impl Into<String>, action_items: Vec<String>) -> Self {
        Self {
            summary: summary.into(),
            action_items,
        }
    }

    /// Decode the `output` of a completed job.
    ///
    /// Accepts a JSON-encoded string or an inline object. Missing or malformed
    /// fields fall back to empty values; a string that is not JSON becomes the
    /// summary text.
    pub fn from_output(output: Option<&Value>) -> Self {
        match output {
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Self::from_object(&map),
                _ => Self::new(text.clone(), Vec::new()),
            },
            Some(Value::Object(map)) => Self::from_object(map),
            _ => Self::default(),
        }
    }

    pub(crate) fn from_object(map: &Map<String, Value>) -> Self {
        let summary = map
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let action_items = map
            .get("action_items")
            .or_else(|| map.get("actionItems"))
            .map(string_items)
            .unwrap_or_default();

        Self {
            summary,
            action_items,
        }
    }
}

/// Collect the string entries of a JSON array; anything else yields nothing.
pub(crate) fn string_items(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// The controller's view of the current job.
///
/// Built only through the per-status constructors, so fields that do not
/// belong to the current status are always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub summary: String,
    pub action_items: Vec<String>,
    pub error: Option<String>,
}

impl Default for JobResult {
    fn default() -> Self {
        Self::idle()
    }
}

impl JobResult {
    fn empty(status: JobStatus) -> Self {
        Self {
            status,
            summary: String::new(),
            action_items: Vec::new(),
            error: None,
        }
    }

    pub fn idle() -> Self {
        Self::empty(JobStatus::Idle)
    }

    pub fn loading() -> Self {
        Self::empty(JobStatus::Loading)
    }

    pub fn processing() -> Self {
        Self::empty(JobStatus::Processing)
    }

    pub fn completed(result: Summary) -> Self {
        Self {
            status: JobStatus::Completed,
            summary: result.summary,
            action_items: result.action_items,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(JobStatus::Error)
        }
    }

    /// Summary payload, present only for completed jobs.
    pub fn outcome(&self) -> Option<Summary> {
        (self.status == JobStatus::Completed)
            .then(|| Summary::new(self.summary.clone(), self.action_items.clone()))
    }
}

/// Server-reported lifecycle stage of an asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RuntimeStatus {
    Pending,
    Running,
    ContinuedAsNew,
    Suspended,
    Completed,
    Failed,
    Terminated,
    Canceled,
    Unknown(String),
}

impl RuntimeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "continuedasnew" => Self::ContinuedAsNew,
            "suspended" => Self::Suspended,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "terminated" => Self::Terminated,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// Run-states after which the job will never produce a result.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Terminated | Self::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::ContinuedAsNew => "ContinuedAsNew",
            Self::Suspended => "Suspended",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Terminated => "Terminated",
            Self::Canceled => "Canceled",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for RuntimeStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
