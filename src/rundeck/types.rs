use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Option name to value, in the order the caller supplied them.
pub type JobOptions = IndexMap<String, String>;

/// A Rundeck project, as returned by `GET /projects`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A job definition, as returned by `GET /project/{name}/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    /// Job UUID
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    /// Owning project; older servers omit it from listings
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Job {
    /// `group/name` when the job lives in a group, else just the name.
    pub fn full_name(&self) -> String {
        match self.group.as_deref() {
            Some(group) if !group.is_empty() => format!("{group}/{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// One run of a job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Execution {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default, rename = "date-started")]
    pub date_started: Option<ExecutionDate>,
    #[serde(default, rename = "date-ended")]
    pub date_ended: Option<ExecutionDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionDate {
    pub date: DateTime<Utc>,
}

/// Execution state reported by the server.
///
/// Only [`ExecutionStatus::Running`] is non-terminal. Strings the client does
/// not know are kept verbatim so they can be surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
    FailedWithRetry,
    Scheduled,
    Other(String),
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
            Self::TimedOut => "timedout",
            Self::FailedWithRetry => "failed-with-retry",
            Self::Scheduled => "scheduled",
            Self::Other(status) => status,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<String> for ExecutionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "aborted" => Self::Aborted,
            "timedout" => Self::TimedOut,
            "failed-with-retry" => Self::FailedWithRetry,
            "scheduled" => Self::Scheduled,
            _ => Self::Other(value),
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /job/{id}/run`.
#[derive(Debug, Serialize)]
pub(super) struct RunJobRequest<'a> {
    pub options: &'a JobOptions,
}

/// Rundeck hands out integer execution ids and string job ids; accept either.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
