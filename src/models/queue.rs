//! Types describing Bull/BullMQ queues as seen by the dashboard.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use redis::{self, RedisResult};
use serde::{Deserialize, Serialize};

const WAITING_STATE: &str = "waiting";
const ACTIVE_STATE: &str = "active";
const COMPLETED_STATE: &str = "completed";
const FAILED_STATE: &str = "failed";
const DELAYED_STATE: &str = "delayed";
const PAUSED_STATE: &str = "paused";
const PRIORITIZED_STATE: &str = "prioritized";
const WAITING_CHILDREN_STATE: &str = "waiting-children";

/// Which queue library wrote a queue's keys. Determines the key layout the dashboard reads.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Bull,
    BullMq,
}

impl QueueKind {
    /// Picks the kind from the `BULL_VERSION` setting. Only `BULLMQ` (any case) selects BullMQ.
    pub fn from_version(version: &str) -> Self {
        if version.trim().eq_ignore_ascii_case("bullmq") {
            QueueKind::BullMq
        } else {
            QueueKind::Bull
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            QueueKind::Bull => "Bull",
            QueueKind::BullMq => "BullMQ",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// State of a job, each backed by one Redis key per queue.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
    Paused,
    Prioritized,
    WaitingChildren,
}

impl JobState {
    /// Suffix of the Redis key that holds jobs in this state.
    pub fn key_suffix(self) -> &'static str {
        match self {
            JobState::Waiting => "wait",
            JobState::Active => ACTIVE_STATE,
            JobState::Completed => COMPLETED_STATE,
            JobState::Failed => FAILED_STATE,
            JobState::Delayed => DELAYED_STATE,
            JobState::Paused => PAUSED_STATE,
            JobState::Prioritized => PRIORITIZED_STATE,
            JobState::WaitingChildren => WAITING_CHILDREN_STATE,
        }
    }

    /// Whether this state is stored as a sorted set (otherwise it's a list).
    pub fn is_sorted_set(self) -> bool {
        !matches!(self, JobState::Waiting | JobState::Active | JobState::Paused)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl AsRef<str> for JobState {
    fn as_ref(&self) -> &str {
        match self {
            JobState::Waiting => WAITING_STATE,
            JobState::Active => ACTIVE_STATE,
            JobState::Completed => COMPLETED_STATE,
            JobState::Failed => FAILED_STATE,
            JobState::Delayed => DELAYED_STATE,
            JobState::Paused => PAUSED_STATE,
            JobState::Prioritized => PRIORITIZED_STATE,
            JobState::WaitingChildren => WAITING_CHILDREN_STATE,
        }
    }
}

impl FromStr for JobState {
    type Err = ();

    fn from_str(s: &str) -> Result<JobState, ()> {
        match s {
            WAITING_STATE => Ok(JobState::Waiting),
            ACTIVE_STATE => Ok(JobState::Active),
            COMPLETED_STATE => Ok(JobState::Completed),
            FAILED_STATE => Ok(JobState::Failed),
            DELAYED_STATE => Ok(JobState::Delayed),
            PAUSED_STATE => Ok(JobState::Paused),
            PRIORITIZED_STATE => Ok(JobState::Prioritized),
            WAITING_CHILDREN_STATE => Ok(JobState::WaitingChildren),
            _ => Err(()),
        }
    }
}

/// Number of jobs per state for a single queue.
pub type JobCounts = BTreeMap<JobState, u64>;

/// Summary of a queue, as returned by the dashboard API.
#[derive(Debug, PartialEq, Serialize)]
pub struct QueueSummary {
    pub name: String,
    pub kind: QueueKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<JobCounts>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fields read from a job's hash.
pub const JOB_FIELDS: [&str; 9] = [
    "name",
    "data",
    "opts",
    "timestamp",
    "processedOn",
    "finishedOn",
    "attemptsMade",
    "failedReason",
    "returnvalue",
];

/// Read-only view of a single job, as stored by Bull/BullMQ.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub name: Option<String>,
    pub data: Option<serde_json::Value>,
    pub opts: Option<serde_json::Value>,
    pub timestamp: Option<i64>,
    pub processed_on: Option<i64>,
    pub finished_on: Option<i64>,
    pub attempts_made: Option<u64>,
    pub failed_reason: Option<String>,
    pub return_value: Option<serde_json::Value>,
}

/// Parses a JSON field, keeping the raw string if it isn't valid JSON.
fn json_field(raw: Option<String>) -> Option<serde_json::Value> {
    raw.map(|s| serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)))
}

impl JobSummary {
    /// Builds a summary from the result of `HMGET` over `JOB_FIELDS`.
    ///
    /// Returns `None` if the job hash no longer exists (all fields missing).
    pub fn from_fields(id: String, v: &redis::Value) -> RedisResult<Option<Self>> {
        let fields: Vec<Option<String>> = redis::from_redis_value(v)?;
        if fields.iter().all(Option::is_none) {
            return Ok(None);
        }

        let mut fields = fields.into_iter();
        let mut next = || fields.next().flatten();
        Ok(Some(JobSummary {
            id,
            name: next(),
            data: json_field(next()),
            opts: json_field(next()),
            timestamp: next().and_then(|s| s.parse().ok()),
            processed_on: next().and_then(|s| s.parse().ok()),
            finished_on: next().and_then(|s| s.parse().ok()),
            attempts_made: next().and_then(|s| s.parse().ok()),
            failed_reason: next(),
            return_value: json_field(next()),
        }))
    }
}
