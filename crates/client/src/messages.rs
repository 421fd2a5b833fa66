//! Event-stream message types and parser.
//!
//! The service sends JSON frames shaped `{"type": "<kind>", "data": {...}}`.
//! This module deserializes them into a strongly-typed [`StreamMessage`].

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamMessage {
    /// Server status broadcast (queue depth).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A job left the queue and started running.
    #[serde(rename = "job_started")]
    JobStarted(JobStartedData),

    /// Step-level progress within a job.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// One unit of a job finished.
    #[serde(rename = "unit_completed")]
    UnitCompleted(UnitCompletedData),

    /// The job failed.
    #[serde(rename = "job_failed")]
    JobFailed(JobFailedData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub queue_remaining: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStartedData {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub job_id: String,
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitCompletedData {
    pub job_id: String,
    #[serde(default)]
    pub unit_index: u32,
    pub url: String,
    #[serde(default)]
    pub seed: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobFailedData {
    pub job_id: String,
    pub error: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// Parse a text frame.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// should log and continue.
pub fn parse_message(text: &str) -> Result<StreamMessage, serde_json::Error> {
    serde_json::from_str(text)
}
