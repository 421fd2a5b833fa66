//! The generation-client boundary.
//!
//! The orchestrator depends only on [`GenerationClient`]: three
//! submission entry points, a cost estimate, and a broadcast event
//! stream. Transport, auth, and the service's job protocol all live
//! behind it.

use async_trait::async_trait;
use orbit_core::error::CoreError;
use orbit_core::request::{GenerationRequest, SubmissionKind};
use orbit_core::types::CorrelationId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::events::GenerationEvent;

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitAck {
    /// Known up front when the service returns it; otherwise latched from
    /// the first job-scoped event.
    pub correlation_id: Option<CorrelationId>,
}

/// Price quote for a video request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub credits: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<f64>,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn submit_image_job(&self, request: &GenerationRequest)
        -> Result<SubmitAck, ClientError>;

    async fn submit_edit_job(&self, request: &GenerationRequest) -> Result<SubmitAck, ClientError>;

    async fn submit_video_job(&self, request: &GenerationRequest)
        -> Result<SubmitAck, ClientError>;

    async fn estimate_video_cost(
        &self,
        request: &GenerationRequest,
    ) -> Result<CostEstimate, ClientError>;

    /// Receiver for lifecycle events. Dropping it deregisters the listener.
    fn subscribe(&self) -> broadcast::Receiver<GenerationEvent>;
}

/// Route a request to the submission entry point matching its shape.
pub async fn submit(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
) -> Result<SubmitAck, ClientError> {
    match request.submission() {
        SubmissionKind::Image => client.submit_image_job(request).await,
        SubmissionKind::Edit => client.submit_edit_job(request).await,
        SubmissionKind::Video => client.submit_video_job(request).await,
    }
}

/// Errors surfaced by a generation client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the event-stream connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The HTTP request itself failed (network, DNS, TLS).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The service accepted the request but refused the job.
    #[error("Submission rejected: {0}")]
    Rejected(String),
}

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        CoreError::JobFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn client_errors_surface_as_job_failures() {
        let err: CoreError = ClientError::Api {
            status: 503,
            body: "overloaded".into(),
        }
        .into();
        assert_matches!(err, CoreError::JobFailed(ref msg) if msg.contains("503"));
    }

    #[test]
    fn cost_estimate_reads_camel_case() {
        let json = r#"{"credits":12.5,"estimatedSeconds":90}"#;
        let estimate: CostEstimate = serde_json::from_str(json).unwrap();
        assert_eq!(estimate.credits, 12.5);
        assert_eq!(estimate.estimated_seconds, Some(90.0));
        assert!(estimate.currency.is_none());
    }
}
