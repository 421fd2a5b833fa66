//! Lifecycle events emitted by a generation client.
//!
//! Events are fanned out over a [`tokio::sync::broadcast`] channel; every
//! orchestration subscribes for the lifetime of one job and filters by
//! correlation id.

use orbit_core::types::{CorrelationId, Seed};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationEvent {
    /// One unit of a job finished and its artifact is available.
    UnitCompleted {
        correlation_id: CorrelationId,
        unit_index: u32,
        url: String,
        /// Seed the service actually used, when it reports one.
        seed: Option<Seed>,
    },

    /// The job failed remotely. No further events follow for it.
    JobFailed {
        correlation_id: CorrelationId,
        error: String,
    },

    /// Video progress (0-100).
    Progress {
        correlation_id: CorrelationId,
        percentage: f32,
    },

    /// The event stream (re)connected.
    StreamConnected,

    /// The event stream dropped; a reconnect is in progress.
    StreamDisconnected,

    /// A reconnect attempt is scheduled after `delay_ms`.
    StreamReconnecting { attempt: u32, delay_ms: u64 },

    /// Reconnecting gave up. Jobs still waiting will never hear back.
    StreamLost { attempts: u32 },
}

impl GenerationEvent {
    /// Job this event belongs to, if it is job-scoped.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::UnitCompleted { correlation_id, .. }
            | Self::JobFailed { correlation_id, .. }
            | Self::Progress { correlation_id, .. } => Some(correlation_id),
            Self::StreamConnected
            | Self::StreamDisconnected
            | Self::StreamReconnecting { .. }
            | Self::StreamLost { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_events_have_no_correlation() {
        assert_eq!(GenerationEvent::StreamConnected.correlation_id(), None);
        let failed = GenerationEvent::JobFailed {
            correlation_id: "job-1".into(),
            error: "boom".into(),
        };
        assert_eq!(failed.correlation_id(), Some("job-1"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let event = GenerationEvent::Progress {
            correlation_id: "job-1".into(),
            percentage: 40.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "PROGRESS");
        assert_eq!(json["correlation_id"], "job-1");
    }

    #[test]
    fn outage_events_are_not_job_scoped() {
        let retry = GenerationEvent::StreamReconnecting {
            attempt: 2,
            delay_ms: 1000,
        };
        assert_eq!(retry.correlation_id(), None);
        let json = serde_json::to_value(GenerationEvent::StreamLost { attempts: 10 }).unwrap();
        assert_eq!(json["kind"], "STREAM_LOST");
        assert_eq!(json["attempts"], 10);
    }
}
