//! Job orchestration: drive one submitted request to settlement.
//!
//! Each run walks an explicit state machine
//! `Submitted -> Progress* -> Collecting* -> Settled`. [`JobTracker`] is the
//! pure transition function; [`JobOrchestrator`] wires it to the client's
//! broadcast stream and a single deadline. The event receiver is owned by
//! the run and dropped on every settlement path, so sequential runs in a
//! compound workflow never share listeners.

use std::time::Duration;

use orbit_client::client::{self, CostEstimate, GenerationClient};
use orbit_client::events::GenerationEvent;
use orbit_core::error::CoreError;
use orbit_core::request::GenerationRequest;
use orbit_core::types::{CorrelationId, Seed};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Placeholder used in timeout errors when no correlation id was learned.
const UNKNOWN_CORRELATION: &str = "<unknown>";

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

/// One completed generation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub correlation_id: CorrelationId,
    pub unit_index: u32,
    pub url: String,
    /// Seed reported by the service, else the request seed offset by the
    /// unit index.
    pub seed: Seed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Progress,
    Collecting,
    Settled,
}

/// Settlement produced by [`JobTracker::observe`].
pub type Settlement = Result<Vec<JobOutcome>, CoreError>;

/* --------------------------------------------------------------------------
JobTracker
-------------------------------------------------------------------------- */

/// Pure per-job state machine. Feed it events; it settles at most once.
#[derive(Debug)]
pub struct JobTracker {
    state: JobState,
    correlation_id: Option<CorrelationId>,
    expected: u32,
    request_seed: Seed,
    outcomes: Vec<JobOutcome>,
    last_progress: Option<f32>,
}

impl JobTracker {
    /// `correlation_id` is `None` when the submission response did not
    /// carry one; it is then latched from the first job-scoped event.
    pub fn new(expected: u32, correlation_id: Option<CorrelationId>, request_seed: Seed) -> Self {
        Self {
            state: JobState::Submitted,
            correlation_id,
            expected: expected.max(1),
            request_seed,
            outcomes: Vec::new(),
            last_progress: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Units accepted so far.
    pub fn received(&self) -> usize {
        self.outcomes.len()
    }

    pub fn last_progress(&self) -> Option<f32> {
        self.last_progress
    }

    /// Apply one event. Returns the settlement when this event settles the
    /// job; events after settlement are ignored.
    pub fn observe(&mut self, event: GenerationEvent) -> Option<Settlement> {
        if self.state == JobState::Settled {
            return None;
        }
        match event {
            GenerationEvent::StreamLost { attempts } => {
                tracing::error!(
                    correlation_id = self.correlation_id().unwrap_or(UNKNOWN_CORRELATION),
                    discarded = self.outcomes.len(),
                    attempts,
                    "Event stream lost while the job was pending",
                );
                self.state = JobState::Settled;
                self.outcomes.clear();
                return Some(Err(CoreError::JobFailed(format!(
                    "event stream lost after {attempts} reconnect attempts"
                ))));
            }
            GenerationEvent::StreamReconnecting { attempt, delay_ms } => {
                tracing::warn!(
                    correlation_id = self.correlation_id().unwrap_or(UNKNOWN_CORRELATION),
                    attempt,
                    delay_ms,
                    "Waiting on event stream reconnect",
                );
                return None;
            }
            _ => {}
        }
        let id = event.correlation_id()?;
        match self.correlation_id.as_deref() {
            Some(known) if known != id => {
                tracing::trace!(expected = known, received = id, "Ignoring event for another job");
                return None;
            }
            Some(_) => {}
            None => {
                tracing::debug!(correlation_id = id, "Latched correlation id from first event");
                self.correlation_id = Some(id.to_string());
            }
        }

        match event {
            GenerationEvent::Progress {
                correlation_id,
                percentage,
            } => {
                if self.state == JobState::Submitted {
                    self.state = JobState::Progress;
                }
                self.last_progress = Some(percentage);
                tracing::info!(correlation_id = %correlation_id, percent = percentage, "Job progress");
                None
            }
            GenerationEvent::UnitCompleted {
                correlation_id,
                unit_index,
                url,
                seed,
            } => {
                self.state = JobState::Collecting;
                tracing::info!(
                    correlation_id = %correlation_id,
                    unit_index,
                    received = self.outcomes.len() + 1,
                    expected = self.expected,
                    "Unit completed",
                );
                let seed = seed.unwrap_or(self.request_seed.wrapping_add(unit_index));
                self.outcomes.push(JobOutcome {
                    correlation_id,
                    unit_index,
                    url,
                    seed,
                });
                if self.outcomes.len() >= self.expected as usize {
                    self.state = JobState::Settled;
                    return Some(Ok(std::mem::take(&mut self.outcomes)));
                }
                None
            }
            GenerationEvent::JobFailed {
                correlation_id,
                error,
            } => {
                tracing::error!(
                    correlation_id = %correlation_id,
                    discarded = self.outcomes.len(),
                    error = %error,
                    "Job failed",
                );
                self.state = JobState::Settled;
                self.outcomes.clear();
                Some(Err(CoreError::JobFailed(error)))
            }
            GenerationEvent::StreamConnected
            | GenerationEvent::StreamDisconnected
            | GenerationEvent::StreamReconnecting { .. }
            | GenerationEvent::StreamLost { .. } => None,
        }
    }
}

/* --------------------------------------------------------------------------
JobOrchestrator
-------------------------------------------------------------------------- */

pub struct JobOrchestrator<'a> {
    client: &'a dyn GenerationClient,
    timeout: Duration,
}

impl<'a> JobOrchestrator<'a> {
    pub fn new(client: &'a dyn GenerationClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Submit `request` and wait for its `count()` units.
    pub async fn run(&self, request: &GenerationRequest) -> Settlement {
        self.run_expecting(request, request.count()).await
    }

    /// Submit `request` and wait for `expected` units, a failure, or the
    /// deadline, whichever comes first.
    pub async fn run_expecting(&self, request: &GenerationRequest, expected: u32) -> Settlement {
        // Subscribe before submitting so no early event is missed.
        let mut events = self.client.subscribe();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let submitted = tokio::time::timeout_at(deadline, client::submit(self.client, request));
        let ack = match submitted.await {
            Ok(Ok(ack)) => ack,
            Ok(Err(e)) => {
                tracing::error!(error = %e, model = request.model(), "Submission rejected");
                return Err(e.into());
            }
            Err(_) => return Err(self.timeout_error(None)),
        };

        let mut tracker = JobTracker::new(expected, ack.correlation_id, request.seed());
        let result = tokio::time::timeout_at(deadline, drive(&mut tracker, &mut events)).await;
        drop(events);

        match result {
            Ok(settlement) => settlement,
            Err(_) => {
                tracing::warn!(
                    correlation_id = tracker.correlation_id().unwrap_or(UNKNOWN_CORRELATION),
                    received = tracker.received(),
                    expected,
                    last_progress = tracker.last_progress(),
                    "Job timed out",
                );
                Err(self.timeout_error(tracker.correlation_id()))
            }
        }
    }

    /// Price a video request without submitting it.
    pub async fn estimate_cost(
        &self,
        request: &GenerationRequest,
    ) -> Result<CostEstimate, CoreError> {
        match tokio::time::timeout(self.timeout, self.client.estimate_video_cost(request)).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(self.timeout_error(None)),
        }
    }

    fn timeout_error(&self, correlation_id: Option<&str>) -> CoreError {
        CoreError::Timeout {
            correlation_id: correlation_id.unwrap_or(UNKNOWN_CORRELATION).to_string(),
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

/// Pump events into the tracker until it settles.
async fn drive(
    tracker: &mut JobTracker,
    events: &mut broadcast::Receiver<GenerationEvent>,
) -> Settlement {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(settlement) = tracker.observe(event) {
                    return settlement;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event receiver lagged; some events were dropped");
            }
            Err(RecvError::Closed) => {
                return Err(CoreError::JobFailed(
                    "event stream closed before the job settled".to_string(),
                ));
            }
        }
    }
}
