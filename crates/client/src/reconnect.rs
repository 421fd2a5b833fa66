//! Bounded re-establishment of the event stream.
//!
//! A dropped stream leaves submitted jobs waiting on events that can only
//! arrive over a new socket. [`reestablish`] waits out a growing delay
//! before each attempt and announces it as
//! [`GenerationEvent::StreamReconnecting`], so waiting jobs can report the
//! outage. Once the policy's attempts are spent it gives up and the caller
//! announces [`GenerationEvent::StreamLost`] instead of letting every job
//! run into its deadline.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::connection::{StreamConnection, StreamConnector};
use crate::events::GenerationEvent;

/// How the stream is retried after a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before the first attempt.
    pub initial_delay: Duration,
    /// Ceiling on the wait before any attempt.
    pub max_delay: Duration,
    /// `None` retries until cancelled.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    /// Attempt schedule for one outage.
    pub fn schedule(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            attempt: 0,
        }
    }
}

/// One scheduled attempt: its 1-based number and the wait before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    pub delay: Duration,
}

/// Doubling delays clamped to the policy ceiling, ending after
/// `max_attempts`.
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a ReconnectPolicy,
    attempt: u32,
}

impl Iterator for Backoff<'_> {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        if self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempt >= max)
        {
            return None;
        }
        let factor = 1u32 << self.attempt.min(31);
        let delay = self
            .policy
            .initial_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay);
        self.attempt += 1;
        Some(Attempt {
            number: self.attempt,
            delay,
        })
    }
}

/// How an outage ended.
pub enum Reestablished {
    Connected(StreamConnection),
    GaveUp { attempts: u32 },
    Cancelled,
}

/// Retry `connector` on `policy`'s schedule, announcing every attempt on
/// `events`.
pub async fn reestablish(
    connector: &StreamConnector,
    policy: &ReconnectPolicy,
    events: &broadcast::Sender<GenerationEvent>,
    cancel: &CancellationToken,
) -> Reestablished {
    let mut attempts = 0;
    for Attempt { number, delay } in policy.schedule() {
        attempts = number;
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let _ = events.send(GenerationEvent::StreamReconnecting {
            attempt: number,
            delay_ms,
        });
        tracing::info!(
            ws_url = connector.ws_url(),
            attempt = number,
            delay_ms,
            "Event stream down, retrying",
        );

        tokio::select! {
            _ = cancel.cancelled() => return Reestablished::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => return Reestablished::Cancelled,
            result = connector.connect() => match result {
                Ok(conn) => {
                    tracing::info!(attempt = number, "Event stream re-established");
                    return Reestablished::Connected(conn);
                }
                Err(e) => tracing::warn!(attempt = number, error = %e, "Reconnect attempt failed"),
            },
        }
    }
    Reestablished::GaveUp { attempts }
}
