//! Event-stream processing loop.
//!
//! Reads frames from the WebSocket, parses them into [`StreamMessage`]s,
//! and republishes job-scoped ones as [`GenerationEvent`]s on the
//! broadcast channel.

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::WsStream;
use crate::events::GenerationEvent;
use crate::messages::{parse_message, ProgressData, StreamMessage};

/// Process frames until the socket closes or a receive error occurs.
///
/// Binary frames (previews) are ignored.
pub async fn process_messages(
    ws_stream: &mut WsStream,
    event_tx: &broadcast::Sender<GenerationEvent>,
) {
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => handle_text_message(&text, event_tx),
            Ok(Message::Binary(_)) => {
                tracing::trace!("Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Event stream closed");
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "Event stream receive error");
                break;
            }
        }
    }
}

fn handle_text_message(text: &str, event_tx: &broadcast::Sender<GenerationEvent>) {
    match parse_message(text) {
        Ok(msg) => {
            if let Some(event) = translate(msg) {
                // No receivers simply means no job is in flight.
                let _ = event_tx.send(event);
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse event-stream message",
            );
        }
    }
}

/// Map a wire message onto a lifecycle event, if it is one.
pub fn translate(msg: StreamMessage) -> Option<GenerationEvent> {
    match msg {
        StreamMessage::Status(data) => {
            tracing::debug!(queue_remaining = data.queue_remaining, "Service queue status");
            None
        }
        StreamMessage::JobStarted(data) => {
            tracing::info!(correlation_id = %data.job_id, "Job started");
            None
        }
        StreamMessage::Progress(data) => {
            let percentage = progress_percent(&data);
            tracing::debug!(
                correlation_id = %data.job_id,
                value = data.value,
                max = data.max,
                percent = percentage,
                "Generation progress",
            );
            Some(GenerationEvent::Progress {
                correlation_id: data.job_id,
                percentage,
            })
        }
        StreamMessage::UnitCompleted(data) => {
            tracing::debug!(
                correlation_id = %data.job_id,
                unit_index = data.unit_index,
                "Unit completed",
            );
            Some(GenerationEvent::UnitCompleted {
                correlation_id: data.job_id,
                unit_index: data.unit_index,
                url: data.url,
                seed: data.seed,
            })
        }
        StreamMessage::JobFailed(data) => {
            tracing::error!(
                correlation_id = %data.job_id,
                error_type = data.error_type.as_deref().unwrap_or("unknown"),
                error_message = %data.error,
                "Job failed",
            );
            Some(GenerationEvent::JobFailed {
                correlation_id: data.job_id,
                error: data.error,
            })
        }
    }
}

fn progress_percent(data: &ProgressData) -> f32 {
    if data.max > 0 {
        ((data.value as f32 / data.max as f32) * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}
