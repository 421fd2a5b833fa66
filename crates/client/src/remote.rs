//! Remote generation client: HTTP submission plus a persistent
//! event-stream connection.
//!
//! [`RemoteClient::connect`] establishes the stream once and spawns a
//! task that processes frames and reconnects with backoff when the
//! socket drops. Lifecycle events are fanned out through a
//! [`tokio::sync::broadcast`] channel; call [`GenerationClient::subscribe`]
//! to receive them. [`RemoteClient::shutdown`] releases the connection and
//! is safe to call more than once.

use std::time::Duration;

use async_trait::async_trait;
use orbit_core::request::GenerationRequest;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::api::{Endpoint, GenerationApi};
use crate::client::{ClientError, CostEstimate, GenerationClient, SubmitAck};
use crate::connection::{StreamConnection, StreamConnector};
use crate::events::GenerationEvent;
use crate::processor::process_messages;
use crate::reconnect::{reestablish, ReconnectPolicy, Reestablished};

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for the connection task to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// HTTP base URL, e.g. `http://host:8188`.
    pub api_url: String,
    /// WebSocket base URL, e.g. `ws://host:8188`.
    pub ws_url: String,
    pub api_key: Option<String>,
    pub reconnect: ReconnectPolicy,
}

impl RemoteConfig {
    /// Config whose stream URL is derived from the HTTP URL.
    pub fn from_api_url(api_url: String, api_key: Option<String>) -> Self {
        Self {
            ws_url: derive_ws_url(&api_url),
            api_url,
            api_key,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// `http` -> `ws`, `https` -> `wss`. Other schemes pass through.
pub fn derive_ws_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

pub struct RemoteClient {
    api: GenerationApi,
    client_id: String,
    event_tx: broadcast::Sender<GenerationEvent>,
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RemoteClient {
    /// Connect the event stream and start the background processing task.
    ///
    /// Fails if the first connection attempt fails; later drops are
    /// retried in the background.
    pub async fn connect(config: RemoteConfig) -> Result<Self, ClientError> {
        let connector = StreamConnector::new(config.ws_url, config.api_key.clone());
        let conn = connector.connect().await?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let client_id = connector.client_id().to_string();

        let task_tx = event_tx.clone();
        let task_cancel = cancel.clone();
        let reconnect = config.reconnect;
        let task_handle = tokio::spawn(async move {
            run_connection_loop(conn, &connector, &reconnect, &task_tx, &task_cancel).await;
            tracing::info!("Event-stream task exited");
        });

        Ok(Self {
            api: GenerationApi::new(config.api_url, config.api_key),
            client_id,
            event_tx,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Stop the connection task. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let Some(handle) = self.task_handle.lock().await.take() else {
            return;
        };
        tracing::info!("Shutting down generation client");
        self.cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            tracing::warn!("Event-stream task did not exit within the grace period");
        }
    }

    async fn submit(
        &self,
        endpoint: Endpoint,
        request: &GenerationRequest,
    ) -> Result<SubmitAck, ClientError> {
        let response = self.api.submit(endpoint, request, &self.client_id).await?;
        tracing::info!(
            endpoint = endpoint.path(),
            correlation_id = response.job_id.as_deref().unwrap_or("<pending>"),
            model = request.model(),
            "Job submitted",
        );
        Ok(SubmitAck {
            correlation_id: response.job_id,
        })
    }
}

#[async_trait]
impl GenerationClient for RemoteClient {
    async fn submit_image_job(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmitAck, ClientError> {
        self.submit(Endpoint::Image, request).await
    }

    async fn submit_edit_job(&self, request: &GenerationRequest) -> Result<SubmitAck, ClientError> {
        self.submit(Endpoint::Edit, request).await
    }

    async fn submit_video_job(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmitAck, ClientError> {
        self.submit(Endpoint::Video, request).await
    }

    async fn estimate_video_cost(
        &self,
        request: &GenerationRequest,
    ) -> Result<CostEstimate, ClientError> {
        self.api.estimate_video_cost(request).await
    }

    fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.event_tx.subscribe()
    }
}

/// Process frames, then reconnect, until cancelled or the policy gives up.
async fn run_connection_loop(
    first: StreamConnection,
    connector: &StreamConnector,
    reconnect: &ReconnectPolicy,
    event_tx: &broadcast::Sender<GenerationEvent>,
    cancel: &CancellationToken,
) {
    let mut conn = first;
    loop {
        let _ = event_tx.send(GenerationEvent::StreamConnected);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = process_messages(&mut conn.ws_stream, event_tx) => {}
        }

        let _ = event_tx.send(GenerationEvent::StreamDisconnected);
        if cancel.is_cancelled() {
            return;
        }

        conn = match reestablish(connector, reconnect, event_tx, cancel).await {
            Reestablished::Connected(conn) => conn,
            Reestablished::Cancelled => return,
            Reestablished::GaveUp { attempts } => {
                tracing::error!(attempts, "Event stream could not be re-established");
                let _ = event_tx.send(GenerationEvent::StreamLost { attempts });
                return;
            }
        };
    }
}
