//! WebSocket connection to the service's event stream.
//!
//! [`StreamConnector`] holds the configuration; [`StreamConnector::connect`]
//! establishes a live [`StreamConnection`]. The `client_id` is fixed per
//! connector so that jobs submitted before a reconnect keep routing their
//! events to this process afterwards.

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::client::ClientError;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct StreamConnector {
    ws_url: String,
    client_id: String,
    api_key: Option<String>,
}

/// A live event-stream connection.
pub struct StreamConnection {
    pub client_id: String,
    pub ws_stream: WsStream,
}

impl StreamConnector {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: String, api_key: Option<String>) -> Self {
        Self {
            ws_url: ws_url.trim_end_matches('/').to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
            api_key,
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Identifier the service uses to address events to this process.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Full endpoint URL including the `clientId` query parameter.
    pub fn endpoint(&self) -> String {
        format!("{}/ws?clientId={}", self.ws_url, self.client_id)
    }

    pub async fn connect(&self) -> Result<StreamConnection, ClientError> {
        let mut request = self
            .endpoint()
            .into_client_request()
            .map_err(|e| ClientError::Connection(format!("Invalid stream URL: {e}")))?;
        if let Some(key) = self.api_key.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ClientError::Connection(format!("Invalid API key: {e}")))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (ws_stream, _response) = connect_async(request).await.map_err(|e| {
            ClientError::Connection(format!(
                "Failed to connect to event stream at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %self.client_id,
            "Connected to event stream at {}",
            self.ws_url,
        );

        Ok(StreamConnection {
            client_id: self.client_id.clone(),
            ws_stream,
        })
    }
}
