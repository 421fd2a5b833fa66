//! REST wrapper for the generation service's HTTP endpoints.
//!
//! Wraps job submission and cost estimation using [`reqwest`]. Every
//! submission carries the event-stream `client_id` so the service routes
//! lifecycle events back to this process.

use orbit_core::request::GenerationRequest;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, CostEstimate};

/// HTTP client for one generation service.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

/// Response returned by the submission endpoints.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier, used as the correlation id.
    #[serde(default, alias = "jobId", alias = "prompt_id")]
    pub job_id: Option<String>,
    /// Set when the service refuses the job outright.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    client_id: &'a str,
    #[serde(flatten)]
    request: &'a GenerationRequest,
}

/// Submission endpoint, relative to the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Image,
    Edit,
    Video,
    VideoEstimate,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Image => "/v1/generate/image",
            Self::Edit => "/v1/generate/edit",
            Self::Video => "/v1/generate/video",
            Self::VideoEstimate => "/v1/generate/video/estimate",
        }
    }
}

impl GenerationApi {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Queue a job. Returns the parsed acknowledgement.
    pub async fn submit(
        &self,
        endpoint: Endpoint,
        request: &GenerationRequest,
        client_id: &str,
    ) -> Result<SubmitResponse, ClientError> {
        let body = SubmitBody { client_id, request };
        let response = self.post(endpoint).json(&body).send().await?;
        let parsed: SubmitResponse = Self::parse_response(response).await?;
        if let Some(error) = parsed.error {
            return Err(ClientError::Rejected(error));
        }
        Ok(parsed)
    }

    /// Price a video request without running it.
    pub async fn estimate_video_cost(
        &self,
        request: &GenerationRequest,
    ) -> Result<CostEstimate, ClientError> {
        let response = self
            .post(Endpoint::VideoEstimate)
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn post(&self, endpoint: Endpoint) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(format!("{}{}", self.api_url, endpoint.path()));
        match self.api_key.as_deref() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Returns the response unchanged on success, or
    /// [`ClientError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_accepts_aliases() {
        let a: SubmitResponse = serde_json::from_str(r#"{"job_id":"a"}"#).unwrap();
        let b: SubmitResponse = serde_json::from_str(r#"{"jobId":"b"}"#).unwrap();
        let c: SubmitResponse = serde_json::from_str(r#"{"prompt_id":"c","number":3}"#).unwrap();
        assert_eq!(a.job_id.as_deref(), Some("a"));
        assert_eq!(b.job_id.as_deref(), Some("b"));
        assert_eq!(c.job_id.as_deref(), Some("c"));
    }

    #[test]
    fn submit_response_without_id_is_valid() {
        let r: SubmitResponse = serde_json::from_str("{}").unwrap();
        assert!(r.job_id.is_none());
        assert!(r.error.is_none());
    }

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        let api = GenerationApi::new("http://host:8188/".into(), None);
        assert_eq!(api.api_url(), "http://host:8188");
    }

    #[test]
    fn endpoints_are_distinct() {
        let paths = [
            Endpoint::Image.path(),
            Endpoint::Edit.path(),
            Endpoint::Video.path(),
            Endpoint::VideoEstimate.path(),
        ];
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
