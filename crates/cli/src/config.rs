use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use orbit_client::remote::{derive_ws_url, RemoteConfig};
use orbit_client::reconnect::ReconnectPolicy;
use orbit_pipeline::concat::DEFAULT_FFMPEG_BINARY;
use orbit_pipeline::orchestrator::DEFAULT_JOB_TIMEOUT;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8188";
const DEFAULT_OUTPUT_DIR: &str = "./renders";
const DEFAULT_STATE_FILE: &str = "./.orbit/last_render.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Runtime configuration loaded from environment variables.
///
/// All fields have defaults suitable for a service on localhost.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub api_url: String,
    /// Event-stream URL; derived from `api_url` when unset.
    pub ws_url: String,
    pub api_key: Option<String>,
    /// Per-job orchestration deadline.
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    pub ffmpeg: String,
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var              | Default                     |
    /// |----------------------|-----------------------------|
    /// | `ORBIT_API_URL`      | `http://127.0.0.1:8188`     |
    /// | `ORBIT_WS_URL`       | derived from the API URL    |
    /// | `ORBIT_API_KEY`      | none                        |
    /// | `ORBIT_TIMEOUT_SECS` | `600`                       |
    /// | `ORBIT_OUTPUT_DIR`   | `./renders`                 |
    /// | `ORBIT_STATE_FILE`   | `./.orbit/last_render.json` |
    /// | `ORBIT_FFMPEG`       | `ffmpeg`                    |
    /// | `ORBIT_LOG_FORMAT`   | `text`                      |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = var("ORBIT_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.into())
            .trim_end_matches('/')
            .to_string();
        let ws_url = var("ORBIT_WS_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| derive_ws_url(&api_url));

        let timeout = match var("ORBIT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().with_context(|| {
                    format!("ORBIT_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'")
                })?;
                if secs == 0 {
                    bail!("ORBIT_TIMEOUT_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_JOB_TIMEOUT,
        };

        let log_format = match var("ORBIT_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("ORBIT_LOG_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        Ok(Self {
            api_url,
            ws_url,
            api_key: var("ORBIT_API_KEY"),
            timeout,
            output_dir: var("ORBIT_OUTPUT_DIR")
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.into())
                .into(),
            state_file: var("ORBIT_STATE_FILE")
                .unwrap_or_else(|| DEFAULT_STATE_FILE.into())
                .into(),
            ffmpeg: var("ORBIT_FFMPEG").unwrap_or_else(|| DEFAULT_FFMPEG_BINARY.into()),
            log_format,
        })
    }

    pub fn remote(&self) -> RemoteConfig {
        RemoteConfig {
            api_url: self.api_url.clone(),
            ws_url: self.ws_url.clone(),
            api_key: self.api_key.clone(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<CliConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:8188");
        assert_eq!(config.ws_url, "ws://127.0.0.1:8188");
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.output_dir, PathBuf::from("./renders"));
        assert_eq!(config.ffmpeg, "ffmpeg");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn stream_url_follows_secure_api_url() {
        let config = load(&[("ORBIT_API_URL", "https://gen.example.com/")]).unwrap();
        assert_eq!(config.api_url, "https://gen.example.com");
        assert_eq!(config.ws_url, "wss://gen.example.com");
    }

    #[test]
    fn explicit_values_win() {
        let config = load(&[
            ("ORBIT_WS_URL", "ws://events:9000"),
            ("ORBIT_API_KEY", "secret"),
            ("ORBIT_TIMEOUT_SECS", "30"),
            ("ORBIT_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.ws_url, "ws://events:9000");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_startup_errors() {
        assert!(load(&[("ORBIT_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("ORBIT_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("ORBIT_LOG_FORMAT", "xml")]).is_err());
    }
}
