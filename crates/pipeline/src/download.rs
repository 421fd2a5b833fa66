//! Saving generated artifacts to the output directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbit_core::error::CoreError;
use orbit_core::request::OutputFormat;

use crate::orchestrator::JobOutcome;

/// Where downloaded units land: `<output_dir>/<prefix>_<unit>.<ext>`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn output_dir(&self) -> &Path;

    async fn save(
        &self,
        url: &str,
        prefix: &str,
        unit_index: u32,
        format: OutputFormat,
    ) -> Result<PathBuf, CoreError>;

    /// Save every outcome, in outcome order.
    async fn save_all(
        &self,
        outcomes: &[JobOutcome],
        prefix: &str,
        format: OutputFormat,
    ) -> Result<Vec<PathBuf>, CoreError> {
        let mut paths = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            paths.push(
                self.save(&outcome.url, prefix, outcome.unit_index, format)
                    .await?,
            );
        }
        Ok(paths)
    }
}

pub fn artifact_path(dir: &Path, prefix: &str, unit_index: u32, format: OutputFormat) -> PathBuf {
    dir.join(format!("{prefix}_{unit_index}.{}", format.extension()))
}

/// File-name prefix for one run, e.g. `image_20261016_153000`.
pub fn run_prefix(label: &str, at: DateTime<Utc>) -> String {
    format!("{label}_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Downloads over HTTP(S); anything else is treated as a local path and
/// copied.
pub struct HttpArtifactStore {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl HttpArtifactStore {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            output_dir,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CoreError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("failed to download {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Internal(format!(
                "failed to download {url}: HTTP {}",
                status.as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Internal(format!("failed to read {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn save(
        &self,
        url: &str,
        prefix: &str,
        unit_index: u32,
        format: OutputFormat,
    ) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to create output dir: {e}")))?;
        let path = artifact_path(&self.output_dir, prefix, unit_index, format);

        let written = if url.starts_with("http://") || url.starts_with("https://") {
            let bytes = self.fetch(url).await?;
            tokio::fs::write(&path, bytes).await
        } else {
            let source = url.strip_prefix("file://").unwrap_or(url);
            tokio::fs::copy(source, &path).await.map(|_| ())
        };
        written
            .map_err(|e| CoreError::Internal(format!("failed to save {}: {e}", path.display())))?;

        tracing::debug!(url, path = %path.display(), "Saved artifact");
        Ok(path)
    }
}
