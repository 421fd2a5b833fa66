//! Persisted "last render" state.
//!
//! Read before compilation for `--last-seed` / `--last-image`, written
//! after a successful run. The pipeline only sees it through
//! [`LastRenderStore`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbit_core::error::CoreError;
use orbit_core::options::RawOptions;
use orbit_core::types::Seed;
use orbit_core::workflow::ArtifactKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRender {
    pub kind: ArtifactKind,
    pub model: String,
    #[serde(default)]
    pub prompt: Option<String>,
    pub seed: Seed,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Local copies, in unit order.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    pub rendered_at: DateTime<Utc>,
}

impl LastRender {
    /// Most recent local image, usable as an edit reference.
    pub fn last_image(&self) -> Option<&Path> {
        match self.kind {
            ArtifactKind::Image => self.files.last().map(PathBuf::as_path),
            ArtifactKind::Video => None,
        }
    }
}

#[async_trait]
pub trait LastRenderStore: Send + Sync {
    async fn load(&self) -> Result<Option<LastRender>, CoreError>;

    async fn save(&self, render: &LastRender) -> Result<(), CoreError>;
}

/// JSON file on disk. A missing or unreadable file loads as `None`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LastRenderStore for JsonFileStore {
    async fn load(&self) -> Result<Option<LastRender>, CoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::Internal(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(render) => Ok(Some(render)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt last-render state");
                Ok(None)
            }
        }
    }

    async fn save(&self, render: &LastRender) -> Result<(), CoreError> {
        let io_err = |e: std::io::Error| {
            CoreError::Internal(format!("failed to write {}: {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(render)
            .map_err(|e| CoreError::Internal(format!("failed to serialize last render: {e}")))?;

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), "Saved last render");
        Ok(())
    }
}

/// Fill `raw` from the previous render for `--last-seed` / `--last-image`.
pub fn apply_last_render(
    raw: &mut RawOptions,
    last: Option<&LastRender>,
    use_seed: bool,
    use_image: bool,
) -> Result<(), CoreError> {
    if !use_seed && !use_image {
        return Ok(());
    }
    let last = last.ok_or_else(|| {
        CoreError::Validation("No previous render is recorded".to_string())
    })?;

    if use_seed {
        if raw.seed.is_some() {
            return Err(CoreError::Validation(
                "--last-seed cannot be combined with --seed".to_string(),
            ));
        }
        raw.seed = Some(last.seed);
    }
    if use_image {
        let image = last.last_image().ok_or_else(|| {
            CoreError::Validation(
                "The previous render has no local image to reuse".to_string(),
            )
        })?;
        raw.context_images.push(image.to_string_lossy().into_owned());
    }
    Ok(())
}
