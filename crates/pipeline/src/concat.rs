//! Clip concatenation through an external ffmpeg binary.
//!
//! Segments are joined with the concat demuxer and re-encoded at a
//! constant frame rate in `yuv420p`, so clips from different segment jobs
//! play back as one continuous loop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use orbit_core::error::CoreError;

pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";

/// Output pixel format; the widest-compatible choice for h264 players.
const PIXEL_FORMAT: &str = "yuv420p";
const VIDEO_CODEC: &str = "libx264";

/// "Given these ordered clips, produce one playable file at this path."
#[async_trait]
pub trait Concatenator: Send + Sync {
    /// Fail with [`CoreError::ToolUnavailable`] if concatenation cannot run.
    async fn preflight(&self) -> Result<(), CoreError>;

    async fn concat(&self, clips: &[PathBuf], fps: u32, output: &Path) -> Result<(), CoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ConcatError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("no clips to concatenate")]
    NoClips,
}

impl From<ConcatError> for CoreError {
    fn from(err: ConcatError) -> Self {
        match err {
            ConcatError::NotFound(_) => CoreError::ToolUnavailable(err.to_string()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// [`Concatenator`] backed by `ffmpeg -f concat`.
#[derive(Debug, Clone)]
pub struct FfmpegConcat {
    binary: String,
}

impl Default for FfmpegConcat {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG_BINARY)
    }
}

impl FfmpegConcat {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn version_check(&self) -> Result<(), ConcatError> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("-version")
            .output()
            .await
            .map_err(ConcatError::NotFound)?;
        if !output.status.success() {
            return Err(ConcatError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, clips: &[PathBuf], fps: u32, output: &Path) -> Result<(), ConcatError> {
        if clips.is_empty() {
            return Err(ConcatError::NoClips);
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let list_path = output.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(clips)).await?;

        let result = tokio::process::Command::new(&self.binary)
            .args(concat_args(&list_path, fps, output))
            .output()
            .await;

        if let Err(e) = tokio::fs::remove_file(&list_path).await {
            tracing::debug!(path = %list_path.display(), error = %e, "Failed to remove concat list");
        }

        let output_status = result.map_err(ConcatError::NotFound)?;
        if !output_status.status.success() {
            return Err(ConcatError::ExecutionFailed {
                exit_code: output_status.status.code(),
                stderr: String::from_utf8_lossy(&output_status.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Concatenator for FfmpegConcat {
    async fn preflight(&self) -> Result<(), CoreError> {
        self.version_check().await.map_err(|e| {
            tracing::error!(binary = %self.binary, error = %e, "Concatenation tool unavailable");
            CoreError::ToolUnavailable(format!("{} ({e})", self.binary))
        })
    }

    async fn concat(&self, clips: &[PathBuf], fps: u32, output: &Path) -> Result<(), CoreError> {
        tracing::info!(clips = clips.len(), fps, output = %output.display(), "Concatenating clips");
        self.run(clips, fps, output).await.map_err(CoreError::from)
    }
}

/// Concat-demuxer list file body. Single quotes are escaped per the
/// demuxer's quoting rules.
pub fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| {
            let escaped = clip.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

pub fn concat_args(list_path: &Path, fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.to_string_lossy().into_owned(),
        "-c:v".into(),
        VIDEO_CODEC.into(),
        "-pix_fmt".into(),
        PIXEL_FORMAT.into(),
        "-r".into(),
        fps.to_string(),
        "-vsync".into(),
        "cfr".into(),
        "-an".into(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn list_preserves_order_and_escapes_quotes() {
        let clips = vec![PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")];
        assert_eq!(
            concat_list(&clips),
            "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n"
        );
    }

    #[test]
    fn args_force_constant_rate_and_pixel_format() {
        let args = concat_args(Path::new("list.txt"), 16, Path::new("out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f concat"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-r 16"));
        assert!(joined.contains("-vsync cfr"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[tokio::test]
    async fn missing_binary_is_tool_unavailable() {
        let concat = FfmpegConcat::new("definitely-not-an-installed-ffmpeg");
        assert_matches!(concat.preflight().await, Err(CoreError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_clip_list_rejected() {
        let concat = FfmpegConcat::default();
        let dir = tempfile::tempdir().unwrap();
        let err = concat
            .concat(&[], 16, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Internal(_));
    }

    #[test]
    fn not_found_maps_to_tool_unavailable() {
        let err: CoreError =
            ConcatError::NotFound(std::io::Error::from(std::io::ErrorKind::NotFound)).into();
        assert_eq!(err.code().as_str(), "TOOL_UNAVAILABLE");
    }
}
