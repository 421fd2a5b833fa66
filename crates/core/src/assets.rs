//! Reference asset inspection: existence, identity, and intrinsic size.
//!
//! The compiler only sees assets through [`AssetInspector`], so tests can
//! substitute an in-memory inspector and the compiler stays free of I/O.

use std::io::Cursor;
use std::path::Path;

use crate::error::CoreError;
use crate::hashing::sha256_hex;
use crate::types::Size;
use crate::workflow::AssetRole;

/// What the compiler needs to know about one reference asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Stable identity fed into prompt-hash seeds.
    pub identity: String,
    /// Intrinsic pixel size, when the asset is a readable image.
    pub size: Option<Size>,
}

pub trait AssetInspector: Send + Sync {
    /// Inspect `locator`. Missing local files fail with
    /// [`CoreError::ResourceNotFound`].
    fn inspect(&self, locator: &str, role: AssetRole) -> Result<AssetInfo, CoreError>;
}

/// Whether a locator points at a remote asset rather than a local file.
pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

fn is_image_role(role: AssetRole) -> bool {
    !matches!(role, AssetRole::Audio | AssetRole::DrivingVideo)
}

/// Inspector backed by the local filesystem.
///
/// Remote URLs are taken at face value: their identity is the URL and
/// their size is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAssetInspector;

impl AssetInspector for FsAssetInspector {
    fn inspect(&self, locator: &str, role: AssetRole) -> Result<AssetInfo, CoreError> {
        if is_remote(locator) {
            return Ok(AssetInfo {
                identity: locator.to_string(),
                size: None,
            });
        }

        let path = Path::new(locator);
        if !path.is_file() {
            return Err(CoreError::ResourceNotFound(format!(
                "{locator} ({})",
                role.as_str()
            )));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| CoreError::Internal(format!("failed to read {locator}: {e}")))?;
        let size = if is_image_role(role) {
            read_image_size(&bytes)
        } else {
            None
        };
        if size.is_none() && is_image_role(role) {
            tracing::debug!(locator, "Could not read reference image size");
        }

        Ok(AssetInfo {
            identity: sha256_hex(&bytes),
            size,
        })
    }
}

/// Image dimensions read from the header alone.
pub fn read_image_size(bytes: &[u8]) -> Option<Size> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
        .map(|(w, h)| Size::new(w, h))
}
