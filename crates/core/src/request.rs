//! The canonical, immutable job specification handed to the orchestrator.

use serde::{Deserialize, Serialize};

use crate::angles::AngleSpec;
use crate::dimensions::DimensionSpec;
use crate::error::CoreError;
use crate::seed::SeedStrategy;
use crate::types::Seed;
use crate::workflow::{ArtifactKind, AssetRole, WorkflowVariant};

/* --------------------------------------------------------------------------
LoRA
-------------------------------------------------------------------------- */

pub const DEFAULT_LORA_STRENGTH: f32 = 1.0;
pub const MAX_LORA_STRENGTH: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraSpec {
    pub id: String,
    pub strength: f32,
}

impl LoraSpec {
    /// Parse `id` or `id:strength`.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let (id, strength) = match spec.rsplit_once(':') {
            Some((id, raw)) => {
                let strength: f32 = raw.trim().parse().map_err(|_| {
                    CoreError::Validation(format!("Invalid LoRA strength in '{spec}'"))
                })?;
                (id.trim(), strength)
            }
            None => (spec.trim(), DEFAULT_LORA_STRENGTH),
        };
        if id.is_empty() {
            return Err(CoreError::Validation(format!("Missing LoRA id in '{spec}'")));
        }
        if !(0.0..=MAX_LORA_STRENGTH).contains(&strength) {
            return Err(CoreError::Validation(format!(
                "LoRA strength must be between 0 and {MAX_LORA_STRENGTH} (got {strength})"
            )));
        }
        Ok(Self {
            id: id.to_string(),
            strength,
        })
    }
}

/* --------------------------------------------------------------------------
Output format
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
    Mp4,
    Webm,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            other => Err(CoreError::Validation(format!(
                "Unknown output format '{other}'. Valid formats: png, jpeg, webp, mp4, webm"
            ))),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Png | Self::Jpeg | Self::Webp => ArtifactKind::Image,
            Self::Mp4 | Self::Webm => ArtifactKind::Video,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    pub fn default_for(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Image => Self::Png,
            ArtifactKind::Video => Self::Mp4,
        }
    }
}

/* --------------------------------------------------------------------------
Reference assets
-------------------------------------------------------------------------- */

/// A reference asset tagged with the role it plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub role: AssetRole,
    /// Local path or URL, as supplied.
    pub locator: String,
    /// Content hash for local files, the URL for remote ones.
    pub identity: String,
}

/// Per-model sampling overrides after default resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub steps: u32,
    pub guidance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
}

/// Which submission entry point of the generation client a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Image,
    Edit,
    Video,
}

/* --------------------------------------------------------------------------
GenerationRequest
-------------------------------------------------------------------------- */

/// One complete, validated job specification.
///
/// Only the compiler constructs requests, and nothing mutates them
/// afterwards: role/workflow compatibility holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub(crate) kind: ArtifactKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) workflow: Option<WorkflowVariant>,
    pub(crate) model: String,
    pub(crate) prompt: String,
    pub(crate) dimensions: DimensionSpec,
    pub(crate) count: u32,
    pub(crate) seed: Seed,
    pub(crate) seed_strategy: SeedStrategy,
    pub(crate) format: OutputFormat,
    pub(crate) overrides: Overrides,
    pub(crate) assets: Vec<AssetRef>,
    pub(crate) loras: Vec<LoraSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) angle: Option<AngleSpec>,
}

impl GenerationRequest {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn workflow(&self) -> Option<WorkflowVariant> {
        self.workflow
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn dimensions(&self) -> DimensionSpec {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Number of units (artifacts) this request produces.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn seed_strategy(&self) -> SeedStrategy {
        self.seed_strategy
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn assets(&self) -> &[AssetRef] {
        &self.assets
    }

    pub fn asset(&self, role: AssetRole) -> Option<&AssetRef> {
        self.assets.iter().find(|a| a.role == role)
    }

    pub fn loras(&self) -> &[LoraSpec] {
        &self.loras
    }

    pub fn frames(&self) -> Option<u32> {
        self.frames
    }

    pub fn fps(&self) -> Option<u32> {
        self.fps
    }

    pub fn angle(&self) -> Option<&AngleSpec> {
        self.angle.as_ref()
    }

    /// Entry point on the generation client: videos go to the video
    /// endpoint, images with context references to the edit endpoint.
    pub fn submission(&self) -> SubmissionKind {
        match self.kind {
            ArtifactKind::Video => SubmissionKind::Video,
            ArtifactKind::Image if self.asset(AssetRole::ContextImage).is_some() => {
                SubmissionKind::Edit
            }
            ArtifactKind::Image => SubmissionKind::Image,
        }
    }
}
