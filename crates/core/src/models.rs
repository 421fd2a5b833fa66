//! Model catalog: per-model defaults, capacities, and naming conventions.

use crate::error::CoreError;
use crate::workflow::{ArtifactKind, WorkflowVariant, ALL_WORKFLOWS};

/* --------------------------------------------------------------------------
Catalog
-------------------------------------------------------------------------- */

/// Static description of one known model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub id: &'static str,
    pub kind: ArtifactKind,
    /// Workflow this model is dedicated to, if any.
    pub workflow: Option<WorkflowVariant>,
    pub default_steps: u32,
    pub default_guidance: f32,
    /// Maximum number of edit-context images; 0 means the model cannot edit.
    pub max_context_images: usize,
}

pub const MODEL_CATALOG: &[ModelProfile] = &[
    ModelProfile {
        id: "flux-dev",
        kind: ArtifactKind::Image,
        workflow: None,
        default_steps: 28,
        default_guidance: 3.5,
        max_context_images: 0,
    },
    ModelProfile {
        id: "flux-schnell",
        kind: ArtifactKind::Image,
        workflow: None,
        default_steps: 4,
        default_guidance: 1.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "sdxl",
        kind: ArtifactKind::Image,
        workflow: None,
        default_steps: 30,
        default_guidance: 7.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "flux-kontext",
        kind: ArtifactKind::Image,
        workflow: None,
        default_steps: 28,
        default_guidance: 2.5,
        max_context_images: 1,
    },
    ModelProfile {
        id: "qwen-image-edit-2509",
        kind: ArtifactKind::Image,
        workflow: None,
        default_steps: 30,
        default_guidance: 4.0,
        max_context_images: 3,
    },
    ModelProfile {
        id: "wan2.2-t2v",
        kind: ArtifactKind::Video,
        workflow: Some(WorkflowVariant::TextToVideo),
        default_steps: 30,
        default_guidance: 5.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "wan2.2-i2v",
        kind: ArtifactKind::Video,
        workflow: Some(WorkflowVariant::ImageToVideo),
        default_steps: 30,
        default_guidance: 5.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "wan2.2-s2v",
        kind: ArtifactKind::Video,
        workflow: Some(WorkflowVariant::SoundToVideo),
        default_steps: 40,
        default_guidance: 4.5,
        max_context_images: 0,
    },
    ModelProfile {
        id: "wan2.2-animate-move",
        kind: ArtifactKind::Video,
        workflow: Some(WorkflowVariant::MotionTransferMove),
        default_steps: 20,
        default_guidance: 1.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "wan2.2-animate-replace",
        kind: ArtifactKind::Video,
        workflow: Some(WorkflowVariant::MotionTransferReplace),
        default_steps: 20,
        default_guidance: 1.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "wan2.2-v2v",
        kind: ArtifactKind::Video,
        workflow: Some(WorkflowVariant::VideoToVideo),
        default_steps: 30,
        default_guidance: 5.0,
        max_context_images: 0,
    },
    ModelProfile {
        id: "ltx-video",
        kind: ArtifactKind::Video,
        workflow: None,
        default_steps: 40,
        default_guidance: 3.0,
        max_context_images: 0,
    },
];

pub const DEFAULT_IMAGE_MODEL: &str = "flux-dev";
pub const DEFAULT_EDIT_MODEL: &str = "qwen-image-edit-2509";

/// Capacity assumed for edit-context images on models not in the catalog.
pub const UNKNOWN_MODEL_CONTEXT_CAPACITY: usize = 1;

/// Substrings marking distilled / few-step variants.
const FAST_MARKERS: &[&str] = &["schnell", "turbo", "lightning", "fast", "distill", "lcm"];

pub fn lookup(id: &str) -> Option<&'static ModelProfile> {
    MODEL_CATALOG.iter().find(|m| m.id == id)
}

/// Default video model for a workflow.
pub fn default_video_model(workflow: WorkflowVariant) -> &'static str {
    MODEL_CATALOG
        .iter()
        .find(|m| m.kind == ArtifactKind::Video && m.workflow == Some(workflow))
        .map(|m| m.id)
        .unwrap_or("wan2.2-t2v")
}

/* --------------------------------------------------------------------------
Naming conventions and heuristics
-------------------------------------------------------------------------- */

/// Infer the workflow from the model id, first via the catalog, then via
/// the `-<short-name>` suffix convention (e.g. `wan2.1-i2v-14b`).
pub fn infer_workflow(model_id: &str) -> Option<WorkflowVariant> {
    if let Some(profile) = lookup(model_id) {
        return profile.workflow;
    }
    let id = model_id.to_ascii_lowercase();
    // Longest names first so "animate-move" is not shadowed by shorter aliases.
    let mut candidates: Vec<WorkflowVariant> = ALL_WORKFLOWS.to_vec();
    candidates.sort_by_key(|w| std::cmp::Reverse(w.short_name().len()));
    candidates
        .into_iter()
        .find(|w| id.contains(&format!("-{}", w.short_name())))
}

/// Whether the id names a distilled / few-step variant.
pub fn is_fast_variant(model_id: &str) -> bool {
    let id = model_id.to_ascii_lowercase();
    FAST_MARKERS.iter().any(|m| id.contains(m))
}

/// Artifact kind implied by the model id, when it can be known.
pub fn infer_kind(model_id: &str) -> Option<ArtifactKind> {
    lookup(model_id)
        .map(|m| m.kind)
        .or_else(|| infer_workflow(model_id).map(|_| ArtifactKind::Video))
}

/// Resolve the step count: explicit wins, then the catalog, then family heuristics.
pub fn resolve_steps(explicit: Option<u32>, model_id: &str, kind: ArtifactKind) -> u32 {
    if let Some(steps) = explicit {
        return steps;
    }
    if let Some(profile) = lookup(model_id) {
        return profile.default_steps;
    }
    match (kind, is_fast_variant(model_id)) {
        (ArtifactKind::Image, true) => 4,
        (ArtifactKind::Image, false) => 28,
        (ArtifactKind::Video, true) => 8,
        (ArtifactKind::Video, false) => 30,
    }
}

/// Resolve guidance the same way as [`resolve_steps`].
pub fn resolve_guidance(explicit: Option<f32>, model_id: &str, kind: ArtifactKind) -> f32 {
    if let Some(guidance) = explicit {
        return guidance;
    }
    if let Some(profile) = lookup(model_id) {
        return profile.default_guidance;
    }
    match (kind, is_fast_variant(model_id)) {
        (_, true) => 1.0,
        (ArtifactKind::Image, false) => 3.5,
        (ArtifactKind::Video, false) => 5.0,
    }
}

/// Declared edit-context capacity for a model.
pub fn context_capacity(model_id: &str) -> usize {
    lookup(model_id)
        .map(|m| m.max_context_images)
        .unwrap_or(UNKNOWN_MODEL_CONTEXT_CAPACITY)
}

/// Reject more context images than the model accepts.
pub fn check_context_capacity(model_id: &str, supplied: usize) -> Result<(), CoreError> {
    let limit = context_capacity(model_id);
    if supplied > limit {
        return Err(CoreError::Validation(format!(
            "Model '{model_id}' accepts at most {limit} context image(s), but {supplied} were supplied"
        )));
    }
    Ok(())
}
