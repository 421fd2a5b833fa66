//! Artifact kinds, video workflow variants, reference roles, and the
//! declarative compatibility tables the compiler validates against.
//!
//! New variants are added by extending [`ROLE_RULES`]; no branching in the
//! compiler needs to change.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Artifact kind
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/* --------------------------------------------------------------------------
Workflow variant
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowVariant {
    TextToVideo,
    ImageToVideo,
    SoundToVideo,
    MotionTransferMove,
    MotionTransferReplace,
    VideoToVideo,
}

/// All variants, in the order they are listed in error messages.
pub const ALL_WORKFLOWS: &[WorkflowVariant] = &[
    WorkflowVariant::TextToVideo,
    WorkflowVariant::ImageToVideo,
    WorkflowVariant::SoundToVideo,
    WorkflowVariant::MotionTransferMove,
    WorkflowVariant::MotionTransferReplace,
    WorkflowVariant::VideoToVideo,
];

impl WorkflowVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToVideo => "text-to-video",
            Self::ImageToVideo => "image-to-video",
            Self::SoundToVideo => "sound-to-video",
            Self::MotionTransferMove => "motion-transfer-move",
            Self::MotionTransferReplace => "motion-transfer-replace",
            Self::VideoToVideo => "video-to-video",
        }
    }

    /// Short alias accepted on the command line and used in model ids.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::TextToVideo => "t2v",
            Self::ImageToVideo => "i2v",
            Self::SoundToVideo => "s2v",
            Self::MotionTransferMove => "animate-move",
            Self::MotionTransferReplace => "animate-replace",
            Self::VideoToVideo => "v2v",
        }
    }

    /// Parse either the long or the short name.
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let needle = name.trim().to_ascii_lowercase();
        ALL_WORKFLOWS
            .iter()
            .copied()
            .find(|w| w.as_str() == needle || w.short_name() == needle)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown video workflow '{name}'. Valid workflows: {}",
                    ALL_WORKFLOWS
                        .iter()
                        .map(|w| w.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl std::fmt::Display for WorkflowVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --------------------------------------------------------------------------
Reference roles
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetRole {
    StartFrame,
    EndFrame,
    Audio,
    DrivingVideo,
    ContextImage,
    Style,
    ControlNet,
}

impl AssetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartFrame => "start frame",
            Self::EndFrame => "end frame",
            Self::Audio => "audio",
            Self::DrivingVideo => "driving video",
            Self::ContextImage => "context image",
            Self::Style => "style image",
            Self::ControlNet => "controlnet image",
        }
    }
}

/* --------------------------------------------------------------------------
Role compatibility table
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
    Forbidden,
}

/// `(variant, role, requirement)`. Pairs not listed are forbidden.
pub const ROLE_RULES: &[(WorkflowVariant, AssetRole, Requirement)] = &[
    (WorkflowVariant::ImageToVideo, AssetRole::StartFrame, Requirement::Required),
    (WorkflowVariant::ImageToVideo, AssetRole::EndFrame, Requirement::Optional),
    (WorkflowVariant::SoundToVideo, AssetRole::StartFrame, Requirement::Required),
    (WorkflowVariant::SoundToVideo, AssetRole::Audio, Requirement::Required),
    (WorkflowVariant::MotionTransferMove, AssetRole::StartFrame, Requirement::Required),
    (WorkflowVariant::MotionTransferMove, AssetRole::DrivingVideo, Requirement::Required),
    (WorkflowVariant::MotionTransferReplace, AssetRole::StartFrame, Requirement::Required),
    (WorkflowVariant::MotionTransferReplace, AssetRole::DrivingVideo, Requirement::Required),
    (WorkflowVariant::VideoToVideo, AssetRole::DrivingVideo, Requirement::Required),
];

const ALL_ROLES: &[AssetRole] = &[
    AssetRole::StartFrame,
    AssetRole::EndFrame,
    AssetRole::Audio,
    AssetRole::DrivingVideo,
    AssetRole::ContextImage,
    AssetRole::Style,
    AssetRole::ControlNet,
];

/// Look up how `variant` treats `role`.
pub fn requirement(variant: WorkflowVariant, role: AssetRole) -> Requirement {
    ROLE_RULES
        .iter()
        .find(|(v, r, _)| *v == variant && *r == role)
        .map(|(_, _, req)| *req)
        .unwrap_or(Requirement::Forbidden)
}

/// Check the set of supplied roles against the table for `variant`.
///
/// Forbidden roles are reported before missing required ones so that the
/// message names the reference the user should remove.
pub fn check_roles(variant: WorkflowVariant, present: &[AssetRole]) -> Result<(), CoreError> {
    for role in present {
        if requirement(variant, *role) == Requirement::Forbidden {
            return Err(CoreError::Validation(format!(
                "Workflow '{variant}' does not accept a {} reference",
                role.as_str()
            )));
        }
    }
    for role in ALL_ROLES {
        if requirement(variant, *role) == Requirement::Required && !present.contains(role) {
            return Err(CoreError::Validation(format!(
                "Workflow '{variant}' requires a {} reference",
                role.as_str()
            )));
        }
    }
    Ok(())
}

/// Infer a workflow from which roles were supplied.
///
/// The most specific matching variant wins: motion transfer needs both a
/// start frame and a driving video, sound-to-video needs audio, and so on.
pub fn infer_from_roles(present: &[AssetRole]) -> Option<WorkflowVariant> {
    let has = |r: AssetRole| present.contains(&r);
    if has(AssetRole::DrivingVideo) && has(AssetRole::StartFrame) {
        Some(WorkflowVariant::MotionTransferMove)
    } else if has(AssetRole::DrivingVideo) {
        Some(WorkflowVariant::VideoToVideo)
    } else if has(AssetRole::Audio) {
        Some(WorkflowVariant::SoundToVideo)
    } else if has(AssetRole::StartFrame) || has(AssetRole::EndFrame) {
        Some(WorkflowVariant::ImageToVideo)
    } else {
        None
    }
}

/* --------------------------------------------------------------------------
Option scope table
-------------------------------------------------------------------------- */

/// Which artifact shapes an option is legal for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    /// Only with the video flag.
    VideoOnly,
    /// With the video flag or when a stitched 360 video is requested.
    VideoOrStitch,
    /// Image editing only; rejected for video artifacts.
    EditOnly,
    /// Only when a stitched 360 video is requested.
    StitchOnly,
}

/// `(flag name, scope)`. Flag names match the command-line spelling.
pub const OPTION_SCOPES: &[(&str, OptionScope)] = &[
    ("--workflow", OptionScope::VideoOnly),
    ("--start-frame", OptionScope::VideoOnly),
    ("--end-frame", OptionScope::VideoOnly),
    ("--audio", OptionScope::VideoOnly),
    ("--driving-video", OptionScope::VideoOnly),
    ("--auto-resize", OptionScope::VideoOnly),
    ("--estimate-cost", OptionScope::VideoOnly),
    ("--frames", OptionScope::VideoOrStitch),
    ("--fps", OptionScope::VideoOrStitch),
    ("--duration", OptionScope::VideoOrStitch),
    ("--lora", OptionScope::EditOnly),
    ("--sampler", OptionScope::EditOnly),
    ("--scheduler", OptionScope::EditOnly),
    ("--angle", OptionScope::EditOnly),
    ("--elevation", OptionScope::EditOnly),
    ("--distance", OptionScope::EditOnly),
    ("--sweep-360", OptionScope::EditOnly),
    ("--stitch-video", OptionScope::EditOnly),
    ("--segment-model", OptionScope::StitchOnly),
];

/// Validate that every supplied flag is legal for the requested shape.
pub fn check_option_scopes(
    supplied: &[&str],
    video: bool,
    stitch: bool,
) -> Result<(), CoreError> {
    for flag in supplied {
        let Some((_, scope)) = OPTION_SCOPES.iter().find(|(name, _)| name == flag) else {
            continue;
        };
        match scope {
            OptionScope::VideoOnly if !video => {
                return Err(CoreError::Validation(format!(
                    "{flag} is only valid together with --video"
                )));
            }
            OptionScope::VideoOrStitch if !video && !stitch => {
                return Err(CoreError::Validation(format!(
                    "{flag} is only valid together with --video or --stitch-video"
                )));
            }
            OptionScope::EditOnly if video => {
                return Err(CoreError::Validation(format!(
                    "{flag} is an image-editing option and cannot be used with --video"
                )));
            }
            OptionScope::StitchOnly if !stitch => {
                return Err(CoreError::Validation(format!(
                    "{flag} is only valid together with --stitch-video"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn workflow_parses_long_and_short_names() {
        assert_eq!(
            WorkflowVariant::parse("image-to-video").unwrap(),
            WorkflowVariant::ImageToVideo
        );
        assert_eq!(WorkflowVariant::parse("S2V").unwrap(), WorkflowVariant::SoundToVideo);
        assert_matches!(WorkflowVariant::parse("zoom"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn image_to_video_rejects_audio_naming_the_variant() {
        let err = check_roles(
            WorkflowVariant::ImageToVideo,
            &[AssetRole::StartFrame, AssetRole::Audio],
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("image-to-video"), "{msg}");
        assert!(msg.contains("audio"), "{msg}");
    }

    #[test]
    fn sound_to_video_requires_both_frame_and_audio() {
        assert!(check_roles(WorkflowVariant::SoundToVideo, &[AssetRole::StartFrame]).is_err());
        assert!(check_roles(WorkflowVariant::SoundToVideo, &[AssetRole::Audio]).is_err());
        assert!(check_roles(
            WorkflowVariant::SoundToVideo,
            &[AssetRole::StartFrame, AssetRole::Audio]
        )
        .is_ok());
    }

    #[test]
    fn text_to_video_accepts_no_references() {
        assert!(check_roles(WorkflowVariant::TextToVideo, &[]).is_ok());
        assert!(check_roles(WorkflowVariant::TextToVideo, &[AssetRole::StartFrame]).is_err());
    }

    #[test]
    fn end_frame_is_optional_for_image_to_video() {
        assert_eq!(
            requirement(WorkflowVariant::ImageToVideo, AssetRole::EndFrame),
            Requirement::Optional
        );
        assert!(check_roles(
            WorkflowVariant::ImageToVideo,
            &[AssetRole::StartFrame, AssetRole::EndFrame]
        )
        .is_ok());
    }

    #[test]
    fn roles_infer_most_specific_workflow() {
        assert_eq!(
            infer_from_roles(&[AssetRole::StartFrame, AssetRole::DrivingVideo]),
            Some(WorkflowVariant::MotionTransferMove)
        );
        assert_eq!(
            infer_from_roles(&[AssetRole::DrivingVideo]),
            Some(WorkflowVariant::VideoToVideo)
        );
        assert_eq!(
            infer_from_roles(&[AssetRole::StartFrame, AssetRole::Audio]),
            Some(WorkflowVariant::SoundToVideo)
        );
        assert_eq!(infer_from_roles(&[]), None);
    }

    #[test]
    fn video_only_flags_need_video() {
        let err = check_option_scopes(&["--audio"], false, false).unwrap_err();
        assert!(err.to_string().contains("--audio"));
        assert!(check_option_scopes(&["--audio"], true, false).is_ok());
    }

    #[test]
    fn frames_allowed_for_stitched_sweeps() {
        assert!(check_option_scopes(&["--frames"], false, true).is_ok());
        assert!(check_option_scopes(&["--frames"], false, false).is_err());
    }

    #[test]
    fn editing_flags_rejected_for_video() {
        assert!(check_option_scopes(&["--lora"], true, false).is_err());
        assert!(check_option_scopes(&["--sampler"], false, false).is_ok());
    }

    #[test]
    fn segment_model_needs_stitching() {
        let err = check_option_scopes(&["--segment-model"], false, false).unwrap_err();
        assert!(err.to_string().contains("--stitch-video"));
        assert!(check_option_scopes(&["--segment-model"], true, false).is_err());
        assert!(check_option_scopes(&["--segment-model"], false, true).is_ok());
    }
}
