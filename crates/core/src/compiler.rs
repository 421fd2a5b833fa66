//! Request compilation: loosely-specified [`RawOptions`] in, canonical
//! [`GenerationRequest`]s (or a compound plan) out.
//!
//! Validation order mirrors how a user reads the error: option scoping
//! first, then workflow selection, then references, then sizes. Either a
//! complete plan is returned or a single [`CoreError`]; never a partial
//! request.

use crate::angles::{
    self, AngleSpec, DEFAULT_AZIMUTH, DEFAULT_DISTANCE, DEFAULT_ELEVATION, MULTI_ANGLE_LORA_ID,
    MULTI_ANGLE_LORA_STRENGTH,
};
use crate::assets::AssetInspector;
use crate::dimensions::{
    self, DimensionSpec, ReferenceSize, MAX_IMAGE_DIMENSION, VIDEO_DIMENSION_MULTIPLE,
};
use crate::error::CoreError;
use crate::models;
use crate::options::RawOptions;
use crate::request::{AssetRef, GenerationRequest, LoraSpec, OutputFormat, Overrides};
use crate::seed::{self, SeedInputs, SeedStrategy};
use crate::types::{Seed, Size};
use crate::workflow::{self, ArtifactKind, AssetRole, WorkflowVariant};

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

pub const DEFAULT_FPS: u32 = 16;
pub const DEFAULT_MAX_UNITS: u32 = 8;

/// Frames per stitched segment when no frame or duration budget is given.
pub const DEFAULT_SEGMENT_FRAMES: u32 = 33;

/// Floor applied after dividing the budget across segments.
pub const MIN_SEGMENT_FRAMES: u32 = 17;

pub const DEFAULT_SEGMENT_PROMPT: &str =
    "smooth continuous camera orbit around the subject, consistent lighting and identity";

/// Largest side used for angle edits when the reference is oversized.
const ANGLE_IMAGE_BUDGET: u32 = 1536;

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Workflow used when neither flag, model, nor references decide it.
    pub default_workflow: WorkflowVariant,
    pub max_units: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_workflow: WorkflowVariant::TextToVideo,
            max_units: DEFAULT_MAX_UNITS,
        }
    }
}

/// Output of [`RequestCompiler::compile`].
#[derive(Debug, Clone)]
pub enum CompiledPlan {
    /// One request producing `count` units.
    Single(GenerationRequest),
    /// A video request to price, not to run.
    Estimate(GenerationRequest),
    /// Multi-angle set, optionally followed by a stitched 360 video.
    Compound(AnglePlan),
}

/// Seed selection shared by every stage of a compound plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedChoice {
    pub explicit: Option<Seed>,
    pub strategy: SeedStrategy,
}

/// Everything needed to compile each angle and segment request on demand.
#[derive(Debug, Clone)]
pub struct AnglePlan {
    pub reference: AssetRef,
    pub reference_size: Option<Size>,
    /// In sweep order.
    pub angles: Vec<AngleSpec>,
    pub model: String,
    pub user_prompt: Option<String>,
    pub requested_size: Option<Size>,
    pub count: u32,
    pub overrides: Overrides,
    pub loras: Vec<LoraSpec>,
    pub format: OutputFormat,
    pub seed: SeedChoice,
    pub stitch: Option<StitchPlan>,
}

/// Settings for the inter-angle interpolation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchPlan {
    pub model: String,
    /// Frame budget for the whole loop.
    pub total_frames: u32,
    pub fps: u32,
    pub prompt: String,
}

impl StitchPlan {
    pub fn segment_frames(&self, segments: usize) -> u32 {
        segment_frames(self.total_frames, segments)
    }
}

/// Divide a frame budget evenly across segments, never below the floor.
pub fn segment_frames(total_frames: u32, segments: usize) -> u32 {
    let segments = u32::try_from(segments.max(1)).unwrap_or(u32::MAX);
    (total_frames / segments).max(MIN_SEGMENT_FRAMES)
}

struct Inspected {
    asset: AssetRef,
    size: Option<Size>,
}

/* --------------------------------------------------------------------------
Compiler
-------------------------------------------------------------------------- */

pub struct RequestCompiler<'a> {
    inspector: &'a dyn AssetInspector,
    config: CompilerConfig,
}

impl<'a> RequestCompiler<'a> {
    pub fn new(inspector: &'a dyn AssetInspector) -> Self {
        Self::with_config(inspector, CompilerConfig::default())
    }

    pub fn with_config(inspector: &'a dyn AssetInspector, config: CompilerConfig) -> Self {
        Self { inspector, config }
    }

    /// Validate `raw` and produce a plan.
    pub fn compile(&self, raw: &RawOptions) -> Result<CompiledPlan, CoreError> {
        workflow::check_option_scopes(&raw.supplied_flags(), raw.video, raw.stitch_video)?;

        if raw.is_angle_mode() {
            return self.compile_angle_plan(raw).map(CompiledPlan::Compound);
        }
        if raw.stitch_video {
            return Err(CoreError::Validation(
                "--stitch-video requires --sweep-360".to_string(),
            ));
        }
        if raw.elevation.is_some() || raw.distance.is_some() {
            return Err(CoreError::Validation(
                "--elevation and --distance require --angle or --sweep-360".to_string(),
            ));
        }

        let request = self.compile_single(raw)?;
        if raw.estimate_cost {
            Ok(CompiledPlan::Estimate(request))
        } else {
            Ok(CompiledPlan::Single(request))
        }
    }

    fn compile_single(&self, raw: &RawOptions) -> Result<GenerationRequest, CoreError> {
        let prompt = required_prompt(raw)?;
        let kind = if raw.video {
            ArtifactKind::Video
        } else {
            ArtifactKind::Image
        };
        if let Some(model) = raw.model.as_deref() {
            check_model_kind(model, kind)?;
        }

        let inspected = self.collect_assets(raw)?;
        let roles: Vec<AssetRole> = inspected.iter().map(|i| i.asset.role).collect();

        let workflow = if raw.video {
            let variant = self.resolve_workflow(raw, &roles)?;
            workflow::check_roles(variant, &roles)?;
            Some(variant)
        } else {
            None
        };

        let context_count = roles
            .iter()
            .filter(|r| **r == AssetRole::ContextImage)
            .count();
        let model = match (raw.model.as_deref(), workflow) {
            (Some(model), _) => model.to_string(),
            (None, Some(variant)) => models::default_video_model(variant).to_string(),
            (None, None) if context_count > 0 => models::DEFAULT_EDIT_MODEL.to_string(),
            (None, None) => models::DEFAULT_IMAGE_MODEL.to_string(),
        };
        if context_count > 0 {
            models::check_context_capacity(&model, context_count)?;
        }

        if raw.estimate_cost && raw.steps.is_none() {
            return Err(CoreError::Validation(
                "--estimate-cost requires an explicit --steps value".to_string(),
            ));
        }

        let overrides = resolve_overrides(raw, &model, kind)?;
        let loras = parse_loras(&raw.loras)?;
        let count = self.parse_count(raw.count)?;
        let format = parse_format(raw.format.as_deref(), kind)?;

        let references: Vec<ReferenceSize> = inspected
            .iter()
            .filter(|i| matches!(i.asset.role, AssetRole::StartFrame | AssetRole::EndFrame))
            .filter_map(|i| {
                i.size.map(|size| ReferenceSize {
                    role: i.asset.role,
                    size,
                })
            })
            .collect();
        let dims = resolve_dimensions(
            kind,
            requested_size(raw)?,
            &references,
            raw.strict_size,
            raw.auto_resize,
        )?;

        let (frames, fps) = if raw.video {
            (resolve_frames(raw)?, raw.fps)
        } else {
            (None, None)
        };

        let assets: Vec<AssetRef> = inspected.into_iter().map(|i| i.asset).collect();
        let choice = seed_choice(raw)?;
        let (seed, seed_strategy) = assign_seed(
            choice,
            &SeedInputs {
                kind,
                workflow,
                model: &model,
                prompt: &prompt,
                width: dims.width,
                height: dims.height,
                steps: overrides.steps,
                guidance: overrides.guidance,
                sampler: overrides.sampler.as_deref(),
                scheduler: overrides.scheduler.as_deref(),
                loras: &loras,
                assets: identities(&assets),
                angle: None,
                format,
                frames,
                fps,
            },
        )?;

        tracing::debug!(
            kind = kind.as_str(),
            workflow = workflow.map(|w| w.as_str()),
            model = %model,
            width = dims.width,
            height = dims.height,
            seed,
            "Compiled generation request",
        );

        Ok(GenerationRequest {
            kind,
            workflow,
            model,
            prompt,
            dimensions: dims,
            count,
            seed,
            seed_strategy,
            format,
            overrides,
            assets,
            loras,
            frames,
            fps,
            angle: None,
        })
    }

    /// Explicit flag, then model naming convention, then references, then
    /// the configured default. A flag that contradicts the model is an error.
    fn resolve_workflow(
        &self,
        raw: &RawOptions,
        roles: &[AssetRole],
    ) -> Result<WorkflowVariant, CoreError> {
        let explicit = raw
            .workflow
            .as_deref()
            .map(WorkflowVariant::parse)
            .transpose()?;
        let from_model = raw.model.as_deref().and_then(models::infer_workflow);

        match (explicit, from_model) {
            (Some(flag), Some(model_variant)) if flag != model_variant => {
                Err(CoreError::Validation(format!(
                    "--workflow {flag} conflicts with model '{}', which implies {model_variant}",
                    raw.model.as_deref().unwrap_or_default()
                )))
            }
            (Some(flag), _) => Ok(flag),
            (None, Some(model_variant)) => Ok(model_variant),
            (None, None) => Ok(workflow::infer_from_roles(roles)
                .unwrap_or(self.config.default_workflow)),
        }
    }

    fn collect_assets(&self, raw: &RawOptions) -> Result<Vec<Inspected>, CoreError> {
        let mut supplied: Vec<(AssetRole, &str)> = Vec::new();
        let singles = [
            (AssetRole::StartFrame, raw.start_frame.as_deref()),
            (AssetRole::EndFrame, raw.end_frame.as_deref()),
            (AssetRole::Audio, raw.audio.as_deref()),
            (AssetRole::DrivingVideo, raw.driving_video.as_deref()),
        ];
        supplied.extend(singles.into_iter().filter_map(|(r, l)| l.map(|l| (r, l))));
        supplied.extend(
            raw.context_images
                .iter()
                .map(|l| (AssetRole::ContextImage, l.as_str())),
        );
        let styles = [
            (AssetRole::Style, raw.style_image.as_deref()),
            (AssetRole::ControlNet, raw.controlnet_image.as_deref()),
        ];
        supplied.extend(styles.into_iter().filter_map(|(r, l)| l.map(|l| (r, l))));

        supplied
            .into_iter()
            .map(|(role, locator)| self.inspect(role, locator))
            .collect()
    }

    fn inspect(&self, role: AssetRole, locator: &str) -> Result<Inspected, CoreError> {
        let info = self.inspector.inspect(locator, role)?;
        Ok(Inspected {
            asset: AssetRef {
                role,
                locator: locator.to_string(),
                identity: info.identity,
            },
            size: info.size,
        })
    }

    fn parse_count(&self, count: Option<u32>) -> Result<u32, CoreError> {
        let count = count.unwrap_or(1);
        if count == 0 || count > self.config.max_units {
            return Err(CoreError::Validation(format!(
                "--count must be between 1 and {} (got {count})",
                self.config.max_units
            )));
        }
        Ok(count)
    }

    /* ----------------------------------------------------------------------
    Compound plans
    ---------------------------------------------------------------------- */

    fn compile_angle_plan(&self, raw: &RawOptions) -> Result<AnglePlan, CoreError> {
        if raw.stitch_video && !raw.sweep_360 {
            return Err(CoreError::Validation(
                "--stitch-video requires --sweep-360".to_string(),
            ));
        }
        if raw.sweep_360 && raw.angle.is_some() {
            return Err(CoreError::Validation(
                "--angle and --sweep-360 are mutually exclusive".to_string(),
            ));
        }
        let count = self.parse_count(raw.count)?;
        if raw.sweep_360 && count != 1 {
            return Err(CoreError::Validation(format!(
                "--sweep-360 requires a single-unit count (got {count})"
            )));
        }
        if raw.style_image.is_some() || raw.controlnet_image.is_some() {
            return Err(CoreError::Validation(
                "Style and controlnet references are not supported for multi-angle edits"
                    .to_string(),
            ));
        }

        let reference = match raw.context_images.as_slice() {
            [one] => self.inspect(AssetRole::ContextImage, one)?,
            [] => {
                return Err(CoreError::Validation(
                    "Multi-angle editing requires a reference image (--image)".to_string(),
                ))
            }
            many => {
                return Err(CoreError::Validation(format!(
                    "Multi-angle editing takes exactly one reference image (got {})",
                    many.len()
                )))
            }
        };

        let model = raw
            .model
            .clone()
            .unwrap_or_else(|| models::DEFAULT_EDIT_MODEL.to_string());
        check_model_kind(&model, ArtifactKind::Image)?;
        models::check_context_capacity(&model, 1)?;

        let labels = angles::sweep_labels(
            raw.sweep_360,
            raw.angle.as_deref().unwrap_or(DEFAULT_AZIMUTH),
        )?;
        let elevation = raw.elevation.as_deref().unwrap_or(DEFAULT_ELEVATION);
        let distance = raw.distance.as_deref().unwrap_or(DEFAULT_DISTANCE);
        let angle_specs = labels
            .iter()
            .map(|label| AngleSpec::new(label, elevation, distance))
            .collect::<Result<Vec<_>, _>>()?;

        let mut loras = parse_loras(&raw.loras)?;
        let has_angle_lora = loras.iter().any(|l| l.id == MULTI_ANGLE_LORA_ID);
        if loras.is_empty() || (raw.stitch_video && !has_angle_lora) {
            loras.push(LoraSpec {
                id: MULTI_ANGLE_LORA_ID.to_string(),
                strength: MULTI_ANGLE_LORA_STRENGTH,
            });
        }

        let requested = requested_size(raw)?;
        if let Some(size) = requested {
            dimensions::validate_dimensions(size, MAX_IMAGE_DIMENSION)?;
        }

        let stitch = if raw.stitch_video {
            let model = raw.segment_model.clone().unwrap_or_else(|| {
                models::default_video_model(WorkflowVariant::ImageToVideo).to_string()
            });
            check_model_kind(&model, ArtifactKind::Video)?;
            let total_frames = resolve_frames(raw)?
                .unwrap_or(DEFAULT_SEGMENT_FRAMES * angle_specs.len() as u32);
            Some(StitchPlan {
                model,
                total_frames,
                fps: raw.fps.unwrap_or(DEFAULT_FPS),
                prompt: DEFAULT_SEGMENT_PROMPT.to_string(),
            })
        } else {
            None
        };

        Ok(AnglePlan {
            reference: reference.asset,
            reference_size: reference.size,
            angles: angle_specs,
            overrides: resolve_overrides(raw, &model, ArtifactKind::Image)?,
            model,
            user_prompt: raw.prompt.clone().filter(|p| !p.trim().is_empty()),
            requested_size: requested,
            count,
            loras,
            format: parse_format(raw.format.as_deref(), ArtifactKind::Image)?,
            seed: seed_choice(raw)?,
            stitch,
        })
    }

    /// Editing request for one angle of `plan`.
    pub fn compile_angle(
        &self,
        plan: &AnglePlan,
        angle: &AngleSpec,
    ) -> Result<GenerationRequest, CoreError> {
        let prompt = angle.prompt(plan.user_prompt.as_deref());
        let dims = match (plan.requested_size, plan.reference_size) {
            (Some(size), _) => dimensions::resolve(Some(size), &[], None, false)?,
            (None, Some(reference)) => {
                let size = if reference.width.max(reference.height) > ANGLE_IMAGE_BUDGET {
                    dimensions::fit_aspect(
                        ANGLE_IMAGE_BUDGET,
                        reference.aspect(),
                        VIDEO_DIMENSION_MULTIPLE,
                    )
                } else {
                    reference
                };
                DimensionSpec {
                    width: size.width,
                    height: size.height,
                    explicit: false,
                }
            }
            (None, None) => dimensions::resolve(None, &[], None, false)?,
        };

        let assets = vec![plan.reference.clone()];
        let (seed, seed_strategy) = assign_seed(
            plan.seed,
            &SeedInputs {
                kind: ArtifactKind::Image,
                workflow: None,
                model: &plan.model,
                prompt: &prompt,
                width: dims.width,
                height: dims.height,
                steps: plan.overrides.steps,
                guidance: plan.overrides.guidance,
                sampler: plan.overrides.sampler.as_deref(),
                scheduler: plan.overrides.scheduler.as_deref(),
                loras: &plan.loras,
                assets: identities(&assets),
                angle: Some(angle),
                format: plan.format,
                frames: None,
                fps: None,
            },
        )?;

        Ok(GenerationRequest {
            kind: ArtifactKind::Image,
            workflow: None,
            model: plan.model.clone(),
            prompt,
            dimensions: dims,
            count: plan.count,
            seed,
            seed_strategy,
            format: plan.format,
            overrides: plan.overrides.clone(),
            assets,
            loras: plan.loras.clone(),
            frames: None,
            fps: None,
            angle: Some(angle.clone()),
        })
    }

    /// Interpolation request between two consecutive angle frames.
    ///
    /// Frame files must already exist locally; their intrinsic size drives
    /// the video dimensions.
    pub fn compile_segment(
        &self,
        plan: &AnglePlan,
        stitch: &StitchPlan,
        start_frame: &str,
        end_frame: &str,
        segments: usize,
    ) -> Result<GenerationRequest, CoreError> {
        let start = self.inspect(AssetRole::StartFrame, start_frame)?;
        let end = self.inspect(AssetRole::EndFrame, end_frame)?;
        let variant = WorkflowVariant::ImageToVideo;
        workflow::check_roles(variant, &[start.asset.role, end.asset.role])?;

        let references: Vec<ReferenceSize> = [&start, &end]
            .iter()
            .filter_map(|i| {
                i.size.map(|size| ReferenceSize {
                    role: i.asset.role,
                    size,
                })
            })
            .collect();
        let dims = dimensions::resolve(None, &references, Some(VIDEO_DIMENSION_MULTIPLE), false)?;
        let frames = stitch.segment_frames(segments);
        let overrides = Overrides {
            steps: models::resolve_steps(None, &stitch.model, ArtifactKind::Video),
            guidance: models::resolve_guidance(None, &stitch.model, ArtifactKind::Video),
            sampler: None,
            scheduler: None,
        };
        let format = OutputFormat::Mp4;
        let assets = vec![start.asset, end.asset];

        let (seed, seed_strategy) = assign_seed(
            plan.seed,
            &SeedInputs {
                kind: ArtifactKind::Video,
                workflow: Some(variant),
                model: &stitch.model,
                prompt: &stitch.prompt,
                width: dims.width,
                height: dims.height,
                steps: overrides.steps,
                guidance: overrides.guidance,
                sampler: None,
                scheduler: None,
                loras: &[],
                assets: identities(&assets),
                angle: None,
                format,
                frames: Some(frames),
                fps: Some(stitch.fps),
            },
        )?;

        Ok(GenerationRequest {
            kind: ArtifactKind::Video,
            workflow: Some(variant),
            model: stitch.model.clone(),
            prompt: stitch.prompt.clone(),
            dimensions: dims,
            count: 1,
            seed,
            seed_strategy,
            format,
            overrides,
            assets,
            loras: Vec::new(),
            frames: Some(frames),
            fps: Some(stitch.fps),
            angle: None,
        })
    }
}

/* --------------------------------------------------------------------------
Helpers
-------------------------------------------------------------------------- */

fn required_prompt(raw: &RawOptions) -> Result<String, CoreError> {
    raw.prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation("A prompt is required".to_string()))
}

fn check_model_kind(model: &str, kind: ArtifactKind) -> Result<(), CoreError> {
    match models::infer_kind(model) {
        Some(model_kind) if model_kind != kind => Err(CoreError::Validation(format!(
            "Model '{model}' generates {}s but a {} was requested{}",
            model_kind.as_str(),
            kind.as_str(),
            if model_kind == ArtifactKind::Video {
                " (pass --video)"
            } else {
                ""
            }
        ))),
        _ => Ok(()),
    }
}

fn requested_size(raw: &RawOptions) -> Result<Option<Size>, CoreError> {
    match (raw.width, raw.height) {
        (Some(w), Some(h)) => Ok(Some(Size::new(w, h))),
        (None, None) => Ok(None),
        _ => Err(CoreError::Validation(
            "--width and --height must be given together".to_string(),
        )),
    }
}

fn resolve_overrides(
    raw: &RawOptions,
    model: &str,
    kind: ArtifactKind,
) -> Result<Overrides, CoreError> {
    if raw.steps == Some(0) {
        return Err(CoreError::Validation("--steps must be at least 1".to_string()));
    }
    if let Some(guidance) = raw.guidance {
        if !guidance.is_finite() || guidance < 0.0 {
            return Err(CoreError::Validation(format!(
                "--guidance must be a non-negative number (got {guidance})"
            )));
        }
    }
    Ok(Overrides {
        steps: models::resolve_steps(raw.steps, model, kind),
        guidance: models::resolve_guidance(raw.guidance, model, kind),
        sampler: raw.sampler.clone(),
        scheduler: raw.scheduler.clone(),
    })
}

fn parse_loras(specs: &[String]) -> Result<Vec<LoraSpec>, CoreError> {
    specs.iter().map(|s| LoraSpec::parse(s)).collect()
}

fn parse_format(name: Option<&str>, kind: ArtifactKind) -> Result<OutputFormat, CoreError> {
    let Some(name) = name else {
        return Ok(OutputFormat::default_for(kind));
    };
    let format = OutputFormat::parse(name)?;
    if format.kind() != kind {
        return Err(CoreError::Validation(format!(
            "Output format '{}' is not valid for {} artifacts",
            format.extension(),
            kind.as_str()
        )));
    }
    Ok(format)
}

/// Explicit frame count, or duration converted at the requested rate.
fn resolve_frames(raw: &RawOptions) -> Result<Option<u32>, CoreError> {
    if raw.frames == Some(0) {
        return Err(CoreError::Validation("--frames must be at least 1".to_string()));
    }
    if raw.fps == Some(0) {
        return Err(CoreError::Validation("--fps must be at least 1".to_string()));
    }
    match (raw.frames, raw.duration_secs) {
        (Some(_), Some(_)) => Err(CoreError::Validation(
            "--frames and --duration are mutually exclusive".to_string(),
        )),
        (Some(frames), None) => Ok(Some(frames)),
        (None, Some(secs)) if secs.is_finite() && secs > 0.0 => {
            let fps = raw.fps.unwrap_or(DEFAULT_FPS);
            Ok(Some(((secs * fps as f32).round() as u32).max(1)))
        }
        (None, Some(secs)) => Err(CoreError::Validation(format!(
            "--duration must be positive (got {secs})"
        ))),
        (None, None) => Ok(None),
    }
}

fn resolve_dimensions(
    kind: ArtifactKind,
    requested: Option<Size>,
    references: &[ReferenceSize],
    strict: bool,
    auto_resize: bool,
) -> Result<DimensionSpec, CoreError> {
    let constraint = (kind == ArtifactKind::Video).then_some(VIDEO_DIMENSION_MULTIPLE);
    match dimensions::resolve(requested, references, constraint, strict) {
        Err(CoreError::InvalidVideoSize {
            details: Some(details),
            message,
            ..
        }) if auto_resize => {
            let suggested: Size = serde_json::from_value(details["suggested"].clone())
                .map_err(|e| CoreError::Internal(format!("malformed size suggestion: {e}")))?;
            tracing::warn!(reason = %message, resolved = %suggested, "Auto-resized video");
            // The suggestion must satisfy every reference, not only the one
            // that triggered it.
            dimensions::resolve(Some(suggested), references, constraint, strict)
        }
        other => other,
    }
}

fn seed_choice(raw: &RawOptions) -> Result<SeedChoice, CoreError> {
    let strategy = raw
        .seed_strategy
        .as_deref()
        .map(SeedStrategy::parse)
        .transpose()?
        .unwrap_or_default();
    Ok(SeedChoice {
        explicit: raw.seed,
        strategy,
    })
}

fn assign_seed(
    choice: SeedChoice,
    inputs: &SeedInputs<'_>,
) -> Result<(Seed, SeedStrategy), CoreError> {
    match choice.explicit {
        Some(seed) => Ok((seed, SeedStrategy::Fixed)),
        None => Ok((seed::derive_seed(choice.strategy, inputs)?, choice.strategy)),
    }
}

fn identities(assets: &[AssetRef]) -> Vec<(AssetRole, &str)> {
    assets
        .iter()
        .map(|a| (a.role, a.identity.as_str()))
        .collect()
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::assets::AssetInfo;
    use crate::request::SubmissionKind;

    /// In-memory inspector: known locators resolve, everything else is missing.
    #[derive(Default)]
    struct FakeInspector {
        assets: HashMap<String, Option<Size>>,
    }

    impl FakeInspector {
        fn with(mut self, locator: &str, size: Option<Size>) -> Self {
            self.assets.insert(locator.to_string(), size);
            self
        }
    }

    impl AssetInspector for FakeInspector {
        fn inspect(&self, locator: &str, role: AssetRole) -> Result<AssetInfo, CoreError> {
            match self.assets.get(locator) {
                Some(size) => Ok(AssetInfo {
                    identity: format!("id:{locator}"),
                    size: *size,
                }),
                None => Err(CoreError::ResourceNotFound(format!(
                    "{locator} ({})",
                    role.as_str()
                ))),
            }
        }
    }

    fn inspector() -> FakeInspector {
        FakeInspector::default()
            .with("portrait.png", Some(Size::new(1170, 1200)))
            .with("wide.png", Some(Size::new(1920, 1080)))
            .with("end.png", Some(Size::new(1170, 1200)))
            .with("voice.wav", None)
            .with("dance.mp4", None)
            .with("a.png", Some(Size::new(1024, 1024)))
            .with("b.png", Some(Size::new(1024, 1024)))
            .with("c.png", Some(Size::new(1024, 1024)))
            .with("d.png", Some(Size::new(1024, 1024)))
    }

    fn prompt(text: &str) -> RawOptions {
        RawOptions {
            prompt: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn single(plan: CompiledPlan) -> GenerationRequest {
        match plan {
            CompiledPlan::Single(request) => request,
            other => panic!("Expected Single, got {other:?}"),
        }
    }

    // -- simple images --

    #[test]
    fn default_image_request() {
        let fake = inspector();
        let compiler = RequestCompiler::new(&fake);
        let request = single(compiler.compile(&prompt("a lighthouse")).unwrap());

        assert_eq!(request.kind(), ArtifactKind::Image);
        assert_eq!((request.width(), request.height()), (512, 512));
        assert!(!request.dimensions().explicit);
        assert_eq!(request.seed_strategy(), SeedStrategy::PromptHash);
        assert_eq!(request.model(), models::DEFAULT_IMAGE_MODEL);
        assert_eq!(request.submission(), SubmissionKind::Image);

        let again = single(compiler.compile(&prompt("a lighthouse")).unwrap());
        assert_eq!(request.seed(), again.seed());
    }

    #[test]
    fn explicit_seed_is_fixed() {
        let fake = inspector();
        let raw = RawOptions {
            seed: Some(42),
            ..prompt("x")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(request.seed(), 42);
        assert_eq!(request.seed_strategy(), SeedStrategy::Fixed);
    }

    #[test]
    fn random_strategy_draws_fresh_seeds() {
        let fake = inspector();
        let compiler = RequestCompiler::new(&fake);
        let hashed = single(compiler.compile(&prompt("a lighthouse")).unwrap()).seed();
        let raw = RawOptions {
            seed_strategy: Some("random".into()),
            ..prompt("a lighthouse")
        };

        let seeds: Vec<Seed> = (0..4)
            .map(|_| {
                let request = single(compiler.compile(&raw).unwrap());
                assert_eq!(request.seed_strategy(), SeedStrategy::Random);
                request.seed()
            })
            .collect();
        // Independent 32-bit draws; all four landing on one value is not a
        // realistic outcome.
        assert!(seeds.iter().any(|s| *s != hashed));
        assert!(seeds.iter().any(|s| *s != seeds[0]));
    }

    #[test]
    fn missing_prompt_rejected() {
        let fake = inspector();
        assert_matches!(
            RequestCompiler::new(&fake).compile(&RawOptions::default()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn context_images_route_to_edit_model() {
        let fake = inspector();
        let raw = RawOptions {
            context_images: vec!["a.png".into(), "b.png".into()],
            ..prompt("make it night")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(request.model(), models::DEFAULT_EDIT_MODEL);
        assert_eq!(request.submission(), SubmissionKind::Edit);
        assert_eq!(request.assets().len(), 2);
    }

    #[test]
    fn capacity_exceeded_cites_limit_and_count() {
        let fake = inspector();
        let raw = RawOptions {
            model: Some(models::DEFAULT_EDIT_MODEL.into()),
            context_images: vec!["a.png".into(), "b.png".into(), "c.png".into(), "d.png".into()],
            ..prompt("merge")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        let msg = err.to_string();
        assert!(msg.contains("at most 3"), "{msg}");
        assert!(msg.contains("4 were supplied"), "{msg}");
    }

    #[test]
    fn missing_reference_is_resource_not_found() {
        let fake = inspector();
        let raw = RawOptions {
            context_images: vec!["ghost.png".into()],
            ..prompt("x")
        };
        assert_matches!(
            RequestCompiler::new(&fake).compile(&raw),
            Err(CoreError::ResourceNotFound(_))
        );
    }

    #[test]
    fn video_only_option_without_video_rejected() {
        let fake = inspector();
        let raw = RawOptions {
            frames: Some(49),
            ..prompt("x")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert!(err.to_string().contains("--frames"));
    }

    #[test]
    fn image_format_checked_against_kind() {
        let fake = inspector();
        let raw = RawOptions {
            format: Some("mp4".into()),
            ..prompt("x")
        };
        assert_matches!(
            RequestCompiler::new(&fake).compile(&raw),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn count_bounds_enforced() {
        let fake = inspector();
        let raw = RawOptions {
            count: Some(9),
            ..prompt("x")
        };
        assert!(RequestCompiler::new(&fake).compile(&raw).is_err());
        let raw = RawOptions {
            count: Some(4),
            ..prompt("x")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(request.count(), 4);
    }

    // -- videos --

    fn video(text: &str) -> RawOptions {
        RawOptions {
            video: true,
            ..prompt(text)
        }
    }

    #[test]
    fn video_size_corrected_in_non_strict_mode() {
        let fake = inspector();
        let raw = RawOptions {
            width: Some(500),
            height: Some(512),
            ..video("waves")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!((request.width(), request.height()), (496, 512));
        assert_eq!(request.workflow(), Some(WorkflowVariant::TextToVideo));
        assert_eq!(request.submission(), SubmissionKind::Video);
    }

    #[test]
    fn strict_mismatch_with_start_frame() {
        let fake = inspector();
        let raw = RawOptions {
            width: Some(512),
            height: Some(512),
            strict_size: true,
            start_frame: Some("portrait.png".into()),
            ..video("turn head")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_VIDEO_SIZE");
        assert_eq!(err.hint(), Some("--width 496 --height 512"));
    }

    #[test]
    fn auto_resize_adopts_suggestion() {
        let fake = inspector();
        let raw = RawOptions {
            width: Some(512),
            height: Some(512),
            strict_size: true,
            auto_resize: true,
            start_frame: Some("portrait.png".into()),
            ..video("turn head")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!((request.width(), request.height()), (496, 512));
    }

    #[test]
    fn auto_resize_never_adopts_a_mismatched_size() {
        let fake = inspector();
        let raw = RawOptions {
            width: Some(320),
            height: Some(320),
            strict_size: true,
            auto_resize: true,
            start_frame: Some("portrait.png".into()),
            ..video("turn head")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!((request.width(), request.height()), (352, 368));
    }

    #[test]
    fn start_frame_drives_default_video_size() {
        let fake = inspector();
        let raw = RawOptions {
            start_frame: Some("portrait.png".into()),
            ..video("turn head")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(request.workflow(), Some(WorkflowVariant::ImageToVideo));
        assert_eq!(request.model(), "wan2.2-i2v");
        assert_eq!((request.width(), request.height()), (800, 816));
    }

    #[test]
    fn audio_rejected_for_image_to_video() {
        let fake = inspector();
        let raw = RawOptions {
            workflow: Some("i2v".into()),
            start_frame: Some("portrait.png".into()),
            audio: Some("voice.wav".into()),
            ..video("sing")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert!(err.to_string().contains("image-to-video"));
    }

    #[test]
    fn sound_to_video_requires_audio() {
        let fake = inspector();
        let raw = RawOptions {
            workflow: Some("sound-to-video".into()),
            start_frame: Some("portrait.png".into()),
            ..video("sing")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert!(err.to_string().contains("audio"));
    }

    #[test]
    fn workflow_inferred_from_model_name() {
        let fake = inspector();
        let raw = RawOptions {
            model: Some("wan2.2-animate-replace".into()),
            start_frame: Some("portrait.png".into()),
            driving_video: Some("dance.mp4".into()),
            ..video("dance")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(
            request.workflow(),
            Some(WorkflowVariant::MotionTransferReplace)
        );
    }

    #[test]
    fn explicit_workflow_conflicting_with_model_rejected() {
        let fake = inspector();
        let raw = RawOptions {
            model: Some("wan2.2-i2v".into()),
            workflow: Some("t2v".into()),
            ..video("x")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert!(err.to_string().contains("conflicts"));
    }

    #[test]
    fn workflow_inferred_from_references() {
        let fake = inspector();
        let raw = RawOptions {
            start_frame: Some("portrait.png".into()),
            audio: Some("voice.wav".into()),
            ..video("sing")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(request.workflow(), Some(WorkflowVariant::SoundToVideo));
    }

    #[test]
    fn editing_options_rejected_for_video() {
        let fake = inspector();
        let raw = RawOptions {
            loras: vec!["detail".into()],
            ..video("x")
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert!(err.to_string().contains("--lora"));
    }

    #[test]
    fn image_model_with_video_flag_rejected() {
        let fake = inspector();
        let raw = RawOptions {
            model: Some("flux-dev".into()),
            ..video("x")
        };
        assert_matches!(
            RequestCompiler::new(&fake).compile(&raw),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn estimate_requires_explicit_steps() {
        let fake = inspector();
        let raw = RawOptions {
            estimate_cost: true,
            ..video("x")
        };
        assert!(RequestCompiler::new(&fake).compile(&raw).is_err());

        let raw = RawOptions {
            estimate_cost: true,
            steps: Some(20),
            ..video("x")
        };
        assert_matches!(
            RequestCompiler::new(&fake).compile(&raw).unwrap(),
            CompiledPlan::Estimate(r) if r.overrides().steps == 20
        );
    }

    #[test]
    fn duration_converted_to_frames() {
        let fake = inspector();
        let raw = RawOptions {
            duration_secs: Some(3.0),
            fps: Some(24),
            ..video("x")
        };
        let request = single(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert_eq!(request.frames(), Some(72));
        assert_eq!(request.fps(), Some(24));
    }

    // -- compound --

    fn sweep() -> RawOptions {
        RawOptions {
            sweep_360: true,
            context_images: vec!["portrait.png".into()],
            ..Default::default()
        }
    }

    fn compound(plan: CompiledPlan) -> AnglePlan {
        match plan {
            CompiledPlan::Compound(plan) => plan,
            other => panic!("Expected Compound, got {other:?}"),
        }
    }

    #[test]
    fn sweep_plans_eight_angles_with_default_lora() {
        let fake = inspector();
        let plan = compound(RequestCompiler::new(&fake).compile(&sweep()).unwrap());
        assert_eq!(plan.angles.len(), 8);
        assert_eq!(plan.model, models::DEFAULT_EDIT_MODEL);
        assert_eq!(plan.loras[0].id, MULTI_ANGLE_LORA_ID);
        assert!(plan.stitch.is_none());
    }

    #[test]
    fn sweep_requires_single_unit() {
        let fake = inspector();
        let raw = RawOptions {
            count: Some(2),
            ..sweep()
        };
        let err = RequestCompiler::new(&fake).compile(&raw).unwrap_err();
        assert!(err.to_string().contains("single-unit"));
    }

    #[test]
    fn stitch_forces_angle_lora_and_frame_budget() {
        let fake = inspector();
        let raw = RawOptions {
            stitch_video: true,
            loras: vec!["film-grain:0.5".into()],
            ..sweep()
        };
        let plan = compound(RequestCompiler::new(&fake).compile(&raw).unwrap());
        assert!(plan.loras.iter().any(|l| l.id == MULTI_ANGLE_LORA_ID));
        assert!(plan.loras.iter().any(|l| l.id == "film-grain"));
        let stitch = plan.stitch.expect("stitch plan");
        assert_eq!(stitch.total_frames, DEFAULT_SEGMENT_FRAMES * 8);
        assert_eq!(stitch.segment_frames(8), DEFAULT_SEGMENT_FRAMES);
    }

    #[test]
    fn stitch_without_sweep_rejected() {
        let fake = inspector();
        let raw = RawOptions {
            stitch_video: true,
            ..prompt("x")
        };
        assert!(RequestCompiler::new(&fake).compile(&raw).is_err());
    }

    #[test]
    fn segment_model_without_stitch_rejected() {
        let fake = inspector();
        let compiler = RequestCompiler::new(&fake);
        let sweep_only = RawOptions {
            segment_model: Some("wan-i2v".into()),
            ..sweep()
        };
        let err = compiler.compile(&sweep_only).unwrap_err();
        assert!(err.to_string().contains("--segment-model"));

        let plain_video = RawOptions {
            segment_model: Some("wan-i2v".into()),
            ..video("surf")
        };
        assert_matches!(compiler.compile(&plain_video), Err(CoreError::Validation(_)));
    }

    #[test]
    fn angle_requests_are_independent_and_deterministic() {
        let fake = inspector();
        let compiler = RequestCompiler::new(&fake);
        let plan = compound(compiler.compile(&sweep()).unwrap());

        let front = compiler.compile_angle(&plan, &plan.angles[0]).unwrap();
        let back = compiler.compile_angle(&plan, &plan.angles[4]).unwrap();
        assert!(front.prompt().starts_with("<sks> front view"));
        assert!(back.prompt().contains("back view"));
        assert_ne!(front.seed(), back.seed());
        assert_eq!(front.submission(), SubmissionKind::Edit);
        assert_eq!((front.width(), front.height()), (1170, 1200));

        let again = compiler.compile_angle(&plan, &plan.angles[0]).unwrap();
        assert_eq!(front, again);
    }

    #[test]
    fn segment_interpolates_between_frames() {
        let fake = inspector();
        let compiler = RequestCompiler::new(&fake);
        let raw = RawOptions {
            stitch_video: true,
            frames: Some(100),
            ..sweep()
        };
        let plan = compound(compiler.compile(&raw).unwrap());
        let stitch = plan.stitch.clone().unwrap();
        let segment = compiler
            .compile_segment(&plan, &stitch, "portrait.png", "end.png", 8)
            .unwrap();
        assert_eq!(segment.workflow(), Some(WorkflowVariant::ImageToVideo));
        assert_eq!(segment.frames(), Some(MIN_SEGMENT_FRAMES));
        assert_eq!(segment.width() % VIDEO_DIMENSION_MULTIPLE, 0);
        assert!(segment.asset(AssetRole::EndFrame).is_some());
    }

    #[test]
    fn segment_frames_divide_evenly_with_floor() {
        assert_eq!(segment_frames(240, 8), 30);
        assert_eq!(segment_frames(40, 8), MIN_SEGMENT_FRAMES);
        assert_eq!(segment_frames(50, 0), 50);
    }
}
