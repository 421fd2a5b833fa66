//! Loosely-specified user intent, as produced by argument parsing.

use serde::{Deserialize, Serialize};

/// Every option a caller may supply. Nothing here is validated; the
/// compiler turns it into canonical requests or a validation error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawOptions {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub video: bool,
    pub workflow: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub count: Option<u32>,
    pub seed: Option<u32>,
    pub seed_strategy: Option<String>,
    pub format: Option<String>,

    pub steps: Option<u32>,
    pub guidance: Option<f32>,
    pub sampler: Option<String>,
    pub scheduler: Option<String>,
    /// `id` or `id:strength`.
    pub loras: Vec<String>,

    pub start_frame: Option<String>,
    pub end_frame: Option<String>,
    pub audio: Option<String>,
    pub driving_video: Option<String>,
    pub context_images: Vec<String>,
    pub style_image: Option<String>,
    pub controlnet_image: Option<String>,

    pub frames: Option<u32>,
    pub fps: Option<u32>,
    pub duration_secs: Option<f32>,
    /// Adopt the suggested size instead of failing on a strict mismatch.
    pub auto_resize: bool,
    pub strict_size: bool,
    pub estimate_cost: bool,

    pub angle: Option<String>,
    pub elevation: Option<String>,
    pub distance: Option<String>,
    pub sweep_360: bool,
    pub stitch_video: bool,
    /// Video model used for stitched sweep segments.
    pub segment_model: Option<String>,
}

impl RawOptions {
    /// Command-line spellings of every scoped option that was supplied.
    pub fn supplied_flags(&self) -> Vec<&'static str> {
        let checks: [(&'static str, bool); 19] = [
            ("--workflow", self.workflow.is_some()),
            ("--start-frame", self.start_frame.is_some()),
            ("--end-frame", self.end_frame.is_some()),
            ("--audio", self.audio.is_some()),
            ("--driving-video", self.driving_video.is_some()),
            ("--auto-resize", self.auto_resize),
            ("--estimate-cost", self.estimate_cost),
            ("--frames", self.frames.is_some()),
            ("--fps", self.fps.is_some()),
            ("--duration", self.duration_secs.is_some()),
            ("--lora", !self.loras.is_empty()),
            ("--sampler", self.sampler.is_some()),
            ("--scheduler", self.scheduler.is_some()),
            ("--angle", self.angle.is_some()),
            ("--elevation", self.elevation.is_some()),
            ("--distance", self.distance.is_some()),
            ("--sweep-360", self.sweep_360),
            ("--stitch-video", self.stitch_video),
            ("--segment-model", self.segment_model.is_some()),
        ];
        checks
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(flag, _)| flag)
            .collect()
    }

    /// Whether any multi-angle option was given.
    pub fn is_angle_mode(&self) -> bool {
        self.angle.is_some() || self.sweep_360
    }
}
