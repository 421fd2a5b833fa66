//! Command-line surface. Every generation flag maps 1:1 onto
//! [`RawOptions`]; validation happens in the compiler, not here.

use clap::Parser;
use orbit_core::options::RawOptions;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "orbit",
    version,
    about = "Generate images, videos and 360 turnarounds on a remote generation service"
)]
pub struct Cli {
    /// Text prompt.
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Model identifier; defaults depend on the artifact kind and workflow.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Generate a video instead of an image.
    #[arg(long)]
    pub video: bool,

    /// Video workflow (text-to-video, image-to-video, sound-to-video,
    /// motion-transfer-move, motion-transfer-replace, video-to-video).
    #[arg(long)]
    pub workflow: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Number of units to generate.
    #[arg(short = 'n', long)]
    pub count: Option<u32>,

    #[arg(long)]
    pub seed: Option<u32>,

    /// random | prompt-hash
    #[arg(long)]
    pub seed_strategy: Option<String>,

    /// Output format (png, jpeg, webp, mp4, webm).
    #[arg(long)]
    pub format: Option<String>,

    #[arg(long)]
    pub steps: Option<u32>,

    #[arg(long)]
    pub guidance: Option<f32>,

    #[arg(long)]
    pub sampler: Option<String>,

    #[arg(long)]
    pub scheduler: Option<String>,

    /// LoRA as `id` or `id:strength`. Repeatable.
    #[arg(long = "lora")]
    pub loras: Vec<String>,

    #[arg(long)]
    pub start_frame: Option<String>,

    #[arg(long)]
    pub end_frame: Option<String>,

    #[arg(long)]
    pub audio: Option<String>,

    #[arg(long)]
    pub driving_video: Option<String>,

    /// Edit-context image. Repeatable.
    #[arg(long = "image")]
    pub images: Vec<String>,

    #[arg(long)]
    pub style_image: Option<String>,

    #[arg(long)]
    pub controlnet_image: Option<String>,

    #[arg(long)]
    pub frames: Option<u32>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// Clip length in seconds; converted to frames at the target fps.
    #[arg(long)]
    pub duration: Option<f32>,

    /// Adopt the suggested size instead of failing on a strict mismatch.
    #[arg(long)]
    pub auto_resize: bool,

    /// Reject non-conforming video sizes instead of rounding them.
    #[arg(long)]
    pub strict_size: bool,

    /// Price the video request instead of running it.
    #[arg(long)]
    pub estimate_cost: bool,

    /// Single camera azimuth (front, front-right, right, ...).
    #[arg(long)]
    pub angle: Option<String>,

    /// low | eye | elevated | high
    #[arg(long)]
    pub elevation: Option<String>,

    /// close | medium | wide
    #[arg(long)]
    pub distance: Option<String>,

    /// Render all eight azimuths from the reference image.
    #[arg(long = "sweep-360")]
    pub sweep_360: bool,

    /// Interpolate between sweep angles and concatenate a looping video.
    #[arg(long)]
    pub stitch_video: bool,

    /// Video model for stitched segments.
    #[arg(long)]
    pub segment_model: Option<String>,

    /// Reuse the seed of the previous render.
    #[arg(long)]
    pub last_seed: bool,

    /// Use the previous render's image as an edit-context image.
    #[arg(long)]
    pub last_image: bool,

    /// Print machine-readable JSON payloads.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn options(&self) -> RawOptions {
        RawOptions {
            prompt: self.prompt.clone(),
            model: self.model.clone(),
            video: self.video,
            workflow: self.workflow.clone(),
            width: self.width,
            height: self.height,
            count: self.count,
            seed: self.seed,
            seed_strategy: self.seed_strategy.clone(),
            format: self.format.clone(),
            steps: self.steps,
            guidance: self.guidance,
            sampler: self.sampler.clone(),
            scheduler: self.scheduler.clone(),
            loras: self.loras.clone(),
            start_frame: self.start_frame.clone(),
            end_frame: self.end_frame.clone(),
            audio: self.audio.clone(),
            driving_video: self.driving_video.clone(),
            context_images: self.images.clone(),
            style_image: self.style_image.clone(),
            controlnet_image: self.controlnet_image.clone(),
            frames: self.frames,
            fps: self.fps,
            duration_secs: self.duration,
            auto_resize: self.auto_resize,
            strict_size: self.strict_size,
            estimate_cost: self.estimate_cost,
            angle: self.angle.clone(),
            elevation: self.elevation.clone(),
            distance: self.distance.clone(),
            sweep_360: self.sweep_360,
            stitch_video: self.stitch_video,
            segment_model: self.segment_model.clone(),
        }
    }
}
