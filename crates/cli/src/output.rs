//! Result reporting: canonical JSON payloads or plain text.
//!
//! Results go to stdout; logs stay on stderr. In plain mode a failure is a
//! single line on stderr.

use std::path::PathBuf;

use orbit_client::client::CostEstimate;
use orbit_core::error::{CoreError, ErrorPayload};
use orbit_core::request::GenerationRequest;
use orbit_core::seed::SeedStrategy;
use orbit_core::types::Seed;
use orbit_core::workflow::{ArtifactKind, WorkflowVariant};
use orbit_pipeline::compound::{AngleResult, CompoundResult, SegmentResult};
use orbit_pipeline::orchestrator::JobOutcome;
use serde::Serialize;

/// What a successful invocation produced.
#[derive(Debug)]
pub enum RunReport {
    Render {
        request: GenerationRequest,
        outcomes: Vec<JobOutcome>,
        files: Vec<PathBuf>,
    },
    Estimate {
        request: GenerationRequest,
        estimate: CostEstimate,
    },
    Compound(CompoundResult),
}

/// `{success: true, type, model, width, height, seed, seedStrategy, urls, ...}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPayload<'a> {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub model: &'a str,
    pub width: u32,
    pub height: u32,
    pub seed: Seed,
    pub seed_strategy: SeedStrategy,
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Extra<'a> {
    Render {
        files: &'a [PathBuf],
        #[serde(skip_serializing_if = "Vec::is_empty")]
        unit_seeds: Vec<Seed>,
        #[serde(skip_serializing_if = "Option::is_none")]
        workflow: Option<WorkflowVariant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        frames: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fps: Option<u32>,
    },
    Estimate {
        estimate: &'a CostEstimate,
        #[serde(skip_serializing_if = "Option::is_none")]
        workflow: Option<WorkflowVariant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        frames: Option<u32>,
    },
    Compound {
        angles: &'a [AngleResult],
        #[serde(skip_serializing_if = "<[SegmentResult]>::is_empty")]
        segments: &'a [SegmentResult],
        #[serde(skip_serializing_if = "Option::is_none")]
        video: Option<&'a PathBuf>,
    },
}

impl RunReport {
    pub fn payload(&self) -> SuccessPayload<'_> {
        match self {
            Self::Render {
                request,
                outcomes,
                files,
            } => {
                let unit_seeds: Vec<Seed> = outcomes.iter().map(|o| o.seed).collect();
                SuccessPayload {
                    urls: outcomes.iter().map(|o| o.url.clone()).collect(),
                    extra: Extra::Render {
                        files,
                        // A single unit's seed is already the top-level seed.
                        unit_seeds: if unit_seeds.len() > 1 { unit_seeds } else { Vec::new() },
                        workflow: request.workflow(),
                        frames: request.frames(),
                        fps: request.fps(),
                    },
                    ..request_payload(request)
                }
            }
            Self::Estimate { request, estimate } => SuccessPayload {
                extra: Extra::Estimate {
                    estimate,
                    workflow: request.workflow(),
                    frames: request.frames(),
                },
                ..request_payload(request)
            },
            Self::Compound(result) => {
                let first = result.angles.first();
                SuccessPayload {
                    success: true,
                    kind: if result.video.is_some() {
                        ArtifactKind::Video
                    } else {
                        ArtifactKind::Image
                    },
                    model: &result.model,
                    width: first.map_or(0, |a| a.width),
                    height: first.map_or(0, |a| a.height),
                    seed: first.map_or(0, |a| a.seed),
                    seed_strategy: first.map(|a| a.seed_strategy).unwrap_or_default(),
                    urls: result.urls(),
                    extra: Extra::Compound {
                        angles: &result.angles,
                        segments: &result.segments,
                        video: result.video.as_ref(),
                    },
                }
            }
        }
    }

    /// Human-readable lines for plain mode.
    pub fn plain_lines(&self) -> Vec<String> {
        match self {
            Self::Render { files, outcomes, .. } => {
                if files.is_empty() {
                    outcomes.iter().map(|o| o.url.clone()).collect()
                } else {
                    files.iter().map(|f| f.display().to_string()).collect()
                }
            }
            Self::Estimate { request, estimate } => {
                let mut line = format!(
                    "Estimated cost for {} ({}x{}): {} {}",
                    request.model(),
                    request.width(),
                    request.height(),
                    estimate.credits,
                    estimate.currency.as_deref().unwrap_or("credits"),
                );
                if let Some(secs) = estimate.estimated_seconds {
                    line.push_str(&format!(", ~{secs:.0}s"));
                }
                vec![line]
            }
            Self::Compound(result) => {
                let mut lines: Vec<String> = result
                    .angles
                    .iter()
                    .flat_map(|a| {
                        a.files
                            .iter()
                            .map(move |f| format!("{}: {}", a.azimuth, f.display()))
                    })
                    .collect();
                if let Some(video) = &result.video {
                    lines.push(format!("360 video: {}", video.display()));
                }
                lines
            }
        }
    }
}

fn request_payload(request: &GenerationRequest) -> SuccessPayload<'_> {
    SuccessPayload {
        success: true,
        kind: request.kind(),
        model: request.model(),
        width: request.width(),
        height: request.height(),
        seed: request.seed(),
        seed_strategy: request.seed_strategy(),
        urls: Vec::new(),
        extra: Extra::Render {
            files: &[],
            unit_seeds: Vec::new(),
            workflow: None,
            frames: None,
            fps: None,
        },
    }
}

/// Plain-mode failure line: the message plus the hint when there is one.
pub fn error_line(err: &CoreError) -> String {
    match err.hint() {
        Some(hint) => format!("error [{}]: {err} (try {hint})", err.code().as_str()),
        None => format!("error [{}]: {err}", err.code().as_str()),
    }
}

pub fn emit_success(report: &RunReport, json: bool) {
    if json {
        print_json(&report.payload());
    } else {
        for line in report.plain_lines() {
            println!("{line}");
        }
    }
}

pub fn emit_error(err: &CoreError, json: bool) {
    if json {
        print_json(&ErrorPayload::from(err));
    } else {
        eprintln!("{}", error_line(err));
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize result payload");
            eprintln!("error [INTERNAL_ERROR]: failed to serialize result: {e}");
        }
    }
}
