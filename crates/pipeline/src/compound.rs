//! Compound workflows: multi-angle sets and stitched 360 videos.
//!
//! Angles run strictly one after another, then (when stitching) one
//! image-to-video segment per consecutive angle pair including the
//! wrap-around pair, then a single concatenation. Any failing stage aborts
//! the whole run; files already saved stay on disk.

use std::path::PathBuf;

use orbit_core::compiler::{AnglePlan, RequestCompiler, StitchPlan};
use orbit_core::error::CoreError;
use orbit_core::request::{GenerationRequest, OutputFormat};
use orbit_core::seed::SeedStrategy;
use orbit_core::types::Seed;
use serde::Serialize;

use crate::concat::Concatenator;
use crate::download::ArtifactStore;
use crate::orchestrator::{JobOrchestrator, JobOutcome};

/* --------------------------------------------------------------------------
Plan ledger
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Angle,
    Segment,
}

/// Requests issued so far plus the local files that feed later stages.
#[derive(Debug, Clone, Default)]
pub struct CompoundArtifactPlan {
    pub stages: Vec<(StageKind, GenerationRequest)>,
    /// First saved unit of each angle, in sweep order.
    pub angle_frames: Vec<PathBuf>,
    /// One clip per segment, in loop order.
    pub segment_clips: Vec<PathBuf>,
}

impl CompoundArtifactPlan {
    /// Requests of `kind` that settled successfully.
    pub fn issued(&self, kind: StageKind) -> usize {
        self.stages.iter().filter(|(k, _)| *k == kind).count()
    }

    /// Consecutive frame pairs in sweep order, closing the loop back to
    /// the first frame. Fewer than two frames yield no pairs.
    pub fn segment_pairs(&self) -> Vec<(usize, usize)> {
        let n = self.angle_frames.len();
        if n < 2 {
            return Vec::new();
        }
        (0..n).map(|i| (i, (i + 1) % n)).collect()
    }
}

/* --------------------------------------------------------------------------
Results
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleResult {
    pub azimuth: String,
    pub elevation: String,
    pub distance: String,
    pub seed: Seed,
    pub seed_strategy: SeedStrategy,
    pub width: u32,
    pub height: u32,
    pub outcomes: Vec<JobOutcome>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResult {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub seed: Seed,
    pub frames: u32,
    pub outcome: JobOutcome,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundResult {
    pub model: String,
    pub angles: Vec<AngleResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
}

impl CompoundResult {
    pub fn urls(&self) -> Vec<String> {
        self.angles
            .iter()
            .flat_map(|a| a.outcomes.iter().map(|o| o.url.clone()))
            .collect()
    }
}

/* --------------------------------------------------------------------------
Engine
-------------------------------------------------------------------------- */

pub struct CompoundWorkflowEngine<'a> {
    compiler: &'a RequestCompiler<'a>,
    orchestrator: &'a JobOrchestrator<'a>,
    store: &'a dyn ArtifactStore,
    concat: &'a dyn Concatenator,
}

impl<'a> CompoundWorkflowEngine<'a> {
    pub fn new(
        compiler: &'a RequestCompiler<'a>,
        orchestrator: &'a JobOrchestrator<'a>,
        store: &'a dyn ArtifactStore,
        concat: &'a dyn Concatenator,
    ) -> Self {
        Self {
            compiler,
            orchestrator,
            store,
            concat,
        }
    }

    /// Run every angle, then the stitch stage if the plan asks for one.
    ///
    /// `prefix` names every saved file of this run.
    pub async fn run(&self, plan: &AnglePlan, prefix: &str) -> Result<CompoundResult, CoreError> {
        // An unstitchable sweep must not spend any remote work.
        if plan.stitch.is_some() {
            self.concat.preflight().await?;
        }

        let mut ledger = CompoundArtifactPlan::default();
        let angles = self.run_angles(plan, prefix, &mut ledger).await?;

        let (segments, video) = match &plan.stitch {
            Some(stitch) => {
                let segments = self.run_segments(plan, stitch, prefix, &mut ledger).await?;
                let video = self.store.output_dir().join(format!("{prefix}_360.mp4"));
                self.concat
                    .concat(&ledger.segment_clips, stitch.fps, &video)
                    .await?;
                tracing::info!(path = %video.display(), "Stitched 360 video");
                (segments, Some(video))
            }
            None => (Vec::new(), None),
        };

        tracing::info!(
            angles = ledger.issued(StageKind::Angle),
            segments = ledger.issued(StageKind::Segment),
            "Compound run complete",
        );
        Ok(CompoundResult {
            model: plan.model.clone(),
            angles,
            segments,
            video,
        })
    }

    async fn run_angles(
        &self,
        plan: &AnglePlan,
        prefix: &str,
        ledger: &mut CompoundArtifactPlan,
    ) -> Result<Vec<AngleResult>, CoreError> {
        let total = plan.angles.len();
        let mut results = Vec::with_capacity(total);

        for (index, angle) in plan.angles.iter().enumerate() {
            let request = self.compiler.compile_angle(plan, angle)?;
            tracing::info!(
                angle = %angle.azimuth,
                stage = index + 1,
                total,
                seed = request.seed(),
                "Generating angle",
            );

            let outcomes = self.orchestrator.run(&request).await.inspect_err(|e| {
                tracing::error!(angle = %angle.azimuth, error = %e, "Angle failed; aborting");
            })?;
            let files = self
                .store
                .save_all(&outcomes, &format!("{prefix}_{}", angle.azimuth), request.format())
                .await?;
            let frame = files.first().cloned().ok_or_else(|| {
                CoreError::Internal(format!("angle '{}' produced no files", angle.azimuth))
            })?;

            ledger.angle_frames.push(frame);
            results.push(AngleResult {
                azimuth: angle.azimuth.clone(),
                elevation: angle.elevation.clone(),
                distance: angle.distance.clone(),
                seed: request.seed(),
                seed_strategy: request.seed_strategy(),
                width: request.width(),
                height: request.height(),
                outcomes,
                files,
            });
            ledger.stages.push((StageKind::Angle, request));
        }
        Ok(results)
    }

    async fn run_segments(
        &self,
        plan: &AnglePlan,
        stitch: &StitchPlan,
        prefix: &str,
        ledger: &mut CompoundArtifactPlan,
    ) -> Result<Vec<SegmentResult>, CoreError> {
        let pairs = ledger.segment_pairs();
        if pairs.is_empty() {
            return Err(CoreError::Validation(
                "Stitching needs at least two angle frames".to_string(),
            ));
        }
        let total = pairs.len();
        let mut results = Vec::with_capacity(total);

        for (index, (from, to)) in pairs.into_iter().enumerate() {
            let start = ledger.angle_frames[from].to_string_lossy().into_owned();
            let end = ledger.angle_frames[to].to_string_lossy().into_owned();
            let request = self
                .compiler
                .compile_segment(plan, stitch, &start, &end, total)?;
            let from_label = plan.angles[from].azimuth.clone();
            let to_label = plan.angles[to].azimuth.clone();
            tracing::info!(
                segment = index + 1,
                total,
                from = %from_label,
                to = %to_label,
                frames = request.frames(),
                "Generating segment",
            );

            let outcomes = self.orchestrator.run(&request).await.inspect_err(|e| {
                tracing::error!(segment = index + 1, error = %e, "Segment failed; aborting");
            })?;
            let files = self
                .store
                .save_all(&outcomes, &format!("{prefix}_segment_{index:02}"), OutputFormat::Mp4)
                .await?;
            let first = (files.into_iter().next(), outcomes.into_iter().next());
            let (Some(file), Some(outcome)) = first else {
                return Err(CoreError::Internal(format!(
                    "segment {} produced no clip",
                    index + 1
                )));
            };

            ledger.segment_clips.push(file.clone());
            results.push(SegmentResult {
                index,
                from: from_label,
                to: to_label,
                seed: request.seed(),
                frames: request.frames().unwrap_or(stitch.total_frames),
                outcome,
                file,
            });
            ledger.stages.push((StageKind::Segment, request));
        }
        Ok(results)
    }
}
