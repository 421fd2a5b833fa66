//! One invocation: last-render lookup, compilation, a scoped client
//! session, execution, and last-render bookkeeping.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use chrono::Utc;
use futures::FutureExt;
use orbit_client::remote::RemoteClient;
use orbit_core::assets::FsAssetInspector;
use orbit_core::compiler::{AnglePlan, CompiledPlan, RequestCompiler};
use orbit_core::error::CoreError;
use orbit_core::request::GenerationRequest;
use orbit_core::workflow::ArtifactKind;
use orbit_pipeline::compound::{CompoundResult, CompoundWorkflowEngine};
use orbit_pipeline::concat::FfmpegConcat;
use orbit_pipeline::download::{run_prefix, ArtifactStore, HttpArtifactStore};
use orbit_pipeline::last_render::{apply_last_render, JsonFileStore, LastRender, LastRenderStore};
use orbit_pipeline::orchestrator::{JobOrchestrator, JobOutcome};

use crate::args::Cli;
use crate::config::CliConfig;
use crate::output::RunReport;

pub async fn execute(cli: &Cli, config: &CliConfig) -> Result<RunReport, CoreError> {
    let state = JsonFileStore::new(config.state_file.clone());

    let mut raw = cli.options();
    if cli.last_seed || cli.last_image {
        let last = state.load().await?;
        apply_last_render(&mut raw, last.as_ref(), cli.last_seed, cli.last_image)?;
    }

    // Compile before connecting: invalid input never touches the service.
    let inspector = FsAssetInspector;
    let compiler = RequestCompiler::new(&inspector);
    let plan = compiler.compile(&raw)?;

    let client = RemoteClient::connect(config.remote()).await?;
    tracing::info!(client_id = client.client_id(), "Connected to generation service");

    with_shutdown(dispatch(plan, &compiler, &client, config, &state), client.shutdown()).await
}

/// Run `work`, then `shutdown`, even when `work` panics. The panic is
/// resumed once shutdown has finished.
async fn with_shutdown<T>(work: impl Future<Output = T>, shutdown: impl Future<Output = ()>) -> T {
    let outcome = AssertUnwindSafe(work).catch_unwind().await;
    shutdown.await;
    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn dispatch(
    plan: CompiledPlan,
    compiler: &RequestCompiler<'_>,
    client: &RemoteClient,
    config: &CliConfig,
    state: &dyn LastRenderStore,
) -> Result<RunReport, CoreError> {
    let orchestrator = JobOrchestrator::new(client, config.timeout);
    let store = HttpArtifactStore::new(config.output_dir.clone());

    match plan {
        CompiledPlan::Estimate(request) => {
            let estimate = orchestrator.estimate_cost(&request).await?;
            tracing::info!(
                model = request.model(),
                credits = estimate.credits,
                "Received cost estimate"
            );
            Ok(RunReport::Estimate { request, estimate })
        }
        CompiledPlan::Single(request) => {
            tracing::info!(
                kind = request.kind().as_str(),
                model = request.model(),
                width = request.width(),
                height = request.height(),
                seed = request.seed(),
                count = request.count(),
                "Submitting generation",
            );
            let outcomes = orchestrator.run(&request).await?;
            let prefix = run_prefix(request.kind().as_str(), Utc::now());
            let files = store.save_all(&outcomes, &prefix, request.format()).await?;
            tracing::info!(saved = files.len(), dir = %config.output_dir.display(), "Saved outputs");

            record(state, single_render(&request, &outcomes, &files)).await;
            Ok(RunReport::Render {
                request,
                outcomes,
                files,
            })
        }
        CompiledPlan::Compound(plan) => {
            let concat = FfmpegConcat::new(config.ffmpeg.clone());
            let engine = CompoundWorkflowEngine::new(compiler, &orchestrator, &store, &concat);
            let label = if plan.stitch.is_some() { "orbit360" } else { "angles" };
            let result = engine.run(&plan, &run_prefix(label, Utc::now())).await?;

            if let Some(render) = compound_render(&plan, &result) {
                record(state, render).await;
            }
            Ok(RunReport::Compound(result))
        }
    }
}

/// Persist the render; a failure here never fails a finished run.
async fn record(state: &dyn LastRenderStore, render: LastRender) {
    if let Err(e) = state.save(&render).await {
        tracing::warn!(error = %e, "Failed to record last render");
    }
}

fn single_render(
    request: &GenerationRequest,
    outcomes: &[JobOutcome],
    files: &[PathBuf],
) -> LastRender {
    LastRender {
        kind: request.kind(),
        model: request.model().to_string(),
        prompt: Some(request.prompt().to_string()),
        seed: request.seed(),
        width: request.width(),
        height: request.height(),
        urls: outcomes.iter().map(|o| o.url.clone()).collect(),
        files: files.to_vec(),
        rendered_at: Utc::now(),
    }
}

/// Angle frames are the reusable images of a sweep; the last one wins
/// `--last-image`.
fn compound_render(plan: &AnglePlan, result: &CompoundResult) -> Option<LastRender> {
    let first = result.angles.first()?;
    Some(LastRender {
        kind: ArtifactKind::Image,
        model: result.model.clone(),
        prompt: plan.user_prompt.clone(),
        seed: first.seed,
        width: first.width,
        height: first.height,
        urls: result.urls(),
        files: result.angles.iter().flat_map(|a| a.files.iter().cloned()).collect(),
        rendered_at: Utc::now(),
    })
}
