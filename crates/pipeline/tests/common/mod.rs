//! Shared fakes for pipeline integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use orbit_client::client::{ClientError, CostEstimate, GenerationClient, SubmitAck};
use orbit_client::events::GenerationEvent;
use orbit_core::assets::{AssetInfo, AssetInspector};
use orbit_core::error::CoreError;
use orbit_core::request::{GenerationRequest, OutputFormat, SubmissionKind};
use orbit_core::types::Size;
use orbit_core::workflow::AssetRole;
use orbit_pipeline::concat::Concatenator;
use orbit_pipeline::download::{artifact_path, ArtifactStore};
use tokio::sync::broadcast;

/* --------------------------------------------------------------------------
Scripted generation client
-------------------------------------------------------------------------- */

/// How the fake service reacts to one submission.
#[derive(Debug, Clone)]
pub enum Script {
    /// Accept, then emit `events` in order.
    Accept {
        ack: Option<String>,
        events: Vec<GenerationEvent>,
    },
    /// Reject the submission before any event.
    Reject(String),
}

impl Script {
    /// Accept with id `id` and complete `count` units in index order.
    pub fn complete(id: &str, count: u32) -> Self {
        Self::Accept {
            ack: Some(id.to_string()),
            events: (0..count).map(|i| unit(id, i)).collect(),
        }
    }

    /// Accept with id `id`, emit nothing.
    pub fn silent(id: &str) -> Self {
        Self::Accept {
            ack: Some(id.to_string()),
            events: Vec::new(),
        }
    }

    pub fn fail(id: &str, error: &str) -> Self {
        Self::Accept {
            ack: Some(id.to_string()),
            events: vec![GenerationEvent::JobFailed {
                correlation_id: id.to_string(),
                error: error.to_string(),
            }],
        }
    }
}

pub fn unit(id: &str, index: u32) -> GenerationEvent {
    GenerationEvent::UnitCompleted {
        correlation_id: id.to_string(),
        unit_index: index,
        url: format!("https://cdn.test/{id}/{index}"),
        seed: None,
    }
}

type Responder = Box<dyn Fn(usize, &GenerationRequest) -> Script + Send + Sync>;

pub struct ScriptedClient {
    tx: broadcast::Sender<GenerationEvent>,
    responder: Responder,
    submissions: Mutex<Vec<(SubmissionKind, GenerationRequest)>>,
    estimate: CostEstimate,
}

impl ScriptedClient {
    pub fn new(
        responder: impl Fn(usize, &GenerationRequest) -> Script + Send + Sync + 'static,
    ) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            responder: Box::new(responder),
            submissions: Mutex::new(Vec::new()),
            estimate: CostEstimate {
                credits: 42.0,
                currency: Some("credits".into()),
                estimated_seconds: Some(120.0),
            },
        }
    }

    /// Every submission completes all of its units.
    pub fn succeeding() -> Self {
        Self::new(|n, req| Script::complete(&format!("job-{n}"), req.count()))
    }

    /// Submission number `fail_at` (0-based) fails remotely; the rest succeed.
    pub fn failing_at(fail_at: usize) -> Self {
        Self::new(move |n, req| {
            let id = format!("job-{n}");
            if n == fail_at {
                Script::fail(&id, "sampler diverged")
            } else {
                Script::complete(&id, req.count())
            }
        })
    }

    pub fn submissions(&self) -> Vec<(SubmissionKind, GenerationRequest)> {
        self.submissions.lock().unwrap().clone()
    }

    /// Live listeners; zero once every orchestration has settled.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Inject an event directly onto the stream.
    pub fn emit(&self, event: GenerationEvent) {
        let _ = self.tx.send(event);
    }

    fn accept(
        &self,
        kind: SubmissionKind,
        request: &GenerationRequest,
    ) -> Result<SubmitAck, ClientError> {
        let script = {
            let mut submissions = self.submissions.lock().unwrap();
            let n = submissions.len();
            submissions.push((kind, request.clone()));
            (self.responder)(n, request)
        };
        match script {
            Script::Reject(reason) => Err(ClientError::Rejected(reason)),
            Script::Accept { ack, events } => {
                for event in events {
                    let _ = self.tx.send(event);
                }
                Ok(SubmitAck {
                    correlation_id: ack,
                })
            }
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn submit_image_job(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmitAck, ClientError> {
        self.accept(SubmissionKind::Image, request)
    }

    async fn submit_edit_job(&self, request: &GenerationRequest) -> Result<SubmitAck, ClientError> {
        self.accept(SubmissionKind::Edit, request)
    }

    async fn submit_video_job(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmitAck, ClientError> {
        self.accept(SubmissionKind::Video, request)
    }

    async fn estimate_video_cost(
        &self,
        _request: &GenerationRequest,
    ) -> Result<CostEstimate, ClientError> {
        Ok(self.estimate.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.tx.subscribe()
    }
}

/* --------------------------------------------------------------------------
Collaborator fakes
-------------------------------------------------------------------------- */

/// Every locator exists as a 1024x1024 image whose identity is its path.
pub struct AnyInspector;

impl AssetInspector for AnyInspector {
    fn inspect(&self, locator: &str, _role: AssetRole) -> Result<AssetInfo, CoreError> {
        Ok(AssetInfo {
            identity: locator.to_string(),
            size: Some(Size::new(1024, 1024)),
        })
    }
}

/// Records saves without touching the filesystem.
pub struct RecordingStore {
    dir: PathBuf,
    saved: Mutex<Vec<PathBuf>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            dir: PathBuf::from("/renders"),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    fn output_dir(&self) -> &Path {
        &self.dir
    }

    async fn save(
        &self,
        _url: &str,
        prefix: &str,
        unit_index: u32,
        format: OutputFormat,
    ) -> Result<PathBuf, CoreError> {
        let path = artifact_path(&self.dir, prefix, unit_index, format);
        self.saved.lock().unwrap().push(path.clone());
        Ok(path)
    }
}

/// Records concatenation calls; `available = false` fails the preflight.
pub struct RecordingConcat {
    available: bool,
    calls: Mutex<Vec<(Vec<PathBuf>, u32, PathBuf)>>,
}

impl RecordingConcat {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<PathBuf>, u32, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Concatenator for RecordingConcat {
    async fn preflight(&self) -> Result<(), CoreError> {
        if self.available {
            Ok(())
        } else {
            Err(CoreError::ToolUnavailable("ffmpeg".into()))
        }
    }

    async fn concat(&self, clips: &[PathBuf], fps: u32, output: &Path) -> Result<(), CoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((clips.to_vec(), fps, output.to_path_buf()));
        Ok(())
    }
}
