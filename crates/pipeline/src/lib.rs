//! Execution side of orbit: job orchestration against a generation
//! client, compound multi-angle / 360 workflows, and the collaborators
//! they hand work to (artifact storage, clip concatenation, last-render
//! state).

pub mod compound;
pub mod concat;
pub mod download;
pub mod last_render;
pub mod orchestrator;
