//! Generation-service client library.
//!
//! Defines the [`client::GenerationClient`] boundary the orchestrator
//! consumes, the lifecycle events it emits, and a remote implementation
//! built from typed stream messages, HTTP API wrappers, and reconnection
//! logic.

pub mod api;
pub mod client;
pub mod connection;
pub mod events;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod remote;

pub use client::{ClientError, CostEstimate, GenerationClient, SubmitAck};
pub use events::GenerationEvent;
