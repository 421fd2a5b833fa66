//! Core domain logic for orbit: request compilation, dimension
//! resolution, seed derivation, and the declarative tables they consult.
//!
//! Nothing in this crate performs network I/O. Reference assets are
//! inspected through the [`assets::AssetInspector`] seam so the compiler
//! can be driven entirely from tests.

pub mod angles;
pub mod assets;
pub mod compiler;
pub mod dimensions;
pub mod error;
pub mod hashing;
pub mod models;
pub mod options;
pub mod request;
pub mod seed;
pub mod types;
pub mod workflow;
