//! Seed derivation.
//!
//! `prompt-hash` seeds are the first 32 bits of a SHA-256 digest over the
//! canonical JSON serialization of every field that affects the output, so
//! identical requests reproduce across runs and hosts. Seeds are derived
//! after dimension resolution: an auto-corrected size yields a different
//! seed than the size originally typed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::angles::AngleSpec;
use crate::error::CoreError;
use crate::hashing::sha256_prefix_u32;
use crate::request::{LoraSpec, OutputFormat};
use crate::types::Seed;
use crate::workflow::{ArtifactKind, AssetRole, WorkflowVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedStrategy {
    /// Cryptographically random, never reproducible.
    Random,
    /// Hashed from the canonical request.
    #[default]
    PromptHash,
    /// Supplied by the caller (explicit seed or last render).
    Fixed,
}

impl SeedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::PromptHash => "prompt-hash",
            Self::Fixed => "fixed",
        }
    }

    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "prompt-hash" | "hash" => Ok(Self::PromptHash),
            other => Err(CoreError::Validation(format!(
                "Unknown seed strategy '{other}'. Valid strategies: random, prompt-hash"
            ))),
        }
    }
}

/// Every field that influences the visual or audio outcome, in a fixed
/// field order. Serialized with `serde_json` this is the hash input.
#[derive(Debug, Serialize)]
pub struct SeedInputs<'a> {
    pub kind: ArtifactKind,
    pub workflow: Option<WorkflowVariant>,
    pub model: &'a str,
    pub prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance: f32,
    pub sampler: Option<&'a str>,
    pub scheduler: Option<&'a str>,
    pub loras: &'a [LoraSpec],
    /// `(role, identity)` of every reference asset, in request order.
    pub assets: Vec<(AssetRole, &'a str)>,
    pub angle: Option<&'a AngleSpec>,
    pub format: OutputFormat,
    pub frames: Option<u32>,
    pub fps: Option<u32>,
}

/// Derive a seed for `strategy`.
///
/// [`SeedStrategy::Fixed`] seeds are never derived; callers pass them
/// through unchanged.
pub fn derive_seed<T: Serialize>(strategy: SeedStrategy, canonical: &T) -> Result<Seed, CoreError> {
    match strategy {
        SeedStrategy::Random => Ok(random_seed()),
        SeedStrategy::PromptHash => prompt_hash_seed(canonical),
        SeedStrategy::Fixed => Err(CoreError::Internal(
            "fixed seeds are supplied by the caller, not derived".to_string(),
        )),
    }
}

/// Thread-local CSPRNG seed.
pub fn random_seed() -> Seed {
    rand::rng().random()
}

pub fn prompt_hash_seed<T: Serialize>(canonical: &T) -> Result<Seed, CoreError> {
    let bytes = serde_json::to_vec(canonical)
        .map_err(|e| CoreError::Internal(format!("failed to serialize seed inputs: {e}")))?;
    Ok(sha256_prefix_u32(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_loras() -> Vec<LoraSpec> {
        vec![LoraSpec {
            id: "detail".into(),
            strength: 0.8,
        }]
    }

    fn inputs<'a>(prompt: &'a str, loras: &'a [LoraSpec]) -> SeedInputs<'a> {
        SeedInputs {
            kind: ArtifactKind::Image,
            workflow: None,
            model: "flux-dev",
            prompt,
            width: 512,
            height: 512,
            steps: 28,
            guidance: 3.5,
            sampler: None,
            scheduler: None,
            loras,
            assets: vec![(AssetRole::ContextImage, "abc123")],
            angle: None,
            format: OutputFormat::Png,
            frames: None,
            fps: None,
        }
    }

    fn hash(i: &SeedInputs<'_>) -> Seed {
        derive_seed(SeedStrategy::PromptHash, i).unwrap()
    }

    #[test]
    fn prompt_hash_is_deterministic() {
        let loras = base_loras();
        assert_eq!(hash(&inputs("a cat", &loras)), hash(&inputs("a cat", &loras)));
    }

    #[test]
    fn every_contributing_field_changes_the_seed() {
        let loras = base_loras();
        let base = hash(&inputs("a cat", &loras));

        assert_ne!(base, hash(&inputs("a dog", &loras)));

        let mut i = inputs("a cat", &loras);
        i.model = "sdxl";
        assert_ne!(base, hash(&i));

        let mut i = inputs("a cat", &loras);
        i.width = 496;
        assert_ne!(base, hash(&i));

        let mut i = inputs("a cat", &loras);
        i.height = 496;
        assert_ne!(base, hash(&i));

        let other_strength = vec![LoraSpec {
            id: "detail".into(),
            strength: 0.9,
        }];
        assert_ne!(base, hash(&inputs("a cat", &other_strength)));

        let other_id = vec![LoraSpec {
            id: "grain".into(),
            strength: 0.8,
        }];
        assert_ne!(base, hash(&inputs("a cat", &other_id)));

        let mut i = inputs("a cat", &loras);
        i.assets = vec![(AssetRole::ContextImage, "def456")];
        assert_ne!(base, hash(&i));
    }

    #[test]
    fn frame_rate_changes_a_video_seed() {
        let loras = base_loras();
        let mut at_16 = inputs("surf", &loras);
        at_16.kind = ArtifactKind::Video;
        at_16.frames = Some(81);
        at_16.fps = Some(16);
        let mut at_24 = inputs("surf", &loras);
        at_24.kind = ArtifactKind::Video;
        at_24.frames = Some(81);
        at_24.fps = Some(24);
        assert_ne!(hash(&at_16), hash(&at_24));
    }

    #[test]
    fn random_strategy_ignores_the_inputs() {
        let loras = base_loras();
        let i = inputs("a cat", &loras);
        let draws: Vec<Seed> = (0..4)
            .map(|_| derive_seed(SeedStrategy::Random, &i).unwrap())
            .collect();
        // Four equal 32-bit draws would mean the inputs pinned the seed.
        assert!(draws.iter().any(|d| *d != draws[0]));
    }

    #[test]
    fn fixed_strategy_is_not_derivable() {
        let loras = base_loras();
        assert!(derive_seed(SeedStrategy::Fixed, &inputs("x", &loras)).is_err());
    }

    #[test]
    fn strategy_names_round_trip() {
        assert_eq!(SeedStrategy::parse("prompt-hash").unwrap(), SeedStrategy::PromptHash);
        assert_eq!(SeedStrategy::parse("Random").unwrap(), SeedStrategy::Random);
        assert!(SeedStrategy::parse("lucky").is_err());
        assert_eq!(SeedStrategy::default().as_str(), "prompt-hash");
    }
}
