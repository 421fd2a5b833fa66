//! Camera angle keyword tables for multi-angle editing.
//!
//! Angle prompts are `<sks> <azimuth> <elevation> <distance>`, optionally
//! followed by the user's own prompt. The structural token is what the
//! multi-angle LoRA was trained on.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Token the multi-angle LoRA keys on.
pub const STRUCTURAL_TOKEN: &str = "<sks>";

/// LoRA applied to angle edits when the user supplies none.
pub const MULTI_ANGLE_LORA_ID: &str = "qwen-multiple-angles";
pub const MULTI_ANGLE_LORA_STRENGTH: f32 = 1.0;

pub const DEFAULT_AZIMUTH: &str = "front";
pub const DEFAULT_ELEVATION: &str = "eye";
pub const DEFAULT_DISTANCE: &str = "medium";

/// One camera azimuth label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Azimuth {
    pub label: &'static str,
    pub degrees: u16,
    pub phrase: &'static str,
}

impl Azimuth {
    const fn new(label: &'static str, degrees: u16, phrase: &'static str) -> Self {
        Self {
            label,
            degrees,
            phrase,
        }
    }
}

/// Azimuths in 360 sweep order.
pub const AZIMUTHS: &[Azimuth] = &[
    Azimuth::new("front", 0, "front view"),
    Azimuth::new("front-right", 45, "front-right quarter view"),
    Azimuth::new("right", 90, "right side view"),
    Azimuth::new("back-right", 135, "back-right quarter view"),
    Azimuth::new("back", 180, "back view"),
    Azimuth::new("back-left", 225, "back-left quarter view"),
    Azimuth::new("left", 270, "left side view"),
    Azimuth::new("front-left", 315, "front-left quarter view"),
];

/// `(label, phrase)`
pub const ELEVATIONS: &[(&str, &str)] = &[
    ("low", "low-angle shot"),
    ("eye", "eye-level shot"),
    ("elevated", "elevated shot"),
    ("high", "high-angle shot"),
];

/// `(label, phrase)`
pub const DISTANCES: &[(&str, &str)] = &[
    ("close", "close-up"),
    ("medium", "medium shot"),
    ("wide", "wide shot"),
];

/// A fully-specified camera angle, validated against the tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AngleSpec {
    pub azimuth: String,
    pub elevation: String,
    pub distance: String,
}

impl AngleSpec {
    /// Build an angle, validating every label.
    pub fn new(azimuth: &str, elevation: &str, distance: &str) -> Result<Self, CoreError> {
        let az = find_azimuth(azimuth)?;
        let el = lookup_label(ELEVATIONS, elevation, "elevation")?;
        let dist = lookup_label(DISTANCES, distance, "distance")?;
        Ok(Self {
            azimuth: az.label.to_string(),
            elevation: el.0.to_string(),
            distance: dist.0.to_string(),
        })
    }

    /// Prompt for this angle, with the user's prompt appended when present.
    pub fn prompt(&self, user_prompt: Option<&str>) -> String {
        let az = find_azimuth(&self.azimuth).map(|a| a.phrase).unwrap_or("front view");
        let el = phrase_for(ELEVATIONS, &self.elevation);
        let dist = phrase_for(DISTANCES, &self.distance);
        let mut prompt = format!("{STRUCTURAL_TOKEN} {az} {el} {dist}");
        if let Some(extra) = user_prompt.map(str::trim).filter(|p| !p.is_empty()) {
            prompt.push_str(", ");
            prompt.push_str(extra);
        }
        prompt
    }
}

pub fn find_azimuth(label: &str) -> Result<&'static Azimuth, CoreError> {
    let needle = label.trim().to_ascii_lowercase();
    AZIMUTHS
        .iter()
        .find(|a| a.label == needle || a.degrees.to_string() == needle)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Unknown azimuth '{label}'. Valid azimuths: {}",
                AZIMUTHS.iter().map(|a| a.label).collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Azimuth labels for a run: one for single-angle mode, all eight for a sweep.
pub fn sweep_labels(sweep: bool, single: &str) -> Result<Vec<&'static str>, CoreError> {
    if sweep {
        Ok(AZIMUTHS.iter().map(|a| a.label).collect())
    } else {
        Ok(vec![find_azimuth(single)?.label])
    }
}

fn lookup_label(
    table: &'static [(&'static str, &'static str)],
    label: &str,
    what: &str,
) -> Result<&'static (&'static str, &'static str), CoreError> {
    let needle = label.trim().to_ascii_lowercase();
    table.iter().find(|(l, _)| *l == needle).ok_or_else(|| {
        CoreError::Validation(format!(
            "Unknown {what} '{label}'. Valid values: {}",
            table.iter().map(|(l, _)| *l).collect::<Vec<_>>().join(", ")
        ))
    })
}

fn phrase_for(table: &'static [(&'static str, &'static str)], label: &str) -> &'static str {
    table
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, p)| *p)
        .unwrap_or("")
}
