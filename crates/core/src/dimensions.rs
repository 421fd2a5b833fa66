//! Output dimension resolution.
//!
//! Still images pass their requested size through unchanged. Video sizes
//! must be multiples of [`VIDEO_DIMENSION_MULTIPLE`]; when a reference frame
//! is known its aspect ratio drives the default size and, in strict mode,
//! explicit sizes that disagree with it are rejected with a corrected hint.
//!
//! Every function here is pure: identical inputs always resolve to the
//! same size, which the prompt-hash seed depends on.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Size;
use crate::workflow::AssetRole;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Hardware divisibility constraint for video width and height.
pub const VIDEO_DIMENSION_MULTIPLE: u32 = 16;

/// Size used for still images when none is requested.
pub const DEFAULT_IMAGE_SIZE: Size = Size::new(512, 512);

/// Size used for videos when neither a size nor a reference is given.
pub const DEFAULT_VIDEO_SIZE: Size = Size::new(832, 480);

/// Larger-side budget when fitting a video to a reference aspect ratio.
pub const DEFAULT_VIDEO_BUDGET: u32 = 832;

pub const MIN_DIMENSION: u32 = 16;
pub const MAX_VIDEO_DIMENSION: u32 = 1920;
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Relative aspect difference tolerated between an explicit size and a reference.
pub const ASPECT_TOLERANCE: f64 = 0.02;

/// Floating-point slack when comparing aspect deviations.
const DEVIATION_EPSILON: f64 = 1e-9;

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

/// A resolved output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionSpec {
    pub width: u32,
    pub height: u32,
    /// `true` when the user asked for this size, `false` when it was
    /// derived from a default or a reference.
    pub explicit: bool,
}

impl DimensionSpec {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Intrinsic size of a reference asset together with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSize {
    pub role: AssetRole,
    pub size: Size,
}

/* --------------------------------------------------------------------------
Rounding helpers
-------------------------------------------------------------------------- */

/// Round `value` down to a multiple of `multiple`, never below one unit.
pub fn round_down_to_multiple(value: u32, multiple: u32) -> u32 {
    ((value / multiple) * multiple).max(multiple)
}

pub fn is_multiple(size: Size, multiple: u32) -> bool {
    size.width % multiple == 0 && size.height % multiple == 0
}

/// Whether two aspect ratios differ by more than [`ASPECT_TOLERANCE`].
pub fn aspect_mismatch(actual: f64, reference: f64) -> bool {
    ((actual - reference).abs() / reference) > ASPECT_TOLERANCE
}

/// Best `multiple`-aligned size with the given aspect (width / height)
/// whose larger side is near `budget`.
///
/// Candidates use the budget (rounded down) and one step below it as the
/// larger side, with the smaller side rounded both down and up. The pair
/// with the smallest absolute deviation from the target aspect wins; ties
/// go to the larger area. When that pair is still outside
/// [`ASPECT_TOLERANCE`] the larger side walks down one step at a time, then
/// up to [`MAX_VIDEO_DIMENSION`], and the first step with an in-tolerance
/// pair wins.
pub fn fit_aspect(budget: u32, aspect: f64, multiple: u32) -> Size {
    let major_max = round_down_to_multiple(budget, multiple);
    let preferred = best_candidate(
        aspect,
        multiple,
        &[major_max, major_max.saturating_sub(multiple)],
    );
    let within = |size: &Size| !aspect_mismatch(size.aspect(), aspect);
    if let Some(size) = preferred.filter(within) {
        return size;
    }

    let steps = major_max / multiple;
    let below = (1..steps.saturating_sub(1)).rev().map(|k| k * multiple);
    let above = (steps + 1..=MAX_VIDEO_DIMENSION / multiple).map(|k| k * multiple);
    for major in below.chain(above) {
        if let Some(size) = best_candidate(aspect, multiple, &[major]).filter(within) {
            return size;
        }
    }

    preferred.unwrap_or(Size::new(major_max, major_max))
}

fn best_candidate(aspect: f64, multiple: u32, majors: &[u32]) -> Option<Size> {
    let landscape = aspect >= 1.0;
    let ratio = if landscape { 1.0 / aspect } else { aspect };

    let mut best: Option<(f64, Size)> = None;
    for &major in majors {
        if major < multiple {
            continue;
        }
        let exact = major as f64 * ratio / multiple as f64;
        let lo = ((exact.floor() as u32) * multiple).max(multiple);
        let hi = ((exact.ceil() as u32) * multiple).clamp(multiple, major);
        for minor in [lo, hi] {
            let deviation = (minor as f64 / major as f64 - ratio).abs();
            let size = if landscape {
                Size::new(major, minor)
            } else {
                Size::new(minor, major)
            };
            let better = match best {
                None => true,
                Some((best_dev, best_size)) => {
                    deviation + DEVIATION_EPSILON < best_dev
                        || ((deviation - best_dev).abs() <= DEVIATION_EPSILON
                            && size.area() > best_size.area())
                }
            };
            if better {
                best = Some((deviation, size));
            }
        }
    }
    best.map(|(_, size)| size)
}

/// Corrected size to suggest when an explicit video size is rejected:
/// the requested scale, re-fit to `aspect`.
pub fn suggest_size(requested: Size, aspect: f64, multiple: u32) -> Size {
    fit_aspect(requested.width.max(requested.height), aspect, multiple)
}

/* --------------------------------------------------------------------------
Resolution
-------------------------------------------------------------------------- */

/// Resolve the final output size.
///
/// * `requested` - explicit size, if the user gave one.
/// * `references` - known reference sizes; the first entry drives default
///   fitting, every entry is checked in strict mode.
/// * `constraint` - divisibility multiple, `None` for still images.
/// * `strict` - reject instead of silently correcting.
pub fn resolve(
    requested: Option<Size>,
    references: &[ReferenceSize],
    constraint: Option<u32>,
    strict: bool,
) -> Result<DimensionSpec, CoreError> {
    let Some(multiple) = constraint else {
        return resolve_unconstrained(requested);
    };

    let Some(req) = requested else {
        let size = match references.first() {
            Some(reference) => fit_aspect(DEFAULT_VIDEO_BUDGET, reference.size.aspect(), multiple),
            None => DEFAULT_VIDEO_SIZE,
        };
        return Ok(DimensionSpec {
            width: size.width,
            height: size.height,
            explicit: false,
        });
    };

    validate_dimensions(req, MAX_VIDEO_DIMENSION)?;
    let target_aspect = references
        .first()
        .map(|r| r.size.aspect())
        .unwrap_or_else(|| req.aspect());

    if !is_multiple(req, multiple) {
        if strict {
            let hint = suggest_size(req, target_aspect, multiple);
            return Err(size_error(
                format!("Video size {req} is not a multiple of {multiple}"),
                req,
                hint,
                None,
            ));
        }
        let corrected = Size::new(
            round_down_to_multiple(req.width, multiple),
            round_down_to_multiple(req.height, multiple),
        );
        tracing::debug!(requested = %req, resolved = %corrected, "Rounded video size down");
        return Ok(DimensionSpec {
            width: corrected.width,
            height: corrected.height,
            explicit: true,
        });
    }

    if strict {
        for reference in references {
            if aspect_mismatch(req.aspect(), reference.size.aspect()) {
                let hint = suggest_size(req, reference.size.aspect(), multiple);
                return Err(size_error(
                    format!(
                        "Video size {req} does not match the {} aspect ratio ({})",
                        reference.role.as_str(),
                        reference.size
                    ),
                    req,
                    hint,
                    Some(reference),
                ));
            }
        }
    }

    Ok(DimensionSpec {
        width: req.width,
        height: req.height,
        explicit: true,
    })
}

fn resolve_unconstrained(requested: Option<Size>) -> Result<DimensionSpec, CoreError> {
    match requested {
        Some(size) => {
            validate_dimensions(size, MAX_IMAGE_DIMENSION)?;
            Ok(DimensionSpec {
                width: size.width,
                height: size.height,
                explicit: true,
            })
        }
        None => Ok(DimensionSpec {
            width: DEFAULT_IMAGE_SIZE.width,
            height: DEFAULT_IMAGE_SIZE.height,
            explicit: false,
        }),
    }
}

/// Validate that width and height are within bounds.
pub fn validate_dimensions(size: Size, max: u32) -> Result<(), CoreError> {
    if size.width == 0 || size.height == 0 {
        return Err(CoreError::Validation(
            "Width and height must be greater than 0".to_string(),
        ));
    }
    if size.width > max || size.height > max {
        return Err(CoreError::Validation(format!(
            "Dimensions must not exceed {max}px (got {size})"
        )));
    }
    Ok(())
}

fn size_error(
    message: String,
    requested: Size,
    hint: Size,
    reference: Option<&ReferenceSize>,
) -> CoreError {
    let mut details = serde_json::json!({
        "requested": requested,
        "multiple": VIDEO_DIMENSION_MULTIPLE,
        "suggested": hint,
    });
    if let Some(reference) = reference {
        details["referenceRole"] = serde_json::json!(reference.role);
        details["referenceSize"] = serde_json::json!(reference.size);
    }
    CoreError::InvalidVideoSize {
        message,
        hint: Some(format!("--width {} --height {}", hint.width, hint.height)),
        details: Some(details),
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
