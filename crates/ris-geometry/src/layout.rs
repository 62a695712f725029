//! Resolution of panel layouts from physical size or element pitch.
//!
//! Three modes are supported:
//!
//! | Mode | Inputs | Derived |
//! |------|--------|---------|
//! | `legacy` | counts, optional pitch override | size (if pitch given) |
//! | `size_driven` | width/height + target pitch or density | counts, effective pitch |
//! | `spacing_driven` | pitch + counts **or** width/height | size **or** counts |
//!
//! Counts are always integers, so a requested size or pitch is generally not
//! achievable exactly. The difference between requested and effective values
//! is recorded in [`RoundingDeltas`] rather than dropped. Resolution is a pure
//! function of its input: resolving the same request twice gives the same
//! [`ResolvedLayout`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Element count used for legacy layouts that do not specify one.
pub const DEFAULT_LEGACY_COUNT: usize = 8;

/// How the element counts and pitches of a panel are determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Legacy,
    SizeDriven,
    SpacingDriven,
}

impl FromStr for LayoutMode {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(LayoutMode::Legacy),
            "size_driven" | "size-driven" | "size" => Ok(LayoutMode::SizeDriven),
            "spacing_driven" | "spacing-driven" | "spacing" => Ok(LayoutMode::SpacingDriven),
            other => Err(GeometryError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutMode::Legacy => "legacy",
            LayoutMode::SizeDriven => "size_driven",
            LayoutMode::SpacingDriven => "spacing_driven",
        };
        f.write_str(name)
    }
}

/// Inputs for `size_driven` layouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dx_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dy_m: Option<f64>,
    /// Elements per square metre; used when either target pitch is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_density_per_m2: Option<f64>,
}

/// Inputs for `spacing_driven` layouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpacingSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dx_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dy_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_cells_x: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_cells_y: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_m: Option<f64>,
}

/// Complete layout request.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSpec {
    pub mode: LayoutMode,
    /// Counts a legacy layout keeps.
    pub base_nx: usize,
    pub base_ny: usize,
    /// Legacy pitch override `(dx, dy)`; both must be present to apply.
    pub pitch_override: (Option<f64>, Option<f64>),
    pub size: SizeSpec,
    pub spacing: SpacingSpec,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Legacy,
            base_nx: DEFAULT_LEGACY_COUNT,
            base_ny: DEFAULT_LEGACY_COUNT,
            pitch_override: (None, None),
            size: SizeSpec::default(),
            spacing: SpacingSpec::default(),
        }
    }
}

/// A set of layout quantities; absent entries were not part of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dx_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dy_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dx_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dy_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_density_per_m2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_cells_x: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_cells_y: Option<usize>,
}

/// `effective − requested` for every quantity that had to be rounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundingDeltas {
    pub width_m_delta: f64,
    pub height_m_delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dx_m_delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dy_m_delta: Option<f64>,
}

/// Outcome of [`resolve_layout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLayout {
    pub mode: LayoutMode,
    pub nx: usize,
    pub ny: usize,
    pub dx_m: Option<f64>,
    pub dy_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    pub requested: LayoutRecord,
    pub effective: LayoutRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounding: Option<RoundingDeltas>,
}

impl ResolvedLayout {
    fn untouched(spec: &LayoutSpec) -> Self {
        Self {
            mode: spec.mode,
            nx: spec.base_nx,
            ny: spec.base_ny,
            dx_m: None,
            dy_m: None,
            width_m: None,
            height_m: None,
            requested: LayoutRecord::default(),
            effective: LayoutRecord::default(),
            rounding: None,
        }
    }
}

fn positive(value: Option<f64>, field: &str) -> Result<f64, GeometryError> {
    match value {
        None => Err(GeometryError::InvalidField {
            field: field.to_string(),
            requirement: "a number",
        }),
        Some(v) if v > 0.0 && v.is_finite() => Ok(v),
        Some(_) => Err(GeometryError::InvalidField {
            field: field.to_string(),
            requirement: "positive",
        }),
    }
}

fn positive_count(value: Option<i64>, field: &str) -> Result<usize, GeometryError> {
    match value {
        None => Err(GeometryError::InvalidField {
            field: field.to_string(),
            requirement: "an integer",
        }),
        Some(v) if v >= 1 => Ok(v as usize),
        Some(_) => Err(GeometryError::InvalidField {
            field: field.to_string(),
            requirement: ">= 1",
        }),
    }
}

/// Element count that spans `dimension` at roughly `pitch`: `round(d/p) + 1`.
///
/// Ties round to even so counts agree with the reference tooling.
fn count_for(dimension: f64, pitch: f64) -> usize {
    let steps = (dimension / pitch).round_ties_even();
    (steps.max(0.0) as usize + 1).max(1)
}

/// Physical extent of `count` elements at `pitch`; a single element spans one pitch.
fn extent_for(count: usize, pitch: f64) -> f64 {
    if count > 1 {
        (count - 1) as f64 * pitch
    } else {
        pitch
    }
}

/// Resolve element counts, pitches, and sizes for a layout request.
pub fn resolve_layout(spec: &LayoutSpec) -> Result<ResolvedLayout, GeometryError> {
    let resolved = match spec.mode {
        LayoutMode::Legacy => resolve_legacy(spec)?,
        LayoutMode::SizeDriven => resolve_size_driven(spec)?,
        LayoutMode::SpacingDriven => resolve_spacing_driven(spec)?,
    };
    log::debug!(
        "layout mode={} nx={} ny={} dx={:?} dy={:?}",
        resolved.mode,
        resolved.nx,
        resolved.ny,
        resolved.dx_m,
        resolved.dy_m
    );
    Ok(resolved)
}

fn resolve_legacy(spec: &LayoutSpec) -> Result<ResolvedLayout, GeometryError> {
    let mut out = ResolvedLayout::untouched(spec);
    let (dx, dy) = match spec.pitch_override {
        (Some(dx), Some(dy)) => (dx, dy),
        _ => return Ok(out),
    };
    let dx = positive(Some(dx), "geometry.dx")?;
    let dy = positive(Some(dy), "geometry.dy")?;
    let width = extent_for(spec.base_nx, dx);
    let height = extent_for(spec.base_ny, dy);

    out.dx_m = Some(dx);
    out.dy_m = Some(dy);
    out.width_m = Some(width);
    out.height_m = Some(height);
    out.effective = LayoutRecord {
        width_m: Some(width),
        height_m: Some(height),
        dx_m: Some(dx),
        dy_m: Some(dy),
        ..Default::default()
    };
    Ok(out)
}

fn resolve_size_driven(spec: &LayoutSpec) -> Result<ResolvedLayout, GeometryError> {
    let size = &spec.size;
    let width = positive(size.width_m, "geometry.size.width_m")?;
    let height = positive(size.height_m, "geometry.size.height_m")?;

    let (target_dx, target_dy, density) = match (size.target_dx_m, size.target_dy_m) {
        (Some(tdx), Some(tdy)) => (tdx, tdy, size.target_density_per_m2),
        _ => {
            let density = size.target_density_per_m2.ok_or_else(|| {
                GeometryError::MissingField(
                    "geometry.size requires target_dx_m/target_dy_m or target_density_per_m2"
                        .into(),
                )
            })?;
            let density = positive(Some(density), "geometry.size.target_density_per_m2")?;
            let pitch = (1.0 / density).sqrt();
            (pitch, pitch, Some(density))
        }
    };
    let target_dx = positive(Some(target_dx), "geometry.size.target_dx_m")?;
    let target_dy = positive(Some(target_dy), "geometry.size.target_dy_m")?;

    let nx = count_for(width, target_dx);
    let ny = count_for(height, target_dy);

    // Pitch absorbs the rounding so the aperture matches the requested size.
    let dx_eff = if nx > 1 { width / (nx - 1) as f64 } else { width };
    let dy_eff = if ny > 1 { height / (ny - 1) as f64 } else { height };

    Ok(ResolvedLayout {
        mode: LayoutMode::SizeDriven,
        nx,
        ny,
        dx_m: Some(dx_eff),
        dy_m: Some(dy_eff),
        width_m: Some(width),
        height_m: Some(height),
        requested: LayoutRecord {
            width_m: Some(width),
            height_m: Some(height),
            target_dx_m: Some(target_dx),
            target_dy_m: Some(target_dy),
            target_density_per_m2: density,
            ..Default::default()
        },
        effective: LayoutRecord {
            width_m: Some(width),
            height_m: Some(height),
            dx_m: Some(dx_eff),
            dy_m: Some(dy_eff),
            ..Default::default()
        },
        rounding: Some(RoundingDeltas {
            width_m_delta: 0.0,
            height_m_delta: 0.0,
            dx_m_delta: Some(dx_eff - target_dx),
            dy_m_delta: Some(dy_eff - target_dy),
        }),
    })
}

fn resolve_spacing_driven(spec: &LayoutSpec) -> Result<ResolvedLayout, GeometryError> {
    let spacing = &spec.spacing;
    let dx = positive(spacing.dx_m, "geometry.spacing.dx_m")?;
    let dy = positive(spacing.dy_m, "geometry.spacing.dy_m")?;

    if spacing.num_cells_x.is_some() || spacing.num_cells_y.is_some() {
        let nx = positive_count(spacing.num_cells_x, "geometry.spacing.num_cells_x")?;
        let ny = positive_count(spacing.num_cells_y, "geometry.spacing.num_cells_y")?;
        let width = extent_for(nx, dx);
        let height = extent_for(ny, dy);
        return Ok(ResolvedLayout {
            mode: LayoutMode::SpacingDriven,
            nx,
            ny,
            dx_m: Some(dx),
            dy_m: Some(dy),
            width_m: Some(width),
            height_m: Some(height),
            requested: LayoutRecord {
                dx_m: Some(dx),
                dy_m: Some(dy),
                num_cells_x: Some(nx),
                num_cells_y: Some(ny),
                ..Default::default()
            },
            effective: LayoutRecord {
                width_m: Some(width),
                height_m: Some(height),
                dx_m: Some(dx),
                dy_m: Some(dy),
                ..Default::default()
            },
            rounding: None,
        });
    }

    let (width, height) = match (spacing.width_m, spacing.height_m) {
        (Some(w), Some(h)) => (w, h),
        _ => {
            return Err(GeometryError::MissingField(
                "geometry.spacing requires num_cells_x/num_cells_y or width_m/height_m".into(),
            ))
        }
    };
    let width = positive(Some(width), "geometry.spacing.width_m")?;
    let height = positive(Some(height), "geometry.spacing.height_m")?;

    let nx = count_for(width, dx);
    let ny = count_for(height, dy);
    let width_eff = if nx > 1 { (nx - 1) as f64 * dx } else { width };
    let height_eff = if ny > 1 { (ny - 1) as f64 * dy } else { height };

    Ok(ResolvedLayout {
        mode: LayoutMode::SpacingDriven,
        nx,
        ny,
        dx_m: Some(dx),
        dy_m: Some(dy),
        width_m: Some(width_eff),
        height_m: Some(height_eff),
        requested: LayoutRecord {
            width_m: Some(width),
            height_m: Some(height),
            dx_m: Some(dx),
            dy_m: Some(dy),
            ..Default::default()
        },
        effective: LayoutRecord {
            width_m: Some(width_eff),
            height_m: Some(height_eff),
            dx_m: Some(dx),
            dy_m: Some(dy),
            ..Default::default()
        },
        rounding: Some(RoundingDeltas {
            width_m_delta: width_eff - width,
            height_m_delta: height_eff - height,
            dx_m_delta: None,
            dy_m_delta: None,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_spec(width: f64, height: f64, tdx: f64, tdy: f64) -> LayoutSpec {
        LayoutSpec {
            mode: LayoutMode::SizeDriven,
            size: SizeSpec {
                width_m: Some(width),
                height_m: Some(height),
                target_dx_m: Some(tdx),
                target_dy_m: Some(tdy),
                target_density_per_m2: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!("size".parse::<LayoutMode>().unwrap(), LayoutMode::SizeDriven);
        assert_eq!(" Spacing-Driven ".parse::<LayoutMode>().unwrap(), LayoutMode::SpacingDriven);
        assert_eq!("legacy".parse::<LayoutMode>().unwrap(), LayoutMode::Legacy);
        assert!(matches!("grid".parse::<LayoutMode>(), Err(GeometryError::UnknownMode(_))));
    }

    #[test]
    fn test_size_driven_matches_aperture() {
        let out = resolve_layout(&size_spec(0.2, 0.1, 0.02, 0.01)).unwrap();
        assert_eq!(out.nx, 11);
        assert_eq!(out.ny, 11);
        assert!((out.dx_m.unwrap() - 0.02).abs() < 1e-12);
        assert!((out.dy_m.unwrap() - 0.01).abs() < 1e-12);
        assert_eq!(out.width_m, Some(0.2));
        assert_eq!(out.height_m, Some(0.1));
        let r = out.rounding.unwrap();
        assert_eq!(r.width_m_delta, 0.0);
        assert!(r.dx_m_delta.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_size_driven_adjusts_pitch() {
        // 0.1 / 0.03 = 3.33 -> 3 steps -> 4 elements at 0.0333 m.
        let out = resolve_layout(&size_spec(0.1, 0.1, 0.03, 0.03)).unwrap();
        assert_eq!(out.nx, 4);
        assert!((out.dx_m.unwrap() - 0.1 / 3.0).abs() < 1e-12);
        assert_eq!(out.width_m, Some(0.1));
        let delta = out.rounding.unwrap().dx_m_delta.unwrap();
        assert!((delta - (0.1 / 3.0 - 0.03)).abs() < 1e-12);
    }

    #[test]
    fn test_size_driven_density() {
        let spec = LayoutSpec {
            mode: LayoutMode::SizeDriven,
            size: SizeSpec {
                width_m: Some(0.1),
                height_m: Some(0.1),
                target_density_per_m2: Some(10_000.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = resolve_layout(&spec).unwrap();
        assert_eq!(out.nx, 11);
        assert_eq!(out.requested.target_density_per_m2, Some(10_000.0));
        assert!((out.requested.target_dx_m.unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_spacing_driven_from_size() {
        let spec = LayoutSpec {
            mode: LayoutMode::SpacingDriven,
            spacing: SpacingSpec {
                dx_m: Some(0.01),
                dy_m: Some(0.02),
                width_m: Some(0.2),
                height_m: Some(0.2),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = resolve_layout(&spec).unwrap();
        assert_eq!(out.nx, 21);
        assert_eq!(out.ny, 11);
        assert!((out.width_m.unwrap() - 0.2).abs() < 1e-9);
        assert!((out.height_m.unwrap() - 0.2).abs() < 1e-9);
        assert!(out.rounding.is_some());
    }

    #[test]
    fn test_spacing_driven_from_counts() {
        let spec = LayoutSpec {
            mode: LayoutMode::SpacingDriven,
            spacing: SpacingSpec {
                dx_m: Some(0.01),
                dy_m: Some(0.02),
                num_cells_x: Some(10),
                num_cells_y: Some(5),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = resolve_layout(&spec).unwrap();
        assert_eq!((out.nx, out.ny), (10, 5));
        assert!((out.width_m.unwrap() - 0.09).abs() < 1e-12);
        assert!((out.height_m.unwrap() - 0.08).abs() < 1e-12);
        assert!(out.rounding.is_none());
    }

    #[test]
    fn test_spacing_driven_needs_one_count_pair() {
        let spec = LayoutSpec {
            mode: LayoutMode::SpacingDriven,
            spacing: SpacingSpec {
                dx_m: Some(0.01),
                dy_m: Some(0.01),
                num_cells_x: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = resolve_layout(&spec).unwrap_err();
        assert!(err.to_string().contains("num_cells_y"), "{}", err);
    }

    #[test]
    fn test_legacy_preserves_counts() {
        let spec = LayoutSpec {
            base_nx: 12,
            base_ny: 8,
            ..Default::default()
        };
        let out = resolve_layout(&spec).unwrap();
        assert_eq!(out.mode, LayoutMode::Legacy);
        assert_eq!((out.nx, out.ny), (12, 8));
        assert_eq!(out.dx_m, None);

        let with_pitch = LayoutSpec {
            pitch_override: (Some(0.01), Some(0.02)),
            ..spec
        };
        let out = resolve_layout(&with_pitch).unwrap();
        assert!((out.width_m.unwrap() - 0.11).abs() < 1e-12);
        assert!((out.height_m.unwrap() - 0.14).abs() < 1e-12);
    }

    #[test]
    fn test_size_driven_missing_fields() {
        let spec = LayoutSpec {
            mode: LayoutMode::SizeDriven,
            ..Default::default()
        };
        assert!(resolve_layout(&spec).is_err());
    }

    /// Resolve, write the derived counts and pitch back, and resolve again.
    fn assert_resolution_stable(spec: LayoutSpec) {
        let first = resolve_layout(&spec).unwrap();
        let written_back = LayoutSpec {
            base_nx: first.nx,
            base_ny: first.ny,
            pitch_override: (first.dx_m, first.dy_m),
            ..spec
        };
        let second = resolve_layout(&written_back).unwrap();
        assert_eq!(first, second, "mode {}", written_back.mode);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        assert_resolution_stable(size_spec(0.137, 0.091, 0.0049, 0.0051));
        assert_resolution_stable(LayoutSpec {
            mode: LayoutMode::SpacingDriven,
            spacing: SpacingSpec {
                dx_m: Some(0.0049),
                dy_m: Some(0.0051),
                width_m: Some(0.137),
                height_m: Some(0.091),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_resolution_stable(LayoutSpec {
            mode: LayoutMode::SpacingDriven,
            spacing: SpacingSpec {
                dx_m: Some(0.01),
                dy_m: Some(0.02),
                num_cells_x: Some(7),
                num_cells_y: Some(3),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_resolution_stable(LayoutSpec {
            base_nx: 12,
            base_ny: 8,
            pitch_override: (Some(0.0049), Some(0.0051)),
            ..Default::default()
        });
        assert_resolution_stable(LayoutSpec {
            base_nx: 5,
            base_ny: 2,
            ..Default::default()
        });
    }

    #[test]
    fn test_nested_specs_reject_unknown_keys() {
        let err = serde_json::from_str::<SizeSpec>(r#"{"width_m": 0.1, "widht_m": 0.2}"#)
            .unwrap_err();
        assert!(err.to_string().contains("widht_m"), "{}", err);
        assert!(serde_json::from_str::<SpacingSpec>(r#"{"pitch": 0.01}"#).is_err());
        let ok: SpacingSpec = serde_json::from_str(r#"{"dx_m": 0.01}"#).unwrap();
        assert_eq!(ok.dx_m, Some(0.01));
    }
}
