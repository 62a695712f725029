//! RIS Lab configuration: raw input, resolution, and fingerprinting.
//!
//! A configuration file (YAML, JSON, or TOML) deserialises into a
//! [`RawConfig`] in which every field is optional and legacy aliases are
//! still present. [`resolve_config`] turns that into a [`RisLabConfig`] in a
//! single pass:
//!
//! 1. Aliases are applied without overwriting canonical keys
//!    (`geometry.n → nx`, `m → ny`, `dx_m → dx`, `dy_m → dy`).
//! 2. Size- and spacing-driven geometry is resolved to counts and pitches.
//! 3. Required fields are checked, all missing ones reported together.
//! 4. Defaults are filled in and every value is validated.
//!
//! The resolved struct serialises its sections in a fixed order, followed by
//! any unrecognised top-level keys in alphabetical order, so identical
//! effective configurations always produce identical bytes and the same
//! [`config_hash`]. Unrecognised keys inside a section are kept after that
//! section's own fields. The leaf blocks `geometry.size`, `geometry.spacing`
//! and `pattern_mode.rx_sweep_deg` reject keys they do not know.

use std::collections::BTreeMap;
use std::path::Path;

use ris_geometry::layout::{SizeSpec, SpacingSpec};
use ris_geometry::{resolve_layout, GeometryError, LayoutMode, LayoutSpec, ResolvedLayout};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RisError;
use crate::pattern::{Normalization, PatternModelKind, SweepSpec};
use crate::phase::{ControlMode, ControlParams, PhaseControl};
use crate::quantize::QuantizationPolicy;
use crate::units::wavelength_m;

/// Unrecognised keys of a mapping, carried through untouched.
pub type ExtraKeys = BTreeMap<String, serde_json::Value>;

/// Current configuration schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ── Raw input ───────────────────────────────────────────────────────────

/// Configuration exactly as written by the user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub schema_version: Option<u32>,
    pub geometry: Option<RawGeometry>,
    pub control: Option<RawControl>,
    pub quantization: Option<RawQuantization>,
    pub pattern_mode: Option<RawPatternMode>,
    pub link_mode: Option<RawLinkMode>,
    pub validation: Option<RawValidation>,
    pub experiment: Option<RawExperiment>,
    pub output: Option<RawOutput>,
    /// Unrecognised top-level keys, carried through untouched.
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGeometry {
    pub nx: Option<i64>,
    pub ny: Option<i64>,
    pub dx: Option<f64>,
    pub dy: Option<f64>,
    /// Legacy alias of `nx`.
    pub n: Option<i64>,
    /// Legacy alias of `ny`.
    pub m: Option<i64>,
    /// Legacy alias of `dx`.
    pub dx_m: Option<f64>,
    /// Legacy alias of `dy`.
    pub dy_m: Option<f64>,
    pub origin: Option<[f64; 3]>,
    pub normal: Option<[f64; 3]>,
    pub x_axis_hint: Option<[f64; 3]>,
    pub mode: Option<String>,
    pub size: Option<SizeSpec>,
    pub spacing: Option<SpacingSpec>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawControl {
    pub mode: Option<String>,
    pub params: Option<ControlParams>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawQuantization {
    pub bits: Option<i64>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSweep {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPatternMode {
    pub normalization: Option<String>,
    pub rx_sweep_deg: Option<RawSweep>,
    pub model: Option<String>,
    pub include_off_baseline: Option<bool>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLinkMode {
    pub rx_angle_deg: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawValidation {
    pub normalization: Option<String>,
    pub rmse_db_max: Option<f64>,
    pub peak_angle_err_deg_max: Option<f64>,
    pub peak_db_err_max: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawExperiment {
    pub frequency_hz: Option<f64>,
    pub tx_angle_deg: Option<f64>,
    /// Older name of `tx_angle_deg`; ignored when both are given.
    pub tx_incident_angle_deg: Option<f64>,
    pub tx_distance_m: Option<f64>,
    pub rx_distance_m: Option<f64>,
    pub tx_gain_dbi: Option<f64>,
    pub rx_gain_dbi: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub reflection_coeff: Option<f64>,
    pub element_area_m2: Option<f64>,
    /// Square element side; area is its square.
    pub element_size_m: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOutput {
    pub base_dir: Option<String>,
    pub run_id: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

// ── Resolved configuration ──────────────────────────────────────────────

/// A fully resolved, validated configuration.
///
/// Field order is the canonical serialisation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RisLabConfig {
    pub schema_version: u32,
    pub geometry: GeometryConfig,
    pub control: ControlConfig,
    pub quantization: QuantizationConfig,
    pub pattern_mode: PatternModeConfig,
    pub link_mode: LinkModeConfig,
    pub validation: ValidationConfig,
    pub experiment: ExperimentConfig,
    pub output: OutputConfig,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64,
    pub origin: [f64; 3],
    pub normal: [f64; 3],
    pub x_axis_hint: [f64; 3],
    pub mode: LayoutMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<SpacingSpec>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

impl GeometryConfig {
    /// Layout request equivalent to this geometry.
    pub fn layout_spec(&self) -> LayoutSpec {
        LayoutSpec {
            mode: self.mode,
            base_nx: self.nx,
            base_ny: self.ny,
            pitch_override: (Some(self.dx), Some(self.dy)),
            size: self.size.clone().unwrap_or_default(),
            spacing: self.spacing.clone().unwrap_or_default(),
        }
    }

    /// Requested/effective/rounding report for this geometry.
    pub fn layout_report(&self) -> Result<ResolvedLayout, RisError> {
        Ok(resolve_layout(&self.layout_spec())?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    pub mode: ControlMode,
    pub params: ControlParams,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizationConfig {
    pub bits: u32,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternModeConfig {
    pub normalization: Normalization,
    pub rx_sweep_deg: SweepSpec,
    pub model: PatternModelKind,
    pub include_off_baseline: bool,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

impl Default for PatternModeConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::Peak0Db,
            rx_sweep_deg: SweepSpec::default(),
            model: PatternModelKind::NearField,
            include_off_baseline: false,
            extra: ExtraKeys::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkModeConfig {
    pub rx_angle_deg: f64,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub normalization: Normalization,
    pub rmse_db_max: f64,
    pub peak_angle_err_deg_max: f64,
    pub peak_db_err_max: f64,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::Peak0Db,
            rmse_db_max: 2.0,
            peak_angle_err_deg_max: 2.0,
            peak_db_err_max: 1.5,
            extra: ExtraKeys::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub frequency_hz: f64,
    pub tx_angle_deg: f64,
    pub tx_distance_m: f64,
    pub rx_distance_m: f64,
    pub tx_gain_dbi: f64,
    pub rx_gain_dbi: f64,
    pub tx_power_dbm: f64,
    pub reflection_coeff: f64,
    pub element_area_m2: f64,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub base_dir: String,
    pub run_id: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            run_id: None,
            extra: ExtraKeys::new(),
        }
    }
}

fn default_base_dir() -> String {
    "outputs".into()
}

const DEFAULT_FREQUENCY_HZ: f64 = 28e9;
const DEFAULT_TX_ANGLE_DEG: f64 = -30.0;
const DEFAULT_TX_DISTANCE_M: f64 = 0.4;
const DEFAULT_RX_DISTANCE_M: f64 = 2.0;
const DEFAULT_TX_GAIN_DBI: f64 = 15.0;
const DEFAULT_RX_GAIN_DBI: f64 = 22.0;
const DEFAULT_TX_POWER_DBM: f64 = 28.0;
const DEFAULT_REFLECTION_COEFF: f64 = 1.0;

impl RisLabConfig {
    pub fn wavelength_m(&self) -> f64 {
        wavelength_m(self.experiment.frequency_hz)
    }

    pub fn quantization_policy(&self) -> Result<QuantizationPolicy, RisError> {
        QuantizationPolicy::from_bits(Some(self.quantization.bits as i64))
    }

    pub fn phase_control(&self) -> Result<PhaseControl, RisError> {
        PhaseControl::from_params(self.control.mode, &self.control.params)
    }

    /// Copy with the control section replaced; `self` is left untouched.
    pub fn with_control(&self, mode: ControlMode, params: ControlParams) -> Self {
        let mut next = self.clone();
        next.control = ControlConfig {
            mode,
            params,
            extra: self.control.extra.clone(),
        };
        next
    }

    /// Pretty JSON in canonical key order.
    pub fn to_canonical_json(&self) -> Result<String, RisError> {
        serde_json::to_string_pretty(self).map_err(|e| RisError::Parse(e.to_string()))
    }

    /// YAML in canonical key order.
    pub fn to_yaml(&self) -> Result<String, RisError> {
        serde_yaml::to_string(self).map_err(|e| RisError::Parse(e.to_string()))
    }
}

// ── Resolution ──────────────────────────────────────────────────────────

/// Accumulates invalid values so they can be reported together.
#[derive(Default)]
struct Problems(Vec<String>);

impl Problems {
    fn positive(&mut self, field: &str, value: f64) {
        if !(value > 0.0 && value.is_finite()) {
            self.0.push(format!("{} must be positive (got {})", field, value));
        }
    }

    fn non_negative(&mut self, field: &str, value: f64) {
        if !(value >= 0.0) {
            self.0.push(format!("{} must be non-negative (got {})", field, value));
        }
    }

    fn finish(self) -> Result<(), RisError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(RisError::InvalidFields(self.0))
        }
    }
}

fn resolve_geometry(raw: Option<RawGeometry>) -> Result<GeometryConfig, RisError> {
    let raw = raw.unwrap_or_default();
    let mode = match raw.mode.as_deref() {
        Some(m) => m.parse::<LayoutMode>()?,
        None => LayoutMode::Legacy,
    };

    let nx = raw.nx.or(raw.n);
    let ny = raw.ny.or(raw.m);
    let dx = raw.dx.or(raw.dx_m);
    let dy = raw.dy.or(raw.dy_m);

    let (nx, ny, dx, dy) = if mode == LayoutMode::Legacy {
        let mut missing = Vec::new();
        for (name, present) in [
            ("geometry.nx", nx.is_some()),
            ("geometry.ny", ny.is_some()),
            ("geometry.dx", dx.is_some()),
            ("geometry.dy", dy.is_some()),
        ] {
            if !present {
                missing.push(name.to_string());
            }
        }
        match (nx, ny, dx, dy) {
            (Some(nx), Some(ny), Some(dx), Some(dy)) => (nx, ny, dx, dy),
            _ => return Err(RisError::MissingFields(missing)),
        }
    } else {
        let spec = LayoutSpec {
            mode,
            base_nx: nx.map_or(ris_geometry::layout::DEFAULT_LEGACY_COUNT, |n| n.max(1) as usize),
            base_ny: ny.map_or(ris_geometry::layout::DEFAULT_LEGACY_COUNT, |n| n.max(1) as usize),
            pitch_override: (dx, dy),
            size: raw.size.clone().unwrap_or_default(),
            spacing: raw.spacing.clone().unwrap_or_default(),
        };
        let layout = resolve_layout(&spec)?;
        let pitch = |derived: Option<f64>, axis: &str| {
            derived.ok_or_else(|| RisError::MissingFields(vec![format!("geometry.{}", axis)]))
        };
        (
            layout.nx as i64,
            layout.ny as i64,
            pitch(layout.dx_m, "dx")?,
            pitch(layout.dy_m, "dy")?,
        )
    };

    if nx <= 0 || ny <= 0 {
        return Err(GeometryError::InvalidCount { nx, ny }.into());
    }
    if !(dx > 0.0 && dy > 0.0) {
        return Err(GeometryError::InvalidPitch { dx, dy }.into());
    }

    Ok(GeometryConfig {
        nx: nx as usize,
        ny: ny as usize,
        dx,
        dy,
        origin: raw.origin.unwrap_or([0.0, 0.0, 0.0]),
        normal: raw.normal.unwrap_or([0.0, 0.0, 1.0]),
        x_axis_hint: raw.x_axis_hint.unwrap_or([1.0, 0.0, 0.0]),
        mode,
        size: raw.size,
        spacing: raw.spacing,
        extra: raw.extra,
    })
}

fn parse_normalization(value: Option<&str>) -> Result<Normalization, RisError> {
    value.map_or(Ok(Normalization::Peak0Db), str::parse::<Normalization>)
}

/// Apply aliases and defaults, derive geometry, and validate.
///
/// # Errors
/// [`RisError::MissingFields`] lists every missing required geometry field;
/// [`RisError::InvalidFields`] lists every out-of-range experiment or
/// validation value. Unknown mode strings and bad control parameters fail on
/// the first occurrence.
pub fn resolve_config(raw: RawConfig) -> Result<RisLabConfig, RisError> {
    let geometry = resolve_geometry(raw.geometry)?;

    let raw_control = raw.control.unwrap_or_default();
    let control = ControlConfig {
        mode: match raw_control.mode.as_deref() {
            Some(m) => m.parse()?,
            None => ControlMode::Uniform,
        },
        params: raw_control.params.unwrap_or_default(),
        extra: raw_control.extra,
    };
    // Surface missing or malformed control parameters before any work runs.
    if let PhaseControl::Custom { phase_map } = PhaseControl::from_params(control.mode, &control.params)? {
        if phase_map.dim() != (geometry.ny, geometry.nx) {
            return Err(RisError::ShapeMismatch {
                found: phase_map.dim(),
                expected: (geometry.ny, geometry.nx),
            });
        }
    }

    let raw_quantization = raw.quantization.unwrap_or_default();
    let quantization = QuantizationConfig {
        bits: QuantizationPolicy::from_bits(raw_quantization.bits)?.bits(),
        extra: raw_quantization.extra,
    };

    let raw_pattern = raw.pattern_mode.unwrap_or_default();
    let sweep_raw = raw_pattern.rx_sweep_deg.unwrap_or_default();
    let sweep_default = SweepSpec::default();
    let rx_sweep_deg = SweepSpec {
        start: sweep_raw.start.unwrap_or(sweep_default.start),
        stop: sweep_raw.stop.unwrap_or(sweep_default.stop),
        step: sweep_raw.step.unwrap_or(sweep_default.step),
    };
    rx_sweep_deg.validate()?;
    let pattern_mode = PatternModeConfig {
        normalization: parse_normalization(raw_pattern.normalization.as_deref())?,
        rx_sweep_deg,
        model: match raw_pattern.model.as_deref() {
            Some(m) => m.parse()?,
            None => PatternModelKind::NearField,
        },
        include_off_baseline: raw_pattern.include_off_baseline.unwrap_or(false),
        extra: raw_pattern.extra,
    };

    let raw_link = raw.link_mode.unwrap_or_default();
    let link_mode = LinkModeConfig {
        rx_angle_deg: raw_link.rx_angle_deg.unwrap_or(0.0),
        extra: raw_link.extra,
    };

    let mut problems = Problems::default();

    let raw_validation = raw.validation.unwrap_or_default();
    let defaults = ValidationConfig::default();
    let validation = ValidationConfig {
        normalization: parse_normalization(raw_validation.normalization.as_deref())?,
        rmse_db_max: raw_validation.rmse_db_max.unwrap_or(defaults.rmse_db_max),
        peak_angle_err_deg_max: raw_validation
            .peak_angle_err_deg_max
            .unwrap_or(defaults.peak_angle_err_deg_max),
        peak_db_err_max: raw_validation.peak_db_err_max.unwrap_or(defaults.peak_db_err_max),
        extra: raw_validation.extra,
    };
    problems.non_negative("validation.rmse_db_max", validation.rmse_db_max);
    problems.non_negative("validation.peak_angle_err_deg_max", validation.peak_angle_err_deg_max);
    problems.non_negative("validation.peak_db_err_max", validation.peak_db_err_max);

    let exp = raw.experiment.unwrap_or_default();
    let element_area_m2 = exp
        .element_area_m2
        .or(exp.element_size_m.map(|s| s * s))
        .unwrap_or(geometry.dx * geometry.dy);
    let experiment = ExperimentConfig {
        frequency_hz: exp.frequency_hz.unwrap_or(DEFAULT_FREQUENCY_HZ),
        tx_angle_deg: exp
            .tx_angle_deg
            .or(exp.tx_incident_angle_deg)
            .unwrap_or(DEFAULT_TX_ANGLE_DEG),
        tx_distance_m: exp.tx_distance_m.unwrap_or(DEFAULT_TX_DISTANCE_M),
        rx_distance_m: exp.rx_distance_m.unwrap_or(DEFAULT_RX_DISTANCE_M),
        tx_gain_dbi: exp.tx_gain_dbi.unwrap_or(DEFAULT_TX_GAIN_DBI),
        rx_gain_dbi: exp.rx_gain_dbi.unwrap_or(DEFAULT_RX_GAIN_DBI),
        tx_power_dbm: exp.tx_power_dbm.unwrap_or(DEFAULT_TX_POWER_DBM),
        reflection_coeff: exp.reflection_coeff.unwrap_or(DEFAULT_REFLECTION_COEFF),
        element_area_m2,
        extra: exp.extra,
    };
    problems.positive("experiment.frequency_hz", experiment.frequency_hz);
    problems.positive("experiment.tx_distance_m", experiment.tx_distance_m);
    problems.positive("experiment.rx_distance_m", experiment.rx_distance_m);
    problems.positive("experiment.element_area_m2", experiment.element_area_m2);
    if !(0.0..=1.0).contains(&experiment.reflection_coeff) {
        problems.0.push(format!(
            "experiment.reflection_coeff must be within [0, 1] (got {})",
            experiment.reflection_coeff
        ));
    }
    problems.finish()?;

    let raw_output = raw.output.unwrap_or_default();
    let output = OutputConfig {
        base_dir: raw_output.base_dir.unwrap_or_else(default_base_dir),
        run_id: raw_output.run_id,
        extra: raw_output.extra,
    };

    let config = RisLabConfig {
        schema_version: raw.schema_version.unwrap_or(SCHEMA_VERSION),
        geometry,
        control,
        quantization,
        pattern_mode,
        link_mode,
        validation,
        experiment,
        output,
        extra: raw.extra,
    };
    log::debug!(
        "resolved config: {}x{} elements, control={}, bits={}",
        config.geometry.nx,
        config.geometry.ny,
        config.control.mode,
        config.quantization.bits
    );
    Ok(config)
}

/// SHA-256 hex digest of the sorted-key compact JSON form.
///
/// Independent of the key order of the input file.
pub fn config_hash(config: &RisLabConfig) -> Result<String, RisError> {
    // Without `preserve_order`, serde_json maps are sorted by key.
    let value = serde_json::to_value(config).map_err(|e| RisError::Parse(e.to_string()))?;
    let payload = serde_json::to_string(&value).map_err(|e| RisError::Parse(e.to_string()))?;
    Ok(format!("{:x}", Sha256::digest(payload.as_bytes())))
}

// ── Loading ─────────────────────────────────────────────────────────────

/// Serialisation format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Result<Self, RisError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            other => Err(RisError::Unsupported {
                kind: "config format",
                value: other.to_string(),
                expected: "yaml, yml, json, toml",
            }),
        }
    }
}

/// Deserialise raw configuration text.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<RawConfig, RisError> {
    let parsed = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(RisError::Parse)
}

/// Load and resolve a configuration file.
pub fn load_config(path: &Path) -> Result<RisLabConfig, RisError> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    resolve_config(parse_config(&content, format)?)
}
