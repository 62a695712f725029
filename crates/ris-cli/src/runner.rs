//! Run orchestration: output directories, config snapshots, stage progress,
//! and artifact files around the `ris_core` pipeline.

use std::cell::Cell;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array1;
use ndarray_npy::write_npy;
use serde_json::json;

use ris_core::config::{config_hash, load_config, RisLabConfig};
use ris_core::pattern::metrics::compute_metrics;
use ris_core::pattern::PatternSample;
use ris_core::reference::load_reference;
use ris_core::validation::validate_against_reference;
use ris_core::ExperimentSetup;

/// What a `run` invocation evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Normalized receive-angle sweep.
    Pattern,
    /// Single receive angle, unnormalized.
    Link,
}

impl RunMode {
    fn as_str(&self) -> &'static str {
        match self {
            RunMode::Pattern => "pattern",
            RunMode::Link => "link",
        }
    }
}

const PATTERN_STAGES: [&str; 5] = ["snapshot", "geometry", "phase", "pattern", "metrics"];
const LINK_STAGES: [&str; 5] = ["snapshot", "geometry", "phase", "link", "metrics"];
const VALIDATE_STAGES: [&str; 6] = ["snapshot", "geometry", "phase", "reference", "validate", "metrics"];

/// `progress.json` writer; the file is rewritten on every update.
struct Progress {
    path: PathBuf,
    stages: &'static [&'static str],
    current: Cell<usize>,
}

impl Progress {
    fn new(output_dir: &Path, stages: &'static [&'static str]) -> Self {
        Self {
            path: output_dir.join("progress.json"),
            stages,
            current: Cell::new(0),
        }
    }

    fn stage(&self, step: usize) -> Result<()> {
        self.current.set(step);
        log::debug!("stage {}/{}: {}", step + 1, self.stages.len(), self.stages[step]);
        self.write(step, "running")
    }

    fn complete(&self) -> Result<()> {
        self.write(self.stages.len(), "completed")
    }

    fn fail(&self) {
        if let Err(e) = self.write(self.current.get(), "failed") {
            log::warn!("could not record failure in {}: {}", self.path.display(), e);
        }
    }

    fn write(&self, step: usize, status: &str) -> Result<()> {
        let stage = self.stages.get(step).copied().unwrap_or("done");
        let payload = json!({
            "stage": stage,
            "step": step,
            "total": self.stages.len(),
            "status": status,
        });
        write_json(&self.path, &payload)
    }
}

/// A resolved configuration with its output directory laid out and
/// snapshotted.
pub struct RunContext {
    pub config: RisLabConfig,
    pub config_hash: String,
    pub run_id: String,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl RunContext {
    /// Load, resolve, and hash `config_path`, then create the output tree and
    /// write `config.yaml`, `config.json`, and `summary.json`.
    pub fn prepare(config_path: &Path, output_override: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        let hash = config_hash(&config)?;

        let output_dir = match output_override {
            Some(dir) => dir.to_path_buf(),
            None => {
                let run_id = config
                    .output
                    .run_id
                    .clone()
                    .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
                PathBuf::from(&config.output.base_dir).join(run_id)
            }
        };
        let run_id = output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data_dir = output_dir.join("data");
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let yaml_path = output_dir.join("config.yaml");
        let json_path = output_dir.join("config.json");
        std::fs::write(&yaml_path, config.to_yaml()?)?;
        std::fs::write(&json_path, config.to_canonical_json()?)?;
        let summary = json!({
            "schema_version": config.schema_version,
            "config": {
                "source": config_path.display().to_string(),
                "hash_sha256": hash,
            },
            "paths": {
                "output_dir": output_dir.display().to_string(),
                "data_dir": data_dir.display().to_string(),
                "config_yaml": yaml_path.display().to_string(),
                "config_json": json_path.display().to_string(),
            },
        });
        write_json(&output_dir.join("summary.json"), &summary)?;

        Ok(Self {
            config,
            config_hash: hash,
            run_id,
            output_dir,
            data_dir,
        })
    }

    /// Fields shared by every `metrics.json`.
    fn base_metrics(&self, mode: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut m = serde_json::Map::new();
        m.insert("run_id".into(), json!(self.run_id));
        m.insert("mode".into(), json!(mode));
        m.insert("output_dir".into(), json!(self.output_dir.display().to_string()));
        m.insert("config_hash".into(), json!(self.config_hash));
        m.insert(
            "layout".into(),
            serde_json::to_value(self.config.geometry.layout_report()?)?,
        );
        Ok(m)
    }
}

/// Run a pattern or link experiment; returns the output directory.
pub fn run(config_path: &Path, mode: RunMode, output_override: Option<&Path>) -> Result<PathBuf> {
    let ctx = RunContext::prepare(config_path, output_override)?;
    let stages: &'static [&'static str] = match mode {
        RunMode::Pattern => &PATTERN_STAGES,
        RunMode::Link => &LINK_STAGES,
    };
    let progress = Progress::new(&ctx.output_dir, stages);
    progress.stage(0)?;

    let result = run_stages(&ctx, mode, &progress);
    if result.is_err() {
        progress.fail();
    }
    result?;
    progress.complete()?;
    log::info!(
        "run_id={} mode={} output_dir={}",
        ctx.run_id,
        mode.as_str(),
        ctx.output_dir.display()
    );
    Ok(ctx.output_dir)
}

fn run_stages(ctx: &RunContext, mode: RunMode, progress: &Progress) -> Result<()> {
    progress.stage(1)?;
    let setup = ExperimentSetup::from_config(&ctx.config)?;
    println!(
        "  Panel: {} × {} elements, pitch {:.4} × {:.4} m, λ = {:.4} m",
        setup.grid.nx(),
        setup.grid.ny(),
        setup.grid.dx,
        setup.grid.dy,
        setup.wavelength_m
    );

    progress.stage(2)?;
    let phase = setup.phase_map()?;
    write_npy(ctx.data_dir.join("phase_map.npy"), &phase).context("Failed to write phase_map.npy")?;

    progress.stage(3)?;
    let mut metrics = ctx.base_metrics(mode.as_str())?;
    match mode {
        RunMode::Pattern => {
            let pattern = setup.pattern(&phase)?;
            write_pattern_arrays(&ctx.data_dir, &pattern)?;
            write_pattern_csv(&pattern, &ctx.data_dir.join("pattern.csv"), ctx)?;
            if ctx.config.pattern_mode.include_off_baseline {
                let off = setup.off_baseline()?;
                write_npy(ctx.data_dir.join("pattern_off_db.npy"), &Array1::from(off.db.clone()))
                    .context("Failed to write pattern_off_db.npy")?;
            }

            progress.stage(4)?;
            let summary = compute_metrics(&pattern.theta_deg, &pattern.db)?;
            metrics.insert(
                "normalization".into(),
                serde_json::to_value(ctx.config.pattern_mode.normalization)?,
            );
            metrics.insert("model".into(), serde_json::to_value(ctx.config.pattern_mode.model)?);
            metrics.insert("peak_angle_deg".into(), json!(summary.peak_angle_deg));
            metrics.insert("peak_db".into(), json!(summary.peak_db));
            metrics.insert("peak_linear".into(), json!(pattern.linear[summary.peak_index]));
            metrics.insert("beamwidth_3db_deg".into(), json!(summary.beamwidth_3db_deg));
            metrics.insert("sidelobe_level_db".into(), json!(summary.sidelobe_level_db));
            println!(
                "  Peak {:.2} dB at {:.1}°, 3 dB beamwidth {:.1}°",
                summary.peak_db, summary.peak_angle_deg, summary.beamwidth_3db_deg
            );
        }
        RunMode::Link => {
            let link = setup.link(&phase)?;

            progress.stage(4)?;
            metrics.insert("rx_angle_deg".into(), json!(link.rx_angle_deg));
            metrics.insert("link_gain_linear".into(), json!(link.link_gain_linear));
            metrics.insert("link_gain_db".into(), json!(link.link_gain_db));
            println!(
                "  Link gain at {:.1}°: {:.2} dB",
                link.rx_angle_deg, link.link_gain_db
            );
        }
    }
    write_json(&ctx.output_dir.join("metrics.json"), &serde_json::Value::Object(metrics))
}

/// Score the configured experiment against a reference pattern; returns the
/// output directory and whether all thresholds were met.
pub fn validate(
    config_path: &Path,
    reference_path: &Path,
    output_override: Option<&Path>,
) -> Result<(PathBuf, bool)> {
    let ctx = RunContext::prepare(config_path, output_override)?;
    let progress = Progress::new(&ctx.output_dir, &VALIDATE_STAGES);
    progress.stage(0)?;

    let result = validate_stages(&ctx, reference_path, &progress);
    if result.is_err() {
        progress.fail();
    }
    let passed = result?;
    progress.complete()?;
    log::info!(
        "run_id={} mode=validate output_dir={}",
        ctx.run_id,
        ctx.output_dir.display()
    );
    Ok((ctx.output_dir, passed))
}

fn validate_stages(ctx: &RunContext, reference_path: &Path, progress: &Progress) -> Result<bool> {
    progress.stage(1)?;
    let setup = ExperimentSetup::from_config(&ctx.config)?;

    progress.stage(2)?;
    let phase = setup.phase_map()?;
    write_npy(ctx.data_dir.join("phase_map.npy"), &phase).context("Failed to write phase_map.npy")?;

    progress.stage(3)?;
    let reference = load_reference(reference_path)
        .with_context(|| format!("Failed to load reference {}", reference_path.display()))?;

    progress.stage(4)?;
    let sim_linear = setup.evaluate(&phase, &reference.theta_deg)?;
    let report = validate_against_reference(&reference, &sim_linear, &ctx.config.validation)?;

    progress.stage(5)?;
    let mut metrics = ctx.base_metrics("validate")?;
    metrics.insert(
        "reference_path".into(),
        json!(reference_path.display().to_string()),
    );
    metrics.insert(
        "normalization".into(),
        serde_json::to_value(ctx.config.validation.normalization)?,
    );
    metrics.insert("rmse_db".into(), json!(report.rmse_db));
    metrics.insert("peak_angle_error_deg".into(), json!(report.peak_angle_error_deg));
    metrics.insert("peak_db_error".into(), json!(report.peak_db_error));
    metrics.insert("thresholds".into(), serde_json::to_value(report.thresholds)?);
    metrics.insert("passed".into(), json!(report.passed));
    write_json(&ctx.output_dir.join("metrics.json"), &serde_json::Value::Object(metrics))?;

    println!(
        "  RMSE {:.3} dB, peak angle error {:.2}°, peak level error {:.3} dB",
        report.rmse_db, report.peak_angle_error_deg, report.peak_db_error
    );
    Ok(report.passed)
}

fn write_pattern_arrays(data_dir: &Path, pattern: &PatternSample) -> Result<()> {
    let arrays = [
        ("theta_deg.npy", &pattern.theta_deg),
        ("pattern_linear.npy", &pattern.linear),
        ("pattern_db.npy", &pattern.db),
    ];
    for (name, values) in arrays {
        write_npy(data_dir.join(name), &Array1::from(values.clone()))
            .with_context(|| format!("Failed to write {}", name))?;
    }
    Ok(())
}

/// Write the normalized pattern to a CSV file with a metadata header.
pub fn write_pattern_csv(pattern: &PatternSample, path: &Path, ctx: &RunContext) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;

    let geometry = &ctx.config.geometry;
    writeln!(file, "# RIS Lab — Receive Pattern")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# config_hash: {}", ctx.config_hash)?;
    writeln!(
        file,
        "# panel: {} x {} elements, dx={} m, dy={} m",
        geometry.nx, geometry.ny, geometry.dx, geometry.dy
    )?;
    writeln!(file, "# frequency_hz: {}", ctx.config.experiment.frequency_hz)?;
    writeln!(file, "# control: {}", ctx.config.control.mode)?;
    writeln!(file, "#")?;
    writeln!(file, "theta_deg,pattern_linear,pattern_db")?;
    for ((theta, linear), db) in pattern.theta_deg.iter().zip(&pattern.linear).zip(&pattern.db) {
        writeln!(file, "{:.4},{:.6e},{:.4}", theta, linear, db)?;
    }
    Ok(())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
