//! # RIS Lab Core
//!
//! The numerical engine of RIS Lab. Given a panel geometry and a control
//! intent, it synthesizes a per-element phase map, optionally quantizes it,
//! evaluates the reradiated pattern or link gain, and scores simulated
//! patterns against reference measurements.
//!
//! ## Architecture
//!
//! Pattern models implement the [`pattern::PatternModel`] trait. The primary
//! implementation is the near-field link model
//! ([`pattern::near_field::NearFieldModel`]); an ideal far-field array factor
//! is provided for quick steering checks.
//!
//! ## Modules
//!
//! - [`config`] — Raw configuration, resolution with defaults and aliases, hashing.
//! - [`setup`] — Grid, transmitter, and model assembly from a resolved config.
//! - [`phase`] — Phase-profile synthesis (uniform, steer, focus, custom, reflectarray).
//! - [`quantize`] — 1- and 2-bit phase quantization.
//! - [`pattern`] — Pattern models, normalization, sweep, and metrics.
//! - [`reference`] — CSV / NPZ / MAT reference-pattern import.
//! - [`validation`] — RMSE and peak-error scoring.
//! - [`units`] — Physical constants and dB conversions.

pub mod config;
pub mod error;
pub mod pattern;
pub mod phase;
pub mod quantize;
pub mod reference;
pub mod setup;
pub mod units;
pub mod validation;

pub use config::{config_hash, load_config, resolve_config, RisLabConfig};
pub use error::RisError;
pub use setup::ExperimentSetup;
