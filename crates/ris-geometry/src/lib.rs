//! # RIS Lab Geometry
//!
//! Geometry handling for the RIS Lab engine. This crate provides:
//!
//! - **Local frames** ([`frame`]) — A right-handed `(u, v, w)` basis for a
//!   panel, built from its normal and an in-plane x-axis hint.
//! - **Element grids** ([`grid`]) — Row-major 3-D element centers laid out
//!   on that frame at a given pitch.
//! - **Layout resolution** ([`layout`]) — Legacy, size-driven, and
//!   spacing-driven derivation of element counts and pitches, with the
//!   rounding between requested and effective values recorded.

pub mod error;
pub mod frame;
pub mod grid;
pub mod layout;

pub use error::GeometryError;
pub use frame::{compute_local_frame, LocalFrame};
pub use grid::{compute_element_centers, ElementGrid};
pub use layout::{resolve_layout, LayoutMode, LayoutSpec, ResolvedLayout};
