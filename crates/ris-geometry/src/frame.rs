//! Right-handed local frame of a reflecting panel.
//!
//! The frame is `(u, v, w)`: `w` is the panel normal, `u` the in-plane
//! x-axis (the component of a user hint orthogonal to `w`), and
//! `v = w × u`. All receive and transmit angles in RIS Lab are measured in
//! the `(w, u)` plane of this frame.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

const DEFAULT_NORMAL: [f64; 3] = [0.0, 0.0, 1.0];
const DEFAULT_X_AXIS: [f64; 3] = [1.0, 0.0, 0.0];
const ALT_X_AXIS: [f64; 3] = [0.0, 1.0, 0.0];

/// Hints with `|hint · w|` above this are treated as colinear with the normal.
const COLINEAR_THRESHOLD: f64 = 0.99;

/// Orthonormal panel frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFrame {
    /// In-plane x-axis.
    pub u: [f64; 3],
    /// In-plane y-axis.
    pub v: [f64; 3],
    /// Panel normal.
    pub w: [f64; 3],
}

impl Default for LocalFrame {
    fn default() -> Self {
        Self {
            u: DEFAULT_X_AXIS,
            v: ALT_X_AXIS,
            w: DEFAULT_NORMAL,
        }
    }
}

impl LocalFrame {
    /// Point at `distance` from `centre` in the `(w, u)` plane, `angle_deg`
    /// measured from the normal towards `u`.
    ///
    /// $\mathbf{p} = \mathbf{c} + d(\cos\theta\,\hat{w} + \sin\theta\,\hat{u})$
    pub fn point_in_azimuth_plane(&self, centre: &[f64; 3], distance: f64, angle_deg: f64) -> [f64; 3] {
        let dir = self.azimuth_direction(angle_deg);
        [
            centre[0] + distance * dir[0],
            centre[1] + distance * dir[1],
            centre[2] + distance * dir[2],
        ]
    }

    /// Unit direction `cosθ·w + sinθ·u`.
    pub fn azimuth_direction(&self, angle_deg: f64) -> [f64; 3] {
        let (s, c) = angle_deg.to_radians().sin_cos();
        [
            c * self.w[0] + s * self.u[0],
            c * self.w[1] + s * self.u[1],
            c * self.w[2] + s * self.u[2],
        ]
    }
}

/// Dot product of two 3-vectors.
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// `a - b`.
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Euclidean norm.
pub fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn to_vector(v: &[f64; 3]) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

fn to_array(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Normalise a vector, failing on zero length.
pub fn normalise(v: &[f64; 3], name: &'static str) -> Result<[f64; 3], GeometryError> {
    let vec = to_vector(v);
    let norm = vec.norm();
    if !(norm > 0.0) {
        return Err(GeometryError::ZeroVector { name });
    }
    Ok(to_array(&(vec / norm)))
}

/// Build the local frame from an optional normal and x-axis hint.
///
/// Missing inputs default to `w = +z` and hint `+x`. A hint nearly colinear
/// with the normal is replaced by `+y`, and then by `+x` if that is also
/// colinear, so the result is never degenerate.
///
/// # Errors
/// [`GeometryError::ZeroVector`] if either supplied vector has zero length.
pub fn compute_local_frame(
    normal: Option<[f64; 3]>,
    x_axis_hint: Option<[f64; 3]>,
) -> Result<LocalFrame, GeometryError> {
    let w = to_vector(&normalise(&normal.unwrap_or(DEFAULT_NORMAL), "normal")?);
    let mut hint = to_vector(&normalise(&x_axis_hint.unwrap_or(DEFAULT_X_AXIS), "x_axis_hint")?);

    if hint.dot(&w).abs() > COLINEAR_THRESHOLD {
        log::warn!("x_axis_hint is colinear with the normal; falling back to +y");
        hint = to_vector(&ALT_X_AXIS);
        if hint.dot(&w).abs() > COLINEAR_THRESHOLD {
            hint = to_vector(&DEFAULT_X_AXIS);
        }
    }

    // u = normalise(hint - (hint . w) w)
    let u = to_vector(&normalise(&to_array(&(hint - hint.dot(&w) * w)), "x_axis_hint")?);
    let v = w.cross(&u);

    Ok(LocalFrame {
        u: to_array(&u),
        v: to_array(&v),
        w: to_array(&w),
    })
}
