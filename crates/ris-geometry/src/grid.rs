//! Element-center grids on a panel frame.
//!
//! Element `(row, col)` of an `ny × nx` panel sits at
//!
//! $$
//! \mathbf{r}_{rc} = \mathbf{o} + \bigl(c - \tfrac{n_x - 1}{2}\bigr) d_x \hat{u}
//!                 + \bigl(r - \tfrac{n_y - 1}{2}\bigr) d_y \hat{v}
//! $$
//!
//! so the grid is symmetric about the origin `o`. Storage is row-major with
//! shape `(ny, nx, 3)`.

use ndarray::Array3;

use crate::error::GeometryError;
use crate::frame::{compute_local_frame, LocalFrame};

/// Element centers of a panel together with its local frame.
#[derive(Debug, Clone)]
pub struct ElementGrid {
    /// Center positions, shape `(ny, nx, 3)` (metres).
    pub centers: Array3<f64>,
    /// Panel frame the grid was laid out on.
    pub frame: LocalFrame,
    /// Pitch along `u` (metres).
    pub dx: f64,
    /// Pitch along `v` (metres).
    pub dy: f64,
}

impl ElementGrid {
    /// Number of columns (elements along `u`).
    pub fn nx(&self) -> usize {
        self.centers.dim().1
    }

    /// Number of rows (elements along `v`).
    pub fn ny(&self) -> usize {
        self.centers.dim().0
    }

    /// Phase-map shape `(ny, nx)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.ny(), self.nx())
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.nx() * self.ny()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Center of element `(row, col)`.
    pub fn position(&self, row: usize, col: usize) -> [f64; 3] {
        [
            self.centers[[row, col, 0]],
            self.centers[[row, col, 1]],
            self.centers[[row, col, 2]],
        ]
    }

    /// All centers in row-major order.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        let (ny, nx) = self.shape();
        let mut out = Vec::with_capacity(nx * ny);
        for row in 0..ny {
            for col in 0..nx {
                out.push(self.position(row, col));
            }
        }
        out
    }

    /// Mean of all element centers.
    pub fn centroid(&self) -> [f64; 3] {
        let n = self.len().max(1) as f64;
        let mut c = [0.0; 3];
        for p in self.positions() {
            c[0] += p[0];
            c[1] += p[1];
            c[2] += p[2];
        }
        [c[0] / n, c[1] / n, c[2] / n]
    }
}

/// Lay out an `ny × nx` grid of element centers.
///
/// # Arguments
/// * `nx`, `ny` — Element counts along `u` and `v`.
/// * `dx`, `dy` — Pitches along `u` and `v` (metres).
/// * `origin` — Grid center (default `[0, 0, 0]`).
/// * `normal`, `x_axis_hint` — Passed to [`compute_local_frame`].
///
/// # Errors
/// Fails before allocating if a count or pitch is not positive, or if a frame
/// vector is zero.
pub fn compute_element_centers(
    nx: i64,
    ny: i64,
    dx: f64,
    dy: f64,
    origin: Option<[f64; 3]>,
    normal: Option<[f64; 3]>,
    x_axis_hint: Option<[f64; 3]>,
) -> Result<ElementGrid, GeometryError> {
    if nx <= 0 || ny <= 0 {
        return Err(GeometryError::InvalidCount { nx, ny });
    }
    if !(dx > 0.0 && dy > 0.0) {
        return Err(GeometryError::InvalidPitch { dx, dy });
    }

    let frame = compute_local_frame(normal, x_axis_hint)?;
    let origin = origin.unwrap_or([0.0; 3]);
    let (nx, ny) = (nx as usize, ny as usize);

    let x_mid = (nx as f64 - 1.0) / 2.0;
    let y_mid = (ny as f64 - 1.0) / 2.0;

    let centers = Array3::from_shape_fn((ny, nx, 3), |(row, col, axis)| {
        let x_off = (col as f64 - x_mid) * dx;
        let y_off = (row as f64 - y_mid) * dy;
        origin[axis] + x_off * frame.u[axis] + y_off * frame.v[axis]
    });

    Ok(ElementGrid { centers, frame, dx, dy })
}
