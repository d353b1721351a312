//! Matrix helpers shared by the exporter and the asset reader
//!
//! Matrices are `glam::Mat4` (column-vector convention, translation in
//! the last column). The asset grammar stores them row-major.

use glam::Mat4;

/// Number of decimal places every float is rounded to before it is written
pub const FLOAT_DECIMALS: usize = 6;

/// Determinant magnitude below which a matrix is treated as singular
pub const SINGULAR_EPSILON: f32 = 1e-12;

/// Diagonal nudge applied to a singular matrix before retrying
const REGULARIZE_EPSILON: f32 = 1e-8;

/// Outcome of [`safe_inverse`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inverse {
    /// The matrix was invertible
    Exact(Mat4),
    /// Singular input; inverted after nudging the 3x3 diagonal
    Regularized(Mat4),
    /// Nothing worked; identity substituted
    Identity,
}

impl Inverse {
    /// The resulting matrix, whatever path produced it
    pub fn matrix(self) -> Mat4 {
        match self {
            Inverse::Exact(m) | Inverse::Regularized(m) => m,
            Inverse::Identity => Mat4::IDENTITY,
        }
    }

    /// True when the input was singular
    pub fn is_degenerate(&self) -> bool {
        !matches!(self, Inverse::Exact(_))
    }
}

fn try_invert(m: &Mat4) -> Option<Mat4> {
    let det = m.determinant();
    if !det.is_finite() || det.abs() <= SINGULAR_EPSILON {
        return None;
    }
    let inv = m.inverse();
    inv.is_finite().then_some(inv)
}

/// Invert a matrix without ever failing.
///
/// A singular matrix (zero scale on an axis, collapsed bone) gets a tiny
/// value added to its 3x3 diagonal and is inverted again; if that still
/// fails the identity is returned. Callers log degenerate results with
/// the bone and frame they belong to.
pub fn safe_inverse(m: &Mat4) -> Inverse {
    if let Some(inv) = try_invert(m) {
        return Inverse::Exact(inv);
    }

    let mut nudged = *m;
    nudged.x_axis.x += REGULARIZE_EPSILON;
    nudged.y_axis.y += REGULARIZE_EPSILON;
    nudged.z_axis.z += REGULARIZE_EPSILON;

    match try_invert(&nudged) {
        Some(inv) => Inverse::Regularized(inv),
        None => Inverse::Identity,
    }
}

/// Flatten a matrix row by row: `m00 m01 m02 m03 m10 ... m33`
pub fn to_row_major(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

/// Inverse of [`to_row_major`]
pub fn from_row_major(values: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(values).transpose()
}

/// Round to [`FLOAT_DECIMALS`] places
pub fn quantize(value: f32) -> f64 {
    let scale = 10f64.powi(FLOAT_DECIMALS as i32);
    (f64::from(value) * scale).round() / scale
}

/// Format a float the way the asset grammar stores it
pub fn format_float(value: f32) -> String {
    let q = quantize(value);
    // -0.0 would otherwise print with a sign
    if q == 0.0 {
        format!("{:.*}", FLOAT_DECIMALS, 0.0)
    } else {
        format!("{:.*}", FLOAT_DECIMALS, q)
    }
}

/// Format a matrix as 16 row-major floats separated by single spaces
pub fn format_matrix(m: &Mat4) -> String {
    to_row_major(m)
        .iter()
        .map(|v| format_float(*v))
        .collect::<Vec<_>>()
        .join(" ")
}
