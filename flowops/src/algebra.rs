//! # Polar vector field algebra
//!
//! Magnitude/angle decomposition of flow fields and the magnitude operations built on it. Angles
//! are in radians, in the `[0, 2π)` range.

use crate::error::{check_non_negative, FlowError};
use crate::field::{ScalarField, VectorField};
use anyhow::Result;
use nalgebra as na;
use std::f32::consts::TAU;

/// Convert a single vector to `(magnitude, angle)`.
pub fn vector_to_polar(v: na::Vector2<f32>) -> (f32, f32) {
    let angle = v.y.atan2(v.x);
    let angle = if angle < 0.0 { angle + TAU } else { angle };
    (v.x.hypot(v.y), angle)
}

/// Convert `(magnitude, angle)` back to a vector.
pub fn vector_from_polar(magnitude: f32, angle: f32) -> na::Vector2<f32> {
    let (sin, cos) = angle.sin_cos();
    na::Vector2::new(magnitude * cos, magnitude * sin)
}

/// Decompose a field to its magnitude and angle planes.
pub fn to_polar(field: &VectorField) -> (ScalarField, ScalarField) {
    let (width, height) = field.dim();
    let (mag, ang): (Vec<f32>, Vec<f32>) = field.motions().map(vector_to_polar).unzip();

    // Both vectors are exactly width * height long.
    (
        ScalarField::from_fn(width, height, |x, y| mag[y * width + x]),
        ScalarField::from_fn(width, height, |x, y| ang[y * width + x]),
    )
}

/// Rebuild a field from magnitude and angle planes.
pub fn to_cartesian(magnitude: &ScalarField, angle: &ScalarField) -> Result<VectorField> {
    if magnitude.dim() != angle.dim() {
        return Err(FlowError::shape("angle plane", 0, magnitude.dim(), angle.dim()).into());
    }

    let (width, height) = magnitude.dim();
    let vf = na::Matrix2xX::from_fn(width * height, |r, c| {
        let (sin, cos) = angle.values()[c].sin_cos();
        magnitude.values()[c] * if r == 0 { cos } else { sin }
    });

    Ok(VectorField::from_matrix(vf, width, height))
}

/// Limit every vector's magnitude to `max_magnitude`, keeping its direction.
///
/// # Examples
///
/// ```
/// # use assert_approx_eq::assert_approx_eq;
/// use flowops::prelude::v1::*;
/// use nalgebra as na;
///
/// let field = VectorField::repeat(4, 4, na::Vector2::new(3.0, 4.0));
/// let clamped = clamp_magnitude(&field, 2.0)?;
///
/// let motion = clamped.get_motion(2, 3);
/// assert_approx_eq!(motion.x, 1.2, 1e-5);
/// assert_approx_eq!(motion.y, 1.6, 1e-5);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn clamp_magnitude(field: &VectorField, max_magnitude: f32) -> Result<VectorField> {
    check_non_negative("clamp_max_magnitude", max_magnitude)?;

    Ok(field.map_motion(|v| {
        let (mag, ang) = vector_to_polar(v);
        if mag > max_magnitude {
            vector_from_polar(max_magnitude, ang)
        } else {
            v
        }
    }))
}

/// Zero out every vector whose magnitude is at most `threshold`.
pub fn threshold_low_magnitude(field: &VectorField, threshold: f32) -> Result<VectorField> {
    check_non_negative("threshold", threshold)?;

    Ok(field.map_motion(|v| {
        if v.x.hypot(v.y) <= threshold {
            na::Vector2::zeros()
        } else {
            v
        }
    }))
}

/// Multiply every vector by `scale`.
///
/// Negative scales are accepted and flip the direction of motion.
pub fn scale_magnitude(field: &VectorField, scale: f32) -> Result<VectorField> {
    if !scale.is_finite() {
        return Err(FlowError::config("scale", format!("{scale} is not finite")).into());
    }

    let (width, height) = field.dim();
    Ok(VectorField::from_matrix(field.matrix() * scale, width, height))
}

/// Multiply every vector's magnitude by the matching mask value.
pub fn mask_magnitude(field: &VectorField, mask: &ScalarField) -> Result<VectorField> {
    let (mag, ang) = to_polar(field);
    let mag = mag.zip_map(mask, |m, w| m * w)?;
    to_cartesian(&mag, &ang)
}
