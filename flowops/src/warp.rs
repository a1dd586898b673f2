//! # Field warping
//!
//! Displacing a scalar field along a flow field is an external capability. It is injected through
//! the [`Warp`] trait, with [`RemapWarp`] as the stock implementation.

use crate::error::FlowError;
use crate::field::{ScalarField, VectorField};
use anyhow::Result;

/// Displace a 2D field according to a flow field.
pub trait Warp: Sync {
    /// Warp `field` by `flow`.
    ///
    /// Implementations should return a field of the same dimensions as `flow`.
    fn warp(&self, field: &ScalarField, flow: &VectorField) -> Result<ScalarField>;
}

impl<F: Fn(&ScalarField, &VectorField) -> Result<ScalarField> + Sync> Warp for F {
    fn warp(&self, field: &ScalarField, flow: &VectorField) -> Result<ScalarField> {
        self(field, flow)
    }
}

/// Backward remapping warp.
///
/// Every output pixel `p` bilinearly samples the input at `p - flow(p)`. Samples that fall
/// outside of the input read as 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemapWarp;

impl RemapWarp {
    fn sample(field: &ScalarField, x: f32, y: f32) -> f32 {
        let (width, height) = field.dim();

        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);

        let at = |xi: f32, yi: f32| {
            if xi < 0.0 || yi < 0.0 || xi >= width as f32 || yi >= height as f32 {
                0.0
            } else {
                field.get(xi as usize, yi as usize)
            }
        };

        let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1.0, y0) * fx;
        let bottom = at(x0, y0 + 1.0) * (1.0 - fx) + at(x0 + 1.0, y0 + 1.0) * fx;

        top * (1.0 - fy) + bottom * fy
    }
}

impl Warp for RemapWarp {
    fn warp(&self, field: &ScalarField, flow: &VectorField) -> Result<ScalarField> {
        if field.dim() != flow.dim() {
            return Err(FlowError::shape("warped field", 0, flow.dim(), field.dim()).into());
        }

        let (width, height) = flow.dim();

        Ok(ScalarField::from_fn(width, height, |x, y| {
            let motion = flow.get_motion(x, y);
            Self::sample(field, x as f32 - motion.x, y as f32 - motion.y)
        }))
    }
}
