//! # Frame sequences

use crate::error::FlowError;
use crate::field::{MaskField, VectorField};
use anyhow::Result;
use log::*;
use rayon::prelude::*;

/// Temporally ordered flow fields, one per source frame pair.
pub type FlowSequence = Vec<VectorField>;
/// Ordered mask fields, independent in length from any flow sequence.
pub type MaskSequence = Vec<MaskField>;

/// Single-frame flow transformation.
pub trait FrameTransform: Sync {
    /// Transform a single flow frame.
    ///
    /// The output must have the same dimensions as `frame`.
    fn apply(&self, frame: &VectorField) -> Result<VectorField>;
}

impl<F: Fn(&VectorField) -> Result<VectorField> + Sync> FrameTransform for F {
    fn apply(&self, frame: &VectorField) -> Result<VectorField> {
        self(frame)
    }
}

/// Verify that every frame shares the dimensions of the first one.
///
/// Returns the common `(width, height)`, or `None` for an empty sequence.
pub fn check_sequence_shape(frames: &[VectorField]) -> Result<Option<(usize, usize)>> {
    let dim = match frames.first() {
        Some(f) => f.dim(),
        None => return Ok(None),
    };

    match frames.iter().position(|f| f.dim() != dim) {
        Some(i) => Err(FlowError::shape("flow frame", i, dim, frames[i].dim()).into()),
        None => Ok(Some(dim)),
    }
}

/// Apply `transform` to every frame independently.
///
/// Output has the same length and order as the input. Frames are processed in parallel.
///
/// # Examples
///
/// ```
/// use flowops::prelude::v1::*;
/// use nalgebra as na;
///
/// let frames = vec![VectorField::repeat(2, 2, na::Vector2::new(1.0, 0.0)); 3];
/// let doubled = map_sequence(&frames, &|f: &VectorField| scale_magnitude(f, 2.0))?;
///
/// assert_eq!(doubled.len(), 3);
/// assert_eq!(doubled[2].get_motion(1, 1), na::Vector2::new(2.0, 0.0));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn map_sequence(
    frames: &[VectorField],
    transform: &impl FrameTransform,
) -> Result<FlowSequence> {
    check_sequence_shape(frames)?;

    debug!("mapping {} flow frames", frames.len());

    frames
        .par_iter()
        .enumerate()
        .map(|(i, frame)| -> Result<VectorField> {
            let out = transform.apply(frame)?;
            if out.dim() != frame.dim() {
                return Err(
                    FlowError::shape("transformed frame", i, frame.dim(), out.dim()).into(),
                );
            }
            Ok(out)
        })
        .collect()
}
