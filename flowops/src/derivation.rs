//! # Mask derivation
//!
//! Derives binary motion masks from flow fields. Output masks only ever contain 0 and 255.

use crate::error::{check_non_negative, FlowError};
use crate::field::{MaskField, ScalarField, VectorField};
use crate::sequence::{check_sequence_shape, MaskSequence};
use crate::warp::Warp;
use anyhow::{anyhow, Result};
use log::*;
use rayon::prelude::*;
use std::str::FromStr;

/// Value of a set pixel in a derived mask.
pub const MASK_ON: f32 = 255.0;

/// How a mask is derived from a flow frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MaskMethod {
    /// Pixels whose motion magnitude exceeds the threshold.
    #[default]
    Simple,
    /// The simple mask, displaced along the flow.
    Adjusted,
    /// Union of the simple and adjusted masks.
    Combined,
}

impl MaskMethod {
    pub const ALL: [Self; 3] = [Self::Simple, Self::Adjusted, Self::Combined];

    pub fn name(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Adjusted => "adjusted",
            Self::Combined => "combined",
        }
    }
}

impl FromStr for MaskMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| anyhow!("unknown mask method `{s}`"))
    }
}

/// Set every pixel with motion magnitude above `threshold` to 1, others to 0.
pub fn motion_mask(flow: &VectorField, threshold: f32) -> ScalarField {
    let (width, height) = flow.dim();
    ScalarField::from_fn(width, height, |x, y| {
        let motion = flow.get_motion(x, y);
        if motion.x.hypot(motion.y) > threshold {
            1.0
        } else {
            0.0
        }
    })
}

fn binarize(field: &ScalarField) -> MaskField {
    field.map(|v| if v > 0.0 { MASK_ON } else { 0.0 })
}

/// Derive a binary mask from a single flow frame.
///
/// # Arguments
///
/// * `flow` - flow frame to derive the mask from.
/// * `threshold` - motion magnitudes at or below this are considered static.
/// * `method` - derivation method.
/// * `warp` - warp used by the adjusted and combined methods.
pub fn derive_mask(
    flow: &VectorField,
    threshold: f32,
    method: MaskMethod,
    warp: &dyn Warp,
) -> Result<MaskField> {
    check_non_negative("magnitude_threshold", threshold)?;

    let simple = motion_mask(flow, threshold);

    if method == MaskMethod::Simple {
        return Ok(binarize(&simple));
    }

    let adjusted = warp.warp(&simple, flow)?;

    if adjusted.dim() != flow.dim() {
        return Err(FlowError::shape("warp output", 0, flow.dim(), adjusted.dim()).into());
    }

    match method {
        MaskMethod::Adjusted => Ok(binarize(&adjusted)),
        _ => Ok(binarize(&simple.zip_map(&adjusted, |a, b| a + b)?)),
    }
}

/// Derive binary masks for every frame of a flow sequence.
///
/// Output order matches input order.
pub fn derive_masks(
    flow: &[VectorField],
    threshold: f32,
    method: MaskMethod,
    warp: &dyn Warp,
) -> Result<MaskSequence> {
    check_non_negative("magnitude_threshold", threshold)?;
    check_sequence_shape(flow)?;

    debug!(
        "deriving {} {} masks at threshold {}",
        flow.len(),
        method.name(),
        threshold
    );

    flow.par_iter()
        .enumerate()
        .map(|(i, frame)| {
            // Point shape errors at the offending frame.
            derive_mask(frame, threshold, method, warp).map_err(|e| {
                match e.downcast::<FlowError>() {
                    Ok(FlowError::ShapeMismatch {
                        what,
                        expected,
                        found,
                        ..
                    }) => FlowError::shape(what, i, expected, found).into(),
                    Ok(e) => e.into(),
                    Err(e) => e,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warp::RemapWarp;
    use nalgebra as na;
    use rand::Rng;

    fn random_flow(width: usize, height: usize) -> VectorField {
        let rng = &mut rand::thread_rng();
        VectorField::from_fn(width, height, |_, _| {
            na::Vector2::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0))
        })
    }

    /// Shifts everything one pixel to the right, regardless of flow.
    fn shift_right(field: &ScalarField, _: &VectorField) -> Result<ScalarField> {
        let (width, height) = field.dim();
        Ok(ScalarField::from_fn(width, height, |x, y| {
            if x == 0 {
                0.0
            } else {
                field.get(x - 1, y)
            }
        }))
    }

    fn only_binary(mask: &MaskField) -> bool {
        mask.as_slice().iter().all(|v| *v == 0.0 || *v == MASK_ON)
    }

    #[test]
    fn simple_thresholds_magnitude() {
        let mut flow = VectorField::new(3, 1);
        flow.set_motion(0, 0, na::Vector2::new(0.5, 0.0));
        flow.set_motion(1, 0, na::Vector2::new(0.0, -0.75));

        let mask = derive_mask(&flow, 0.5, MaskMethod::Simple, &RemapWarp).unwrap();
        assert_eq!(mask.as_slice(), &[0.0, MASK_ON, 0.0]);
    }

    #[test]
    fn adjusted_uses_injected_warp() {
        let mut flow = VectorField::new(3, 1);
        flow.set_motion(0, 0, na::Vector2::new(1.0, 0.0));

        let mask = derive_mask(&flow, 0.5, MaskMethod::Adjusted, &shift_right).unwrap();
        assert_eq!(mask.as_slice(), &[0.0, MASK_ON, 0.0]);

        let mask = derive_mask(&flow, 0.5, MaskMethod::Combined, &shift_right).unwrap();
        assert_eq!(mask.as_slice(), &[MASK_ON, MASK_ON, 0.0]);
    }

    #[test]
    fn fractional_warp_output_is_binarized() {
        let flow = VectorField::repeat(2, 2, na::Vector2::new(1.0, 1.0));
        let faint = |f: &ScalarField, _: &VectorField| -> Result<ScalarField> {
            Ok(f.map(|v| v * 0.01))
        };
        let mask = derive_mask(&flow, 0.0, MaskMethod::Adjusted, &faint).unwrap();
        assert_eq!(mask.as_slice(), &[MASK_ON; 4]);
    }

    #[test]
    fn outputs_are_binary_and_combined_is_union() {
        for _ in 0..10 {
            let flow = random_flow(12, 9);
            let masks = MaskMethod::ALL
                .into_iter()
                .map(|m| derive_mask(&flow, 1.0, m, &RemapWarp).unwrap())
                .collect::<Vec<_>>();

            assert!(masks.iter().all(only_binary));

            let combined = masks[2].as_slice();
            for part in &masks[..2] {
                for (p, c) in part.as_slice().iter().zip(combined) {
                    assert!(*p == 0.0 || *c == MASK_ON);
                }
            }
        }
    }

    #[test]
    fn sequence_keeps_order() {
        let flow = (0..5)
            .map(|i| VectorField::repeat(2, 2, na::Vector2::new(i as f32, 0.0)))
            .collect::<Vec<_>>();
        let masks = derive_masks(&flow, 2.5, MaskMethod::Simple, &RemapWarp).unwrap();
        let on = masks.iter().map(|m| m.count_nonzero()).collect::<Vec<_>>();
        assert_eq!(on, vec![0, 0, 0, 4, 4]);
    }

    #[test]
    fn bad_warp_shape_reports_frame() {
        let flow = (0..3)
            .map(|i| VectorField::repeat(2, 2, na::Vector2::new(i as f32, 0.0)))
            .collect::<Vec<_>>();
        // Only the second frame comes back with the wrong shape.
        let shrink = |image: &ScalarField, flow: &VectorField| -> Result<ScalarField> {
            if flow.get_motion(0, 0).x == 1.0 {
                Ok(ScalarField::new(1, 1))
            } else {
                Ok(image.clone())
            }
        };
        let err = derive_masks(&flow, 0.1, MaskMethod::Combined, &shrink).unwrap_err();
        match err.downcast_ref::<FlowError>() {
            Some(FlowError::ShapeMismatch {
                what, index, found, ..
            }) => {
                assert_eq!(*what, "warp output");
                assert_eq!(*index, 1);
                assert_eq!(*found, (1, 1));
            }
            e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let flow = vec![VectorField::new(2, 2)];
        assert!(derive_masks(&flow, -1.0, MaskMethod::Simple, &RemapWarp).is_err());
    }

    #[test]
    fn method_names() {
        for m in MaskMethod::ALL {
            assert_eq!(m.name().parse::<MaskMethod>().unwrap(), m);
        }
        assert!("normal".parse::<MaskMethod>().is_err());
    }
}
