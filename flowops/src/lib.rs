//! # Optical Flow Field Operations
//!
//! This library provides per-frame transformations over dense optical flow fields: polar
//! clamping, thresholding and scaling of motion magnitudes, Gaussian smoothing, sequenced masking
//! and binary mask derivation. Operations are exposed both as plain functions and as pipeline
//! [`nodes`].
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use flowops::prelude::v1::*;
//! ```
//!
//! You may need [`nalgebra`](https://crates.io/crates/nalgebra) to make use of the functionality.

pub mod algebra;
pub mod batch;
pub mod blur;
pub mod derivation;
pub mod error;
pub mod field;
pub mod flo;
pub mod masking;
pub mod nodes;
pub mod properties;
pub mod sequence;
pub mod warp;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            algebra::{
                clamp_magnitude, mask_magnitude, scale_magnitude, threshold_low_magnitude,
                to_cartesian, to_polar,
            },
            batch::MaskBatch,
            blur::blur,
            derivation::{derive_mask, derive_masks, MaskMethod, MASK_ON},
            error::FlowError,
            field::{MaskField, ScalarField, VectorField},
            masking::MaskSequencer,
            nodes::*,
            properties::{Properties, Property, PropertyMut},
            sequence::{map_sequence, FlowSequence, FrameTransform, MaskSequence},
            warp::{RemapWarp, Warp},
        };
        pub use anyhow::{anyhow, Error, Result};
    }
}
