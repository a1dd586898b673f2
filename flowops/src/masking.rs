//! # Mask sequencing
//!
//! Pairs a flow sequence with a mask sequence of independent length. Each flow frame takes the
//! mask at a cursor that advances once per frame, before the frame is processed, and saturates at
//! the last mask. The cursor lives as long as the sequencer, so consecutive calls continue where
//! the previous one stopped.

use crate::algebra::mask_magnitude;
use crate::error::FlowError;
use crate::field::{MaskField, VectorField};
use crate::sequence::{check_sequence_shape, FlowSequence};
use anyhow::{Context, Result};
use log::*;
use rayon::prelude::*;

/// Stateful mask cursor.
///
/// Note that the first frame processed by a fresh sequencer uses mask 1 (or mask 0 if only one
/// mask exists), never mask 0.
#[derive(Clone, Debug, Default)]
pub struct MaskSequencer {
    cursor: usize,
}

fn next_cursor(cursor: usize, mask_count: usize) -> usize {
    std::cmp::min(cursor + 1, mask_count - 1)
}

impl MaskSequencer {
    /// Create a sequencer with the cursor at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor value.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Advance the cursor by one frame and return the mask index to use.
    ///
    /// # Arguments
    ///
    /// * `mask_count` - number of masks currently available.
    pub fn advance(&mut self, mask_count: usize) -> Result<usize> {
        if mask_count == 0 {
            return Err(FlowError::EmptyMaskSequence.into());
        }

        self.cursor = next_cursor(self.cursor, mask_count);

        Ok(self.cursor)
    }

    /// Compute the mask indices the next `frames` frames would use, without advancing.
    ///
    /// # Examples
    ///
    /// ```
    /// use flowops::masking::MaskSequencer;
    ///
    /// let sequencer = MaskSequencer::new();
    /// assert_eq!(sequencer.schedule(3, 3)?, vec![1, 2, 2]);
    /// assert_eq!(sequencer.schedule(2, 1)?, vec![0, 0]);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn schedule(&self, frames: usize, mask_count: usize) -> Result<Vec<usize>> {
        if mask_count == 0 {
            return Err(FlowError::EmptyMaskSequence.into());
        }

        Ok((0..frames)
            .scan(self.cursor, |cursor, _| {
                *cursor = next_cursor(*cursor, mask_count);
                Some(*cursor)
            })
            .collect())
    }

    /// Multiply the magnitude of every flow frame by its sequenced mask.
    ///
    /// All shapes are validated before the cursor moves, so a failed call leaves the sequencer
    /// untouched and produces no output.
    ///
    /// A mask whose shape differs from the flow is reported as [`FlowError::ShapeMismatch`]
    /// indexed by the mask. The first flow frame scheduled onto it is attached as context.
    pub fn apply(&mut self, flow: &[VectorField], masks: &[MaskField]) -> Result<FlowSequence> {
        let schedule = self.schedule(flow.len(), masks.len())?;

        check_sequence_shape(flow)?;

        for (i, (frame, &idx)) in flow.iter().zip(&schedule).enumerate() {
            if masks[idx].dim() != frame.dim() {
                return Err(FlowError::shape("mask", idx, frame.dim(), masks[idx].dim()))
                    .with_context(|| format!("masking flow frame {i}"));
            }
        }

        if let Some(&last) = schedule.last() {
            trace!("mask cursor {} -> {}", self.cursor, last);
            self.cursor = last;
        }

        debug!(
            "masking {} flow frames with {} masks",
            flow.len(),
            masks.len()
        );

        flow.par_iter()
            .zip(schedule.par_iter())
            .map(|(frame, &idx)| mask_magnitude(frame, &masks[idx]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra as na;

    fn flows(len: usize) -> Vec<VectorField> {
        vec![VectorField::repeat(2, 2, na::Vector2::new(3.0, 4.0)); len]
    }

    /// Mask `i` scales magnitudes by `i + 1`, so the output reveals which mask was used.
    fn masks(len: usize) -> Vec<MaskField> {
        (0..len)
            .map(|i| MaskField::repeat(2, 2, (i + 1) as f32))
            .collect()
    }

    fn used_masks(out: &[VectorField]) -> Vec<usize> {
        out.iter()
            .map(|f| (f.get_motion(0, 0).magnitude() / 5.0).round() as usize - 1)
            .collect()
    }

    #[test]
    fn first_frame_skips_mask_zero() {
        let mut seq = MaskSequencer::new();
        let out = seq.apply(&flows(3), &masks(3)).unwrap();
        assert_eq!(used_masks(&out), vec![1, 2, 2]);
        assert_eq!(seq.cursor(), 2);
    }

    #[test]
    fn single_mask_is_used_forever() {
        let mut seq = MaskSequencer::new();
        for _ in 0..3 {
            let out = seq.apply(&flows(4), &masks(1)).unwrap();
            assert_eq!(used_masks(&out), vec![0; 4]);
        }
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn cursor_persists_across_calls() {
        let mut seq = MaskSequencer::new();
        assert_eq!(used_masks(&seq.apply(&flows(2), &masks(5)).unwrap()), vec![1, 2]);
        assert_eq!(used_masks(&seq.apply(&flows(3), &masks(5)).unwrap()), vec![3, 4, 4]);
    }

    #[test]
    fn shrinking_mask_count_clamps_to_new_length() {
        let mut seq = MaskSequencer::new();
        seq.apply(&flows(4), &masks(6)).unwrap();
        assert_eq!(seq.cursor(), 4);
        assert_eq!(used_masks(&seq.apply(&flows(2), &masks(2)).unwrap()), vec![1, 1]);
    }

    #[test]
    fn separate_instances_do_not_share_cursor() {
        let mut a = MaskSequencer::new();
        let mut b = MaskSequencer::new();
        a.apply(&flows(3), &masks(4)).unwrap();
        assert_eq!(used_masks(&b.apply(&flows(1), &masks(4)).unwrap()), vec![1]);
        assert_eq!(a.cursor(), 3);
    }

    #[test]
    fn advance_matches_schedule() {
        let mut seq = MaskSequencer::new();
        let planned = seq.schedule(6, 4).unwrap();
        let walked = (0..6).map(|_| seq.advance(4).unwrap()).collect::<Vec<_>>();
        assert_eq!(planned, walked);
        assert_eq!(walked, vec![1, 2, 3, 3, 3, 3]);
    }

    #[test]
    fn empty_masks_are_fatal() {
        let mut seq = MaskSequencer::new();
        let err = seq.apply(&flows(2), &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlowError>(),
            Some(&FlowError::EmptyMaskSequence)
        );
        assert!(seq.advance(0).is_err());
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn shape_mismatch_leaves_cursor() {
        let mut seq = MaskSequencer::new();
        let mut m = masks(3);
        m[2] = MaskField::new(3, 3);

        let err = seq.apply(&flows(3), &m).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlowError>(),
            Some(&FlowError::shape("mask", 2, (2, 2), (3, 3)))
        );
        assert!(format!("{err:#}").starts_with("masking flow frame 1: "));
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn mask_keeps_direction() {
        let mut seq = MaskSequencer::new();
        let m = vec![MaskField::repeat(2, 2, 0.5); 2];
        let out = seq.apply(&flows(1), &m).unwrap();
        assert_approx_eq!(out[0].get_motion(1, 1).x, 1.5, 1e-5);
        assert_approx_eq!(out[0].get_motion(1, 1).y, 2.0, 1e-5);
    }

    #[test]
    fn empty_flow_does_not_advance() {
        let mut seq = MaskSequencer::new();
        assert!(seq.apply(&[], &masks(3)).unwrap().is_empty());
        assert_eq!(seq.cursor(), 0);
    }
}
