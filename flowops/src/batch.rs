//! # Mask batches
//!
//! Downstream consumers take masks as one contiguous `(N, H, W)` block rather than a list.

use crate::error::FlowError;
use crate::field::MaskField;
use anyhow::Result;

/// Stack of equally sized masks in `frame, row, column` order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MaskBatch {
    data: Vec<f32>,
    len: usize,
    width: usize,
    height: usize,
}

impl MaskBatch {
    /// Stack a sequence of masks.
    ///
    /// All masks must share dimensions.
    pub fn stack(masks: &[MaskField]) -> Result<Self> {
        let (width, height) = masks.first().map(MaskField::dim).unwrap_or_default();

        let mut data = Vec::with_capacity(masks.len() * width * height);

        for (i, mask) in masks.iter().enumerate() {
            if mask.dim() != (width, height) {
                return Err(FlowError::shape("mask", i, (width, height), mask.dim()).into());
            }
            data.extend_from_slice(mask.as_slice());
        }

        Ok(Self {
            data,
            len: masks.len(),
            width,
            height,
        })
    }

    /// Get the `(N, H, W)` shape of the batch.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.len, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get a single mask back out of the batch.
    pub fn get(&self, idx: usize) -> Option<MaskField> {
        if idx >= self.len {
            return None;
        }

        let stride = self.width * self.height;
        let values = self.data[idx * stride..(idx + 1) * stride].to_vec();

        MaskField::from_vec(self.width, self.height, values).ok()
    }

    /// Rescale every value by `1 / max`, e.g. to bring 0/255 masks into the unit range.
    pub fn normalized(&self, max: f32) -> Self {
        Self {
            data: self.data.iter().map(|v| v / max).collect(),
            ..*self
        }
    }

    /// Split the batch back into individual masks.
    pub fn into_masks(self) -> Vec<MaskField> {
        (0..self.len).filter_map(|i| self.get(i)).collect()
    }
}
