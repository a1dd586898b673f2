//! # Dense vector and scalar fields

use crate::error::FlowError;
use anyhow::{anyhow, Result};
use nalgebra::*;

/// Dense 2D optical flow field.
///
/// Each pixel holds a horizontal and vertical displacement. Pixels are stored in row-major order,
/// one matrix column per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorField {
    vf: Matrix2xX<f32>,
    width: usize,
    height: usize,
}

impl VectorField {
    /// Create a new zeroed vector field.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the field.
    /// * `height` - height of the field.
    pub fn new(width: usize, height: usize) -> Self {
        Self::repeat(width, height, Vector2::zeros())
    }

    /// Create a field with the same motion at every pixel.
    pub fn repeat(width: usize, height: usize, motion: Vector2<f32>) -> Self {
        Self {
            vf: Matrix2xX::from_fn(width * height, |r, _| motion[r]),
            width,
            height,
        }
    }

    /// Create a field by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> Vector2<f32>,
    ) -> Self {
        let mut vf = Matrix2xX::zeros(width * height);

        for y in 0..height {
            for x in 0..width {
                vf.set_column(y * width + x, &f(x, y));
            }
        }

        Self { vf, width, height }
    }

    /// Create a field from interleaved `x, y` values in row-major order.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the field.
    /// * `height` - height of the field.
    /// * `data` - `width * height * 2` interleaved values.
    pub fn from_interleaved(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if width.checked_mul(height).and_then(|n| n.checked_mul(2)) != Some(data.len()) {
            return Err(anyhow!(
                "{} values do not make up a {}x{} vector field",
                data.len(),
                width,
                height
            ));
        }

        Ok(Self {
            vf: Matrix2xX::from_vec(data),
            width,
            height,
        })
    }

    /// Assemble a field from separate horizontal and vertical planes.
    pub fn from_channels(x: &ScalarField, y: &ScalarField) -> Result<Self> {
        if x.dim() != y.dim() {
            return Err(FlowError::shape("vertical channel", 0, x.dim(), y.dim()).into());
        }

        let (width, height) = x.dim();

        Ok(Self {
            vf: Matrix2xX::from_fn(width * height, |r, c| {
                if r == 0 {
                    x.values()[c]
                } else {
                    y.values()[c]
                }
            }),
            width,
            height,
        })
    }

    /// Get width and height of the field.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get number of pixels in the field.
    ///
    /// This is the same as `width * height`
    pub fn size(&self) -> usize {
        self.vf.ncols()
    }

    /// Get the raw interleaved values.
    ///
    /// Pixel `(x, y)` occupies indices `2 * (y * width + x)` (horizontal) and the one after it
    /// (vertical), so a row of `width` pixels spans `2 * width` values.
    pub fn as_slice(&self) -> &[f32] {
        self.vf.as_slice()
    }

    /// Get motion at coordinates.
    pub fn get_motion(&self, x: usize, y: usize) -> Vector2<f32> {
        self.vf.column(self.width * y + x).into()
    }

    /// Set motion at given position.
    pub fn set_motion(&mut self, x: usize, y: usize, motion: Vector2<f32>) {
        self.vf.set_column(self.width * y + x, &motion);
    }

    /// Iterate every element of the field.
    ///
    /// The resulting iterator yields `(x, y, motion)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Vector2<f32>)> + '_ {
        let (width, height) = self.dim();
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y, self.get_motion(x, y))))
    }

    /// Iterate the motion of every pixel in storage order.
    pub fn motions(&self) -> impl Iterator<Item = Vector2<f32>> + '_ {
        self.vf.column_iter().map(|c| c.into())
    }

    /// Build a new field of the same shape by transforming every motion vector.
    pub fn map_motion(&self, mut f: impl FnMut(Vector2<f32>) -> Vector2<f32>) -> Self {
        let mut vf = self.vf.clone();

        for mut col in vf.column_iter_mut() {
            let motion = f(Vector2::new(col[0], col[1]));
            col.copy_from(&motion);
        }

        Self {
            vf,
            width: self.width,
            height: self.height,
        }
    }

    /// Extract a single channel as a scalar field.
    ///
    /// # Arguments
    ///
    /// * `channel` - 0 for horizontal, 1 for vertical displacement.
    pub fn channel(&self, channel: usize) -> ScalarField {
        ScalarField {
            values: self.vf.row(channel).transpose(),
            width: self.width,
            height: self.height,
        }
    }

    pub(crate) fn matrix(&self) -> &Matrix2xX<f32> {
        &self.vf
    }

    pub(crate) fn from_matrix(vf: Matrix2xX<f32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(vf.ncols(), width * height);
        Self { vf, width, height }
    }
}

/// Dense 2D field of scalars.
///
/// Used for magnitude and angle planes as well as masks.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    values: DVector<f32>,
    width: usize,
    height: usize,
}

/// Per-pixel weight or validity field.
pub type MaskField = ScalarField;

impl ScalarField {
    /// Create a new zeroed scalar field.
    pub fn new(width: usize, height: usize) -> Self {
        Self::repeat(width, height, 0.0)
    }

    /// Create a field with the same value at every pixel.
    pub fn repeat(width: usize, height: usize, value: f32) -> Self {
        Self {
            values: DVector::repeat(width * height, value),
            width,
            height,
        }
    }

    /// Create a field by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        Self {
            values: DVector::from_fn(width * height, |i, _| f(i % width, i / width)),
            width,
            height,
        }
    }

    /// Create a field from row-major values.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if width.checked_mul(height) != Some(data.len()) {
            return Err(anyhow!(
                "{} values do not make up a {}x{} scalar field",
                data.len(),
                width,
                height
            ));
        }

        Ok(Self {
            values: DVector::from_vec(data),
            width,
            height,
        })
    }

    /// Get width and height of the field.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        self.values.as_slice()
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[self.width * y + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.values[self.width * y + x] = value;
    }

    /// Build a new field of the same shape by transforming every value.
    pub fn map(&self, f: impl FnMut(f32) -> f32) -> Self {
        Self {
            values: self.values.map(f),
            width: self.width,
            height: self.height,
        }
    }

    /// Combine two equally shaped fields value by value.
    pub fn zip_map(&self, other: &Self, f: impl FnMut(f32, f32) -> f32) -> Result<Self> {
        if self.dim() != other.dim() {
            return Err(FlowError::shape("field", 0, self.dim(), other.dim()).into());
        }

        Ok(Self {
            values: self.values.zip_map(&other.values, f),
            width: self.width,
            height: self.height,
        })
    }

    /// Number of values that are not zero.
    pub fn count_nonzero(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }

    pub(crate) fn values(&self) -> &DVector<f32> {
        &self.values
    }
}
