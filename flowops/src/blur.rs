//! # Gaussian smoothing
//!
//! Separable Gaussian blur applied independently to both channels of a flow field. Borders are
//! handled by reflect-101 extension (`gfedcb|abcdefgh|gfedcba`).

use crate::error::FlowError;
use crate::field::{ScalarField, VectorField};
use anyhow::Result;

/// Binomial kernels used for the smallest sizes when sigma is derived from the size.
const SMALL_KERNELS: [&[f32]; 3] = [
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// Largest accepted kernel size.
pub const MAX_KERNEL_SIZE: usize = 4096;

/// Check that `kernel_size` is an even number between 2 and [`MAX_KERNEL_SIZE`].
pub fn check_kernel_size(kernel_size: usize) -> Result<(), FlowError> {
    if kernel_size < 2 {
        Err(FlowError::config("kernel_size", format!("{kernel_size} is below 2")))
    } else if kernel_size > MAX_KERNEL_SIZE {
        Err(FlowError::config(
            "kernel_size",
            format!("{kernel_size} is above {MAX_KERNEL_SIZE}"),
        ))
    } else if kernel_size % 2 != 0 {
        Err(FlowError::config("kernel_size", format!("{kernel_size} is not even")))
    } else {
        Ok(())
    }
}

/// Build a normalised 1D Gaussian kernel with `len` taps.
///
/// `len` must be odd. Sigma is derived from the length as `0.3 * ((len - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(len: usize) -> Vec<f32> {
    if len % 2 == 1 && (3..=7).contains(&len) {
        return SMALL_KERNELS[len / 2 - 1].to_vec();
    }

    let sigma = 0.3 * ((len as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let scale = -0.5 / (sigma * sigma);
    let center = (len as f64 - 1.0) * 0.5;

    let weights = (0..len)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect::<Vec<_>>();

    let sum = weights.iter().sum::<f64>();

    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Map an out of range coordinate back into `0..len` by reflect-101 extension.
fn reflect_101(i: isize, len: usize) -> usize {
    let len = len as isize;

    if len == 1 {
        return 0;
    }

    // Reflection repeats with this period, kernels wider than the field wrap several times.
    let period = 2 * (len - 1);
    let i = i.rem_euclid(period);

    (if i >= len { period - i } else { i }) as usize
}

/// Convolve a single plane with a separable kernel, horizontally then vertically.
fn convolve_separable(field: &ScalarField, kernel: &[f32]) -> ScalarField {
    let (width, height) = field.dim();
    let radius = (kernel.len() / 2) as isize;

    let horizontal = ScalarField::from_fn(width, height, |x, y| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * field.get(reflect_101(x as isize + k as isize - radius, width), y))
            .sum()
    });

    ScalarField::from_fn(width, height, |x, y| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                w * horizontal.get(x, reflect_101(y as isize + k as isize - radius, height))
            })
            .sum()
    })
}

/// Blur both channels of a flow field with a Gaussian kernel of side `kernel_size + 1`.
///
/// # Arguments
///
/// * `field` - flow field to smooth.
/// * `kernel_size` - even number in `2..=MAX_KERNEL_SIZE`.
pub fn blur(field: &VectorField, kernel_size: usize) -> Result<VectorField> {
    check_kernel_size(kernel_size)?;

    if field.size() == 0 {
        return Ok(field.clone());
    }

    let kernel = gaussian_kernel(kernel_size + 1);

    let x = convolve_separable(&field.channel(0), &kernel);
    let y = convolve_separable(&field.channel(1), &kernel);

    VectorField::from_channels(&x, &y)
}
