//! # Error taxonomy
//!
//! All fallible operations return `anyhow::Result`. Failures that originate in this crate carry a
//! [`FlowError`] which can be recovered with `err.downcast_ref::<FlowError>()`.

use std::fmt;

/// Errors raised by flow field operations.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowError {
    /// A parameter is outside of its declared domain.
    Configuration { param: String, reason: String },
    /// Mask sequencing was requested with no masks supplied.
    EmptyMaskSequence,
    /// Two fields that must share dimensions do not.
    ShapeMismatch {
        /// What was being checked (`"flow frame"`, `"mask"`, `"warp output"`...).
        what: &'static str,
        /// Index of the offending frame within its sequence.
        index: usize,
        /// Expected `(width, height)`.
        expected: (usize, usize),
        /// Actual `(width, height)`.
        found: (usize, usize),
    },
}

impl FlowError {
    pub fn config(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn shape(
        what: &'static str,
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Self {
        Self::ShapeMismatch {
            what,
            index,
            expected,
            found,
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { param, reason } => {
                write!(f, "invalid configuration for `{param}`: {reason}")
            }
            Self::EmptyMaskSequence => write!(f, "mask sequence is empty"),
            Self::ShapeMismatch {
                what,
                index,
                expected,
                found,
            } => write!(
                f,
                "{what} {index} is {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for FlowError {}

/// Reject a float parameter that is negative or not finite.
pub(crate) fn check_non_negative(param: &str, val: f32) -> Result<(), FlowError> {
    if !val.is_finite() {
        Err(FlowError::config(param, format!("{val} is not finite")))
    } else if val < 0.0 {
        Err(FlowError::config(param, format!("{val} is below 0")))
    } else {
        Ok(())
    }
}
