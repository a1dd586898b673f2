//! Typed node parameters.

use crate::error::FlowError;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Object with bounded, typed parameters.
pub trait Properties {
    /// Get available properties.
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![]
    }

    fn props(&mut self) -> Vec<(&str, Property)> {
        self.props_mut()
            .into_iter()
            .map(|(n, p)| (n, p.into()))
            .collect()
    }

    /// Check every property against its declared domain.
    fn validate(&mut self) -> Result<(), FlowError> {
        self.props().iter().try_for_each(|(n, p)| p.check(n))
    }
}

/// Parameter that picks one of a fixed set of named options.
pub trait Choice {
    /// All option names, in display order.
    fn options(&self) -> Vec<&'static str>;

    /// Name of the selected option.
    fn selected(&self) -> &'static str;

    /// Select an option by name. Returns `false` if there is no such option.
    fn select(&mut self, name: &str) -> bool;
}

/// Property with a lower and upper bound, and a step size.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct BoundedProp<T> {
    pub val: T,
    pub min: T,
    pub max: T,
    pub step: T,
}

impl<T> Deref for BoundedProp<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.val
    }
}

impl<T> DerefMut for BoundedProp<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.val
    }
}

impl<T: PartialOrd + fmt::Display> BoundedProp<T> {
    fn check_bounds(&self, name: &str) -> Result<(), FlowError> {
        if self.val < self.min {
            Err(FlowError::config(name, format!("{} is below {}", self.val, self.min)))
        } else if self.val > self.max {
            Err(FlowError::config(name, format!("{} is above {}", self.val, self.max)))
        } else {
            Ok(())
        }
    }
}

impl<'a, T: Copy> From<BoundedPropMut<'a, T>> for BoundedProp<T> {
    fn from(BoundedPropMut { val, min, max, step }: BoundedPropMut<'a, T>) -> Self {
        Self {
            val: *val,
            min,
            max,
            step,
        }
    }
}

/// Snapshot of a property's value and domain.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Property {
    Float(BoundedProp<f32>),
    Usize(BoundedProp<usize>),
    Choice { val: String, options: Vec<String> },
}

impl Property {
    /// Check the value against the property's domain.
    ///
    /// Floats must be finite and within bounds. Integers must additionally lie on a step from the
    /// minimum. Choices must name one of the options.
    pub fn check(&self, name: &str) -> Result<(), FlowError> {
        match self {
            Self::Float(p) if !p.val.is_finite() => {
                Err(FlowError::config(name, format!("{} is not finite", p.val)))
            }
            Self::Float(p) => p.check_bounds(name),
            Self::Usize(p) => {
                p.check_bounds(name)?;
                if p.step > 1 && (p.val - p.min) % p.step != 0 {
                    Err(FlowError::config(
                        name,
                        format!("{} is not {} plus a multiple of {}", p.val, p.min, p.step),
                    ))
                } else {
                    Ok(())
                }
            }
            Self::Choice { val, options } if !options.contains(val) => Err(FlowError::config(
                name,
                format!("`{val}` is not one of {}", options.join(", ")),
            )),
            Self::Choice { .. } => Ok(()),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(p) => {
                write!(f, "{} (min {}, step {}", p.val, p.min, p.step)?;
                if p.max < f32::MAX {
                    write!(f, ", max {}", p.max)?;
                }
                write!(f, ")")
            }
            Self::Usize(p) => {
                write!(f, "{} (min {}, step {}", p.val, p.min, p.step)?;
                if p.max < usize::MAX {
                    write!(f, ", max {}", p.max)?;
                }
                write!(f, ")")
            }
            Self::Choice { val, options } => write!(f, "{} (one of {})", val, options.join(", ")),
        }
    }
}

impl<'a> From<PropertyMut<'a>> for Property {
    fn from(prop: PropertyMut<'a>) -> Self {
        match prop {
            PropertyMut::Float(p) => Self::Float(p.into()),
            PropertyMut::Usize(p) => Self::Usize(p.into()),
            PropertyMut::Choice(c) => Self::Choice {
                val: c.selected().into(),
                options: c.options().into_iter().map(Into::into).collect(),
            },
        }
    }
}

/// Mutable view of a bounded property.
pub struct BoundedPropMut<'a, T> {
    pub val: &'a mut T,
    pub min: T,
    pub max: T,
    pub step: T,
}

impl<'a, T> Deref for BoundedPropMut<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.val
    }
}

impl<'a, T> DerefMut for BoundedPropMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.val
    }
}

/// Mutable view of a property.
pub enum PropertyMut<'a> {
    Float(BoundedPropMut<'a, f32>),
    Usize(BoundedPropMut<'a, usize>),
    Choice(&'a mut dyn Choice),
}

impl<'a> PropertyMut<'a> {
    /// Create a floating point property with no upper bound.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying float to be mutated.
    /// * `min` - lowest value for the property.
    /// * `step` - granularity hint for editors.
    pub fn float(val: &'a mut f32, min: f32, step: f32) -> Self {
        Self::Float(BoundedPropMut {
            val,
            min,
            max: f32::MAX,
            step,
        })
    }

    /// Create an integer property with no upper bound.
    ///
    /// # Arguments
    ///
    /// * `val` - reference to the underlying usize to be mutated.
    /// * `min` - lowest value for the property.
    /// * `step` - valid values are `min + k * step`.
    pub fn usize(val: &'a mut usize, min: usize, step: usize) -> Self {
        Self::Usize(BoundedPropMut {
            val,
            min,
            max: usize::MAX,
            step,
        })
    }

    /// Create a choice property.
    pub fn choice(choice: &'a mut dyn Choice) -> Self {
        Self::Choice(choice)
    }

    /// Overwrite the underlying value from a property snapshot.
    ///
    /// Mismatching property types are ignored.
    pub fn set(&mut self, other: &Property) {
        match (self, other) {
            (Self::Float(val), Property::Float(oval)) => *val.val = oval.val,
            (Self::Usize(val), Property::Usize(oval)) => *val.val = oval.val,
            (Self::Choice(c), Property::Choice { val, .. }) => {
                c.select(val);
            }
            _ => {}
        }
    }
}
