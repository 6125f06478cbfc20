//! Constraints restricting the values of a type.
//!
//! Constraints are checked after a value has been found to be structurally
//! correct for its type. They never influence encoding.

use std::fmt;
use crate::error::ValueError;
use crate::scope::Scope;
use crate::value::Value;


//------------ Constraint ----------------------------------------------------

/// A restriction on the values of a type.
pub trait Constraint: fmt::Debug + Send + Sync {
    /// Checks whether `value` satisfies the constraint.
    ///
    /// The value has already been accepted by the constrained type and any
    /// value reference has been resolved.
    fn check(&self, scope: &Scope, value: &Value) -> Result<(), ValueError>;
}


//------------ Size ----------------------------------------------------------

/// A size constraint.
///
/// Applies to strings (counting characters), octet strings (counting
/// octets), and the values of SEQUENCE OF and SET OF types (counting
/// elements).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Size {
    min: usize,
    max: Option<usize>,
}

impl Size {
    pub fn new(min: usize, max: Option<usize>) -> Self {
        Size { min, max }
    }

    /// Creates a constraint for exactly `size`.
    pub fn fixed(size: usize) -> Self {
        Size::new(size, Some(size))
    }
}

impl Constraint for Size {
    fn check(&self, _: &Scope, value: &Value) -> Result<(), ValueError> {
        let size = match value {
            Value::String(value) => value.chars().count(),
            Value::OctetString(value) => value.len(),
            Value::List(value) => value.len(),
            _ => {
                return Err(ValueError::IllegalValue(format!(
                    "size constraint not applicable to {}", value.kind()
                )))
            }
        };
        if size < self.min || self.max.is_some_and(|max| size > max) {
            return Err(ValueError::IllegalValue(format!(
                "size {} outside of {}", size, self
            )))
        }
        Ok(())
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "SIZE({})", max),
            Some(max) => write!(f, "SIZE({}..{})", self.min, max),
            None => write!(f, "SIZE({}..MAX)", self.min),
        }
    }
}


//------------ ValueRange ----------------------------------------------------

/// A range constraint for INTEGER values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValueRange {
    min: Option<i128>,
    max: Option<i128>,
}

impl ValueRange {
    pub fn new(min: Option<i128>, max: Option<i128>) -> Self {
        ValueRange { min, max }
    }
}

impl Constraint for ValueRange {
    fn check(&self, _: &Scope, value: &Value) -> Result<(), ValueError> {
        let Value::Integer(value) = *value else {
            return Err(ValueError::IllegalValue(format!(
                "value range not applicable to {}", value.kind()
            )))
        };
        if self.min.is_some_and(|min| value < min)
            || self.max.is_some_and(|max| value > max)
        {
            return Err(ValueError::IllegalValue(format!(
                "{} outside of {}", value, self
            )))
        }
        Ok(())
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.min {
            Some(min) => write!(f, "({}..", min)?,
            None => f.write_str("(MIN..")?,
        }
        match self.max {
            Some(max) => write!(f, "{})", max),
            None => f.write_str("MAX)"),
        }
    }
}


//============ Tests =========================================================
