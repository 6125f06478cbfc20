//! Error Handling.
//!
//! This is a private module. Its public content is being re-exported by the
//! parent module.

use std::{error, fmt};
use std::convert::Infallible;
use crate::error::{FormatError, SchemaError, ValueError};


//------------ EncodeError ---------------------------------------------------

/// An error happened while encoding a value.
///
/// Either the value wasn’t valid for its type, it couldn’t be encoded under
/// the chosen rules, or the target failed.
#[derive(Debug)]
pub enum EncodeError<E> {
    Value(ValueError),
    Format(FormatError),
    Target(E),
}

impl<E> EncodeError<E> {
    /// Returns the format error if this is one.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            EncodeError::Format(err) => Some(err),
            _ => None
        }
    }

    /// Returns the value error if this is one.
    pub fn value_error(&self) -> Option<&ValueError> {
        match self {
            EncodeError::Value(err) => Some(err),
            _ => None
        }
    }
}

impl EncodeError<Infallible> {
    /// Converts an error of an infallible target into another error.
    pub fn convert<E>(self) -> EncodeError<E> {
        match self {
            EncodeError::Value(err) => EncodeError::Value(err),
            EncodeError::Format(err) => EncodeError::Format(err),
            EncodeError::Target(never) => match never { },
        }
    }
}

impl<E> From<ValueError> for EncodeError<E> {
    fn from(err: ValueError) -> Self {
        EncodeError::Value(err)
    }
}

impl<E> From<SchemaError> for EncodeError<E> {
    fn from(err: SchemaError) -> Self {
        EncodeError::Value(err.into())
    }
}

impl<E> From<FormatError> for EncodeError<E> {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Value(err) => EncodeError::Value(err),
            err => EncodeError::Format(err),
        }
    }
}

impl<E: fmt::Display> fmt::Display for EncodeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::Value(err) => err.fmt(f),
            EncodeError::Format(err) => err.fmt(f),
            EncodeError::Target(err) => err.fmt(f),
        }
    }
}

impl<E: error::Error> error::Error for EncodeError<E> { }
