//! Error Handling.
//!
//! This is a private module. Its public content is being re-exported by the
//! parent module.

use std::{error, fmt};
use std::convert::Infallible;
use crate::error::FormatError;
use super::source::Pos;


//------------ DecodeError ---------------------------------------------------

/// An error happened while decoding data.
///
/// This can either be a source error – which the type is generic over – or
/// a format error signalling that the data did not conform with the
/// schema or the encoding rules. In the latter case, the position in the
/// source where the problem was found is kept for diagnostics.
#[derive(Debug)]
pub struct DecodeError<S> {
    inner: DecodeErrorKind<S>,
}

#[derive(Debug)]
enum DecodeErrorKind<S> {
    Source(S),
    Format {
        error: FormatError,
        pos: Pos,
    }
}

impl<S> DecodeError<S> {
    /// Creates a decode error for malformed data at the given position.
    pub fn format(error: impl Into<FormatError>, pos: Pos) -> Self {
        DecodeError {
            inner: DecodeErrorKind::Format { error: error.into(), pos }
        }
    }

    /// Returns the format error if this is one.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self.inner {
            DecodeErrorKind::Source(_) => None,
            DecodeErrorKind::Format { ref error, .. } => Some(error),
        }
    }

    /// Converts the error into the format error if it is one.
    pub fn into_format(self) -> Option<FormatError> {
        match self.inner {
            DecodeErrorKind::Source(_) => None,
            DecodeErrorKind::Format { error, .. } => Some(error),
        }
    }

    /// Returns the position of a format error.
    pub fn pos(&self) -> Option<Pos> {
        match self.inner {
            DecodeErrorKind::Source(_) => None,
            DecodeErrorKind::Format { pos, .. } => Some(pos),
        }
    }
}

impl DecodeError<Infallible> {
    /// Converts a decode error from an infallible source into another error.
    pub fn convert<S>(self) -> DecodeError<S> {
        match self.inner {
            DecodeErrorKind::Source(never) => match never { },
            DecodeErrorKind::Format { error, pos } => {
                DecodeError::format(error, pos)
            }
        }
    }
}

impl<S> From<S> for DecodeError<S> {
    fn from(err: S) -> Self {
        DecodeError { inner: DecodeErrorKind::Source(err) }
    }
}

impl<S: fmt::Display> fmt::Display for DecodeError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner {
            DecodeErrorKind::Source(ref err) => err.fmt(f),
            DecodeErrorKind::Format { ref error, pos } => {
                write!(f, "{} (at position {})", error, pos)
            }
        }
    }
}

impl<S: error::Error> error::Error for DecodeError<S> { }
