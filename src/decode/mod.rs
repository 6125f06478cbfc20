//! Decoding data.
//!
//! Encoded data is read from a [`Source`]. Sources exist for slices of
//! octets and for anything implementing [`std::io::Read`]. A [`Decoder`]
//! takes the data from the source and turns it into a [`Value`] following
//! a compiled type of a schema. The encoding rules to decode under are
//! picked via the decoder’s mode type parameter.
//!
//! Errors are reported as [`DecodeError`]s. These either wrap an error of
//! the source itself or a format error describing a problem with the
//! data, together with the position where it happened.
//!
//! [`Value`]: crate::value::Value

pub use self::decoder::{Decoder, DEFAULT_MAX_DEPTH};
pub use self::error::DecodeError;
pub use self::header::Header;
pub use self::source::{
    Fragment, IntoSource, Pos, ReaderFragment, ReaderSource, SliceFragment,
    SliceSource, Source,
};

mod decoder;
mod error;
mod header;
mod source;
