//! Encoding values.
//!
//! Values are encoded by an [`Encoder`] which walks the compiled type of the
//! value and writes the identifier, length, and content octets of the value
//! and all its components to a [`Target`]. The encoding rules are picked
//! via the encoder’s mode type parameter.
//!
//! Encoding into a `Vec<u8>` can’t fail on the target side. The helper
//! function [`infallible`] removes the error case from results of such
//! operations.

pub use self::encoder::Encoder;
pub use self::error::EncodeError;
pub use self::header::{write_end_of_contents, write_header};
pub use self::target::{IoTarget, Target, infallible};

mod encoder;
mod error;
mod header;
mod target;
