//! The header of an encoded value.
//!
//! This is a private module. Its public items are re-exported by the parent.

use crate::encode::Target;
use crate::error::FormatError;
use crate::length::Length;
use crate::mode::Mode;
use crate::tag::{Ident, Tag};
use super::error::DecodeError;
use super::source::{Pos, Source};


//------------ Header --------------------------------------------------------

/// The identifier and length octets of an encoded value.
///
/// When taken from a source, the header has already been checked against
/// the rules of mode `M` as far as this is possible without looking at the
/// content.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header<M> {
    ident: Ident,
    length: Length<M>,
    pos: Pos,
}

impl<M: Mode> Header<M> {
    /// Takes a header from the beginning of a source.
    ///
    /// Returns `Ok(None)` if the source is already exhausted.
    pub fn take_opt_from<S: Source>(
        source: &mut S
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let pos = source.pos();
        let Some(ident) = Ident::take_opt_from(source)? else {
            return Ok(None)
        };
        let length = Length::take_from(source)?;
        let res = Header { ident, length, pos };
        res.check().map_err(|err| DecodeError::format(err, pos))?;
        Ok(Some(res))
    }

    /// Takes a header from the beginning of a source.
    ///
    /// Returns an error if the source is already exhausted.
    pub fn take_from<S: Source>(
        source: &mut S
    ) -> Result<Self, DecodeError<S::Error>> {
        let pos = source.pos();
        Self::take_opt_from(source)?.ok_or_else(|| {
            DecodeError::format(FormatError::Truncated, pos)
        })
    }

    fn check(&self) -> Result<(), FormatError> {
        if self.ident.is_end_of_contents() {
            if !self.length.is_zero() {
                return Err(FormatError::IllegalLength(
                    "end-of-contents with content"
                ))
            }
            return Ok(())
        }
        match (self.ident.is_constructed(), self.length.is_indefinite()) {
            (false, true) => Err(FormatError::IndefinitePrimitive),
            (true, true) if !M::ALLOW_INDEFINITE_CONSTRUCTED => {
                Err(FormatError::DerViolation(
                    "indefinite length constructed value"
                ))
            }
            (true, false) if !M::ALLOW_DEFINITE_CONSTRUCTED => {
                Err(FormatError::DerViolation(
                    "definite length constructed value"
                ))
            }
            _ => Ok(())
        }
    }
}

impl<M: Mode> Header<M> {
    /// Returns the identifier octets.
    pub fn ident(&self) -> Ident {
        self.ident
    }

    /// Returns the tag of the value.
    pub fn tag(&self) -> Tag {
        self.ident.tag()
    }

    /// Returns whether the value is constructed.
    pub fn is_constructed(&self) -> bool {
        self.ident.is_constructed()
    }

    /// Returns the length of the content.
    pub fn length(&self) -> Length<M> {
        self.length
    }

    /// Returns the position of the start of the header.
    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// Returns whether this is the end-of-contents marker.
    pub fn is_end_of_contents(&self) -> bool {
        self.ident.is_end_of_contents()
    }

    /// Writes the header in its shortest form.
    pub fn write_encoded<T: Target>(
        &self, target: &mut T
    ) -> Result<(), T::Error> {
        self.ident.write_encoded(target)?;
        self.length.write_encoded(target)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::decode::SliceSource;
    use crate::mode::{Ber, Cer, Der};
    use super::*;

    fn take<M: Mode>(data: &[u8]) -> Result<Header<M>, FormatError> {
        Header::take_from(&mut SliceSource::new(data)).map_err(|err| {
            err.into_format().unwrap()
        })
    }

    #[test]
    fn method_and_length() {
        let header = take::<Ber>(b"\x30\x80").unwrap();
        assert!(header.is_constructed());
        assert!(header.length().is_indefinite());
        assert_eq!(header.tag(), Tag::SEQUENCE);

        assert_eq!(
            take::<Ber>(b"\x04\x80"), Err(FormatError::IndefinitePrimitive)
        );
        assert!(matches!(
            take::<Der>(b"\x30\x80"), Err(FormatError::DerViolation(_))
        ));
        assert!(matches!(
            take::<Cer>(b"\x30\x00"), Err(FormatError::DerViolation(_))
        ));
        assert!(take::<Cer>(b"\x30\x80").is_ok());
        assert!(take::<Cer>(b"\x04\x00").is_ok());
    }

    #[test]
    fn end_of_contents() {
        assert!(take::<Der>(b"\x00\x00").unwrap().is_end_of_contents());
        assert!(matches!(
            take::<Ber>(b"\x00\x01"), Err(FormatError::IllegalLength(_))
        ));
        assert_eq!(take::<Ber>(b""), Err(FormatError::Truncated));
    }
}
