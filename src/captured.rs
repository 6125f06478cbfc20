//! Captured encoded data.
//!
//! This is a private module. Its public items are re-exported by the parent.

use std::fmt;
use std::convert::Infallible;
use bytes::Bytes;
use crate::decode::{DecodeError, Fragment, Header, SliceSource, Source};
use crate::encode::{Target, infallible};
use crate::error::FormatError;
use crate::mode::Mode;
use crate::tag::{Ident, Tag};


//------------ Captured ------------------------------------------------------

/// A single complete encoded value kept as is.
///
/// The decoder captures elements it doesn’t know about – such as the
/// additions of a newer version of an extensible type – so they can be
/// passed on and written back by the encoder. A captured value always
/// contains exactly one value including its identifier and length octets.
///
/// When capturing, identifier and length octets are rewritten in their
/// shortest form. The content is kept unchanged.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Captured {
    ident: Ident,
    data: Bytes,
}

impl Captured {
    /// Creates a captured value from its complete encoding.
    ///
    /// The data must contain exactly one value encoded according to the
    /// rules of mode `M`.
    pub fn from_bytes<M: Mode>(
        data: Bytes
    ) -> Result<Self, DecodeError<Infallible>> {
        let mut source = SliceSource::new(data.as_ref());
        let header = Header::<M>::take_from(&mut source)?;
        let mut check = Vec::new();
        capture_content(&header, &mut source, &mut check, usize::MAX)?;
        if !source.remaining().is_empty() {
            return Err(DecodeError::format(
                FormatError::TrailingData, source.pos()
            ))
        }
        Ok(Captured { ident: header.ident(), data })
    }

    /// Takes the remainder of a value whose header was already read.
    ///
    /// Nested values of indefinite length are followed for at most
    /// `max_depth` levels.
    pub(crate) fn take_from<M: Mode, S: Source>(
        header: &Header<M>, source: &mut S, max_depth: usize
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut data = Vec::new();
        capture_content(header, source, &mut data, max_depth)?;
        Ok(Captured { ident: header.ident(), data: data.into() })
    }

    /// Returns the tag of the captured value.
    pub fn tag(&self) -> Tag {
        self.ident.tag()
    }

    /// Returns whether the captured value is constructed.
    pub fn is_constructed(&self) -> bool {
        self.ident.is_constructed()
    }

    /// Returns a bytes slice with the raw data of the captured value.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Converts the captured value into the underlying bytes value.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Writes the captured value to a target.
    pub fn write_encoded<T: Target>(
        &self, target: &mut T
    ) -> Result<(), T::Error> {
        target.write_all(self.as_slice())
    }
}

/// Appends header and content of a value to `target`.
fn capture_content<M: Mode, S: Source>(
    header: &Header<M>,
    source: &mut S,
    target: &mut Vec<u8>,
    depth: usize,
) -> Result<(), DecodeError<S::Error>> {
    infallible(header.write_encoded(target));
    if let Some(len) = header.length().definite() {
        let frag = source.request_exact(len)?;
        target.extend_from_slice(frag.slice());
        frag.consume();
        return Ok(())
    }
    let Some(depth) = depth.checked_sub(1) else {
        return Err(DecodeError::format(
            FormatError::DepthExceeded, header.pos()
        ))
    };
    loop {
        let pos = source.pos();
        let inner = match Header::<M>::take_opt_from(source)? {
            Some(inner) => inner,
            None => {
                return Err(DecodeError::format(
                    FormatError::MissingEndOfContents, pos
                ))
            }
        };
        capture_content(&inner, source, target, depth)?;
        if inner.is_end_of_contents() {
            return Ok(())
        }
    }
}


//--- AsRef

impl AsRef<[u8]> for Captured {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}


//--- Debug

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Captured({}: ", self.tag())?;
        for octet in self.as_slice() {
            write!(f, "{:02x}", octet)?;
        }
        write!(f, ")")
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::mode::{Ber, Der};
    use super::*;

    #[test]
    fn capture_definite() {
        let data = b"\x81\x02\x05\x06\x01";
        let mut source = SliceSource::new(data);
        let header = Header::<Der>::take_from(&mut source).unwrap();
        let captured = Captured::take_from(&header, &mut source, 8).unwrap();
        assert_eq!(captured.as_slice(), b"\x81\x02\x05\x06");
        assert_eq!(captured.tag(), Tag::ctx(1));
        assert_eq!(source.remaining(), b"\x01");
    }

    #[test]
    fn capture_indefinite() {
        let data = b"\xa5\x80\x30\x80\x01\x01\xff\x00\x00\x00\x00\x05\x00";
        let mut source = SliceSource::new(data);
        let header = Header::<Ber>::take_from(&mut source).unwrap();
        let captured = Captured::take_from(
            &header, &mut source, 8
        ).unwrap();
        assert_eq!(captured.as_slice(), &data[..11]);
        assert!(captured.is_constructed());
        assert_eq!(source.remaining(), b"\x05\x00");

        let mut source = SliceSource::new(data);
        let header = Header::<Ber>::take_from(&mut source).unwrap();
        assert_eq!(
            Captured::take_from(&header, &mut source, 1).unwrap_err()
                .into_format(),
            Some(FormatError::DepthExceeded)
        );
    }

    #[test]
    fn from_bytes() {
        assert!(
            Captured::from_bytes::<Der>(Bytes::from_static(b"\x04\x01\x00"))
                .is_ok()
        );
        assert!(
            Captured::from_bytes::<Der>(Bytes::from_static(b"\x04\x01"))
                .is_err()
        );
        assert!(
            Captured::from_bytes::<Ber>(
                Bytes::from_static(b"\x04\x00\x00")
            ).is_err()
        );
        assert!(
            Captured::from_bytes::<Ber>(
                Bytes::from_static(b"\x30\x80\x00\x00")
            ).is_ok()
        );
    }
}
