//! The length octets.
//!
//! This is a private module. The [`Length`] defined herein is re-exported
//! by the parent.

use std::marker::PhantomData;
use crate::decode::{DecodeError, Source};
use crate::encode::{Target, infallible};
use crate::error::FormatError;
use crate::mode::Mode;


//------------ Length -------------------------------------------------------

/// The length octets of an encoded value.
///
/// A length value can either be definite, meaning it provides the actual
/// number of content octets in the value, or indefinite, in which case the
/// content is delimited by a special end-of-contents marker.
///
/// # BER Encoding
///
/// The length can be encoded in one of two basic ways. Which one is used is
/// determined by the most significant bit of the first octet. If it is not
/// set, the length octets is one octet long and the remaining bits of this
/// first octet provide the definite length. Thus, if the first octet is
/// less than 128, it provides the definite length already.
///
/// If the most significant bit is set, the remaining bits of the first
/// octet specify the number of octets that follow to encode the actual
/// length. If they specify that there are zero more octets, i.e., the
/// value of the first octet is 128, the length is indefinite. Otherwise,
/// those following octets give the big-endian encoding of the definite
/// length of the content octets.
///
/// Under both CER and DER rules, a definite length must be encoded in the
/// minimum number of octets. Because of this, the type is generic over
/// the mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Length<M> {
    /// The length.
    ///
    /// If this is `None`, the length is indefinite. Otherwise it is definite
    /// with the given value.
    length: Option<Definite>,

    /// A marker for the mode.
    marker: PhantomData<M>,
}

impl<M> Length<M> {
    /// Creates a new length from the given optional length.
    ///
    /// If the length is `None`, creates an indefinite length value.
    pub fn new(length: Option<usize>) -> Self {
        Self { length: length.map(Definite), marker: PhantomData }
    }

    /// Creates a new definite length.
    pub fn from_definite(len: usize) -> Self {
        Self::new(Some(len))
    }

    /// Creates a new indefinite length.
    pub fn indefinite() -> Self {
        Self::new(None)
    }

    /// Returns the length if it is definite.
    pub fn definite(self) -> Option<usize> {
        self.length.map(|x| x.0)
    }

    /// Returns whether the length is indefinite.
    pub fn is_indefinite(self) -> bool {
        self.length.is_none()
    }

    /// Returns whether the length is definite and zero.
    pub fn is_zero(self) -> bool {
        self.definite() == Some(0)
    }

    /// Parses a length from a source.
    ///
    /// Whether non-minimal encodings of definite lengths are accepted
    /// depends on the mode.
    pub fn take_from<S: Source>(
        source: &mut S
    ) -> Result<Self, DecodeError<S::Error>>
    where M: Mode {
        let pos = source.pos();
        let octets = match FirstOctet::take_from(source)? {
            FirstOctet::Single(res) => return Ok(res),
            FirstOctet::Multi(octets) => octets,
        };

        let mut res = 0usize;
        for i in 0..octets {
            let octet = source.take_u8()?;

            // This branch should be optimized away after monomorphisation.
            if M::IS_RESTRICTED && i == 0 && octet == 0 {
                return Err(DecodeError::format(
                    FormatError::IllegalLength("leading zero octets"), pos
                ))
            }

            res = match res.checked_mul(0x100) {
                Some(res) => res | usize::from(octet),
                None => {
                    return Err(DecodeError::format(
                        FormatError::IllegalLength("excessive length"), pos
                    ))
                }
            };
        }

        if M::IS_RESTRICTED && octets == 1 && res < 0x80 {
            return Err(DecodeError::format(
                FormatError::IllegalLength("long form for short length"), pos
            ))
        }
        Ok(Self::new(Some(res)))
    }

    /// Returns the length of the encoded representation of the value.
    pub fn encoded_len(self) -> usize {
        match self.length {
            Some(definite) => definite.encoded_len(),
            None => 1,
        }
    }

    /// Appends the encoded length to the end of `target`.
    pub fn append_encoded(self, target: &mut Vec<u8>) {
        infallible(self.write_encoded(target))
    }

    /// Writes the encoded length to the given target.
    pub fn write_encoded<T: Target>(
        self, target: &mut T
    ) -> Result<(), T::Error> {
        match self.length {
            Some(definite) => definite.write_encoded(target),
            None => target.write_all(&[0x80]),
        }
    }
}


//------------ FirstOctet ---------------------------------------------------

/// The first octet of the encoded length.
enum FirstOctet<M> {
    /// The first octet is a length in and of itself.
    Single(Length<M>),

    /// The first octet indicates the number of octets to follow.
    Multi(usize),
}

impl<M> FirstOctet<M> {
    /// Takes the first octet and checks what it means.
    fn take_from<S: Source>(
        source: &mut S
    ) -> Result<Self, DecodeError<S::Error>> {
        let pos = source.pos();
        match source.take_u8()? {
            // Bit 7 clear: single.
            n if (n & 0x80) == 0 => {
                Ok(Self::Single(Length::new(Some(n as usize))))
            }

            // 0x80: indefinite.
            0x80 => Ok(Self::Single(Length::new(None))),

            // 0xFF: reserved.
            0xFF => {
                Err(DecodeError::format(
                    FormatError::IllegalLength("reserved length octet"), pos
                ))
            }

            // anything else: clear left bit, number of octets.
            n => Ok(Self::Multi((n & 0x7F) as usize))
        }
    }
}


//------------ Definite ------------------------------------------------------

/// A definite length.
///
/// This is a newtype of `usize` which allows us to do all the encoding
/// things on it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
struct Definite(usize);

impl Definite {
    const LEN: usize = 0usize.to_ne_bytes().len();

    fn encoded_len(self) -> usize {
        if self.0 > 0x7F {
            Self::LEN - self.encoded_start_idx() + 1
        }
        else {
            1
        }
    }

    fn write_encoded<T: Target>(
        self, target: &mut T
    ) -> Result<(), T::Error> {
        if self.0 > 0x7F {
            let idx = self.encoded_start_idx();
            debug_assert!(idx < Self::LEN);

            // LEN will never be greater than 126 bytes. Also, `idx` won’t be
            // greater than LEN, so the subtraction here is fine.
            target.write_all(&[((Self::LEN - idx) | 0x80) as u8])?;
            let bytes = self.0.to_be_bytes();
            target.write_all(bytes.get(idx..).unwrap_or_default())
        }
        else {
            target.write_all(&[self.0 as u8])
        }
    }

    /// Returns the index of the first non-zero octet of `len`.
    fn encoded_start_idx(self) -> usize {
        (self.0.leading_zeros() / 8) as usize
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::decode::SliceSource;
    use crate::mode::{Ber, Cer, Der};
    use super::*;

    fn take_from<M: Mode>(src: &[u8]) -> Result<Option<usize>, FormatError> {
        let mut src = SliceSource::new(src);
        let res = Length::<M>::take_from(&mut src).map_err(|err| {
            err.into_format().unwrap()
        })?;
        if src.remaining().is_empty() {
            Ok(res.definite())
        }
        else {
            Err(FormatError::TrailingData)
        }
    }

    #[test]
    fn ber_take_from() {
        let take_from = take_from::<Ber>;
        assert_eq!(take_from(b"\x00"), Ok(Some(0x00)));
        assert_eq!(take_from(b"\x12"), Ok(Some(0x12)));
        assert_eq!(take_from(b"\x7f"), Ok(Some(0x7f)));
        assert_eq!(take_from(b"\x80"), Ok(None));
        assert_eq!(take_from(b"\x81\x00"), Ok(Some(0)));
        assert_eq!(take_from(b"\x81\xF0"), Ok(Some(0xF0)));
        assert_eq!(take_from(b"\x82\x00\x00"), Ok(Some(0)));
        assert_eq!(take_from(b"\x82\xF0\x0E"), Ok(Some(0xF00E)));
        assert_eq!(take_from(b"\x82\x00\x0E"), Ok(Some(0x0E)));
        assert!(take_from(b"\xFF").is_err());
        assert_eq!(take_from(b"\x82\x01"), Err(FormatError::Truncated));
        assert!(matches!(
            take_from(b"\x89\x01\x00\x00\x00\x00\x00\x00\x00\x00"),
            Err(FormatError::IllegalLength(_))
        ));
    }

    #[test]
    fn restricted_take_from() {
        for take_from in [take_from::<Der>, take_from::<Cer>] {
            assert_eq!(take_from(b"\x00"), Ok(Some(0x00)));
            assert_eq!(take_from(b"\x12"), Ok(Some(0x12)));
            assert_eq!(take_from(b"\x7f"), Ok(Some(0x7f)));
            assert_eq!(take_from(b"\x80"), Ok(None));
            assert!(take_from(b"\x81\x00").is_err());
            assert!(take_from(b"\x81\x7f").is_err());
            assert_eq!(take_from(b"\x81\x80"), Ok(Some(0x80)));
            assert_eq!(take_from(b"\x81\xF0"), Ok(Some(0xF0)));
            assert!(take_from(b"\x82\x00\x00").is_err());
            assert_eq!(take_from(b"\x82\xF0\x0E"), Ok(Some(0xF00E)));
            assert!(take_from(b"\x82\x00\x0E").is_err());
            assert!(take_from(b"\xFF").is_err());
        }
    }

    #[test]
    fn encode() {
        fn step(l: Option<usize>, res: &[u8]) {
            let l = Length::<Ber>::new(l);
            let mut vec = Vec::new();
            l.append_encoded(&mut vec);
            assert_eq!(vec.as_slice(), res, "append failed for {l:?}");
            assert_eq!(l.encoded_len(), res.len());
        }

        step(None, b"\x80");
        step(Some(0), b"\x00");
        step(Some(0x12), b"\x12");
        step(Some(0x7f), b"\x7f");
        step(Some(0x80), b"\x81\x80");
        step(Some(0xdead), b"\x82\xde\xad");
        step(Some(0x01_0000), b"\x83\x01\x00\x00");
    }
}
