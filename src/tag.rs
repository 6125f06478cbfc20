//! The identifier octets of a BER encoded value.
//!
//! This is a private module. The relevant items are re-exported by the
//! parent.

use std::fmt;
use crate::decode::{DecodeError, Source};
use crate::encode::{Target, infallible};
use crate::error::FormatError;


//------------ Tag -----------------------------------------------------------

/// The tag of a value.
///
/// In ASN.1, tags are used to identify the type of a value. Tags consist of
/// one of four classes, represented by the [`Class`] enum, and a number
/// within this class. The number is an unsigned integer.
///
/// In BER encoding, the tag becomes part of the identifier octets by
/// combining it with a bit indicating whether a value is primitive or
/// constructed. This combination is represented by [`Ident`].
///
/// # Limitations
///
/// We only support tag numbers that fit into a `u32`.
//
//  Internally, we store the tag as the identifier octets of a primitive value
//  with the same tag.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Tag(Ident);

impl Tag {
    /// Creates a tag from a class and number.
    pub const fn new(class: Class, number: u32) -> Self {
        Self(Ident::new(class, false, number))
    }

    /// Creates a new tag in the universal class with the given number.
    pub const fn universal(number: u32) -> Self {
        Self::new(Class::Universal, number)
    }

    /// Creates a new tag in the application class with the given number.
    pub const fn application(number: u32) -> Self {
        Self::new(Class::Application, number)
    }

    /// Creates a new tag in class “context specific” with the given number.
    pub const fn ctx(number: u32) -> Self {
        Self::new(Class::Context, number)
    }

    /// Creates a new tag in the private class with the given number.
    pub const fn private(number: u32) -> Self {
        Self::new(Class::Private, number)
    }

    /// Returns the class of the tag.
    pub const fn class(self) -> Class {
        self.0.class()
    }

    /// Returns the number of the tag.
    pub const fn number(self) -> u32 {
        self.0.number()
    }
}

/// # Constants for universal tags.
///
/// Only the tags of the types known to the crate are provided. See clause
/// 8.4 of ITU Recommendation X.690 for the complete list.
impl Tag {
    /// The tag for the BOOLEAN type, UNIVERSAL 1.
    pub const BOOLEAN: Self = Self::universal(1);

    /// The tag for the INTEGER type, UNIVERSAL 2.
    pub const INTEGER: Self = Self::universal(2);

    /// The tag for the OCTET STRING type, UNIVERSAL 4.
    pub const OCTET_STRING: Self = Self::universal(4);

    /// The tag for the NULL type, UNIVERSAL 5.
    pub const NULL: Self = Self::universal(5);

    /// The tag for the OBJECT IDENTIFIER type, UNIVERSAL 6.
    pub const OID: Self = Self::universal(6);

    /// The tag for the UTF8String type, UNIVERSAL 12
    pub const UTF8_STRING: Self = Self::universal(12);

    /// The tag for the SEQUENCE and SEQUENCE OF types, UNIVERSAL 16.
    pub const SEQUENCE: Self = Self::universal(16);

    /// The tag for the SET and SET OF types, UNIVERSAL 17.
    pub const SET: Self = Self::universal(17);

    /// The tag for the PrintableString type, UNIVERSAL 19.
    pub const PRINTABLE_STRING: Self = Self::universal(19);

    /// The tag for the IA5String type, UNIVERSAL 22.
    pub const IA5_STRING: Self = Self::universal(22);

    /// The tag for the UTCTime type, UNIVERSAL 23.
    pub const UTC_TIME: Self = Self::universal(23);

    /// The tag for the GeneralizedType type, UNIVERSAL 24.
    pub const GENERALIZED_TIME: Self = Self::universal(24);

    /// The tag for the VisibleString type, UNIVERSAL 26.
    pub const VISIBLE_STRING: Self = Self::universal(26);
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Tag::BOOLEAN => write!(f, "BOOLEAN"),
            Tag::INTEGER => write!(f, "INTEGER"),
            Tag::OCTET_STRING => write!(f, "OCTET STRING"),
            Tag::NULL => write!(f, "NULL"),
            Tag::OID => write!(f, "OBJECT IDENTIFIER"),
            Tag::UTF8_STRING => write!(f, "UTF8String"),
            Tag::SEQUENCE => write!(f, "SEQUENCE"),
            Tag::SET => write!(f, "SET"),
            Tag::PRINTABLE_STRING => write!(f, "PrintableString"),
            Tag::IA5_STRING => write!(f, "IA5String"),
            Tag::UTC_TIME => write!(f, "UTCTime"),
            Tag::GENERALIZED_TIME => write!(f, "GeneralizedTime"),
            Tag::VISIBLE_STRING => write!(f, "VisibleString"),
            tag => {
                match tag.class() {
                    Class::Universal => write!(f, "[UNIVERSAL ")?,
                    Class::Application => write!(f, "[APPLICATION ")?,
                    Class::Context => write!(f, "[")?,
                    Class::Private => write!(f, "[PRIVATE ")?,
                }
                write!(f, "{}]", tag.number())
            }
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({} - {:?})", self, self.0.as_slice())
    }
}


//------------ TagMethod -----------------------------------------------------

/// How a tag is applied to the type it is attached to.
///
/// An explicit tag wraps the encoding of the underlying type in an
/// additional constructed value. An implicit tag replaces the tag of the
/// underlying type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TagMethod {
    Explicit,
    Implicit,
}

impl fmt::Display for TagMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TagMethod::Explicit => f.write_str("EXPLICIT"),
            TagMethod::Implicit => f.write_str("IMPLICIT"),
        }
    }
}


//------------ Ident ---------------------------------------------------------

/// The identifier octets of an encoded value.
///
/// These are a tag plus the bit signalling whether the value is primitive
/// or constructed.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ident(I);

#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum I {
    L1([u8; 1]),
    L2([u8; 2]),
    L3([u8; 3]),
    L4([u8; 4]),
    L5([u8; 5]),
    L6([u8; 6]),
}

impl Ident {
    /// The identifier of the end-of-contents marker.
    pub const END_OF_CONTENTS: Self = Self::new(Class::Universal, false, 0);

    /// Encodes a number into the identifier representation.
    const fn new(class: Class, constructed: bool, number: u32) -> Self {
        let first = if constructed {
            class.into_u8() | 0x20
        }
        else {
            class.into_u8()
        };

        if number <= 0x1e {
            // five bits but not all of them one (so not 0x1f)
            return Self(I::L1([first | number as u8]))
        }

        // Now the first octet is always the class plus bits 1 to 5 all 1.
        let first = first | 0x1f;

        // The lowest seven bits are the last octet. Shift the number by
        // seven to see what’s left. If that’s zero, we have a two octet
        // tag.
        let n0 = (number & 0x7F) as u8;
        let number = number >> 7;
        if number == 0 {
            return Self(I::L2([first, n0]))
        }

        let n1 = ((number & 0x7F) | 0x80) as u8;
        let number = number >> 7;
        if number == 0 {
            return Self(I::L3([first, n1, n0]))
        }

        let n2 = ((number & 0x7F) | 0x80) as u8;
        let number = number >> 7;
        if number == 0 {
            return Self(I::L4([first, n2, n1, n0]))
        }

        let n3 = ((number & 0x7F) | 0x80) as u8;
        let number = number >> 7;
        if number == 0 {
            return Self(I::L5([first, n3, n2, n1, n0]))
        }

        let n4 = ((number & 0x7F) | 0x80) as u8;
        Self(I::L6([first, n4, n3, n2, n1, n0]))
    }

    /// Creates identifier octets from a tag.
    pub const fn from_tag(tag: Tag, constructed: bool) -> Self {
        if constructed {
            match tag.0.0 {
                I::L1([x]) => Self(I::L1([x | 0x20])),
                I::L2([x, y0]) => Self(I::L2([x | 0x20, y0])),
                I::L3([x, y0, y1]) => Self(I::L3([x | 0x20, y0, y1])),
                I::L4([x, y0, y1, y2]) => {
                    Self(I::L4([x | 0x20, y0, y1, y2]))
                }
                I::L5([x, y0, y1, y2, y3]) => {
                    Self(I::L5([x | 0x20, y0, y1, y2, y3]))
                }
                I::L6([x, y0, y1, y2, y3, y4]) => {
                    Self(I::L6([x | 0x20, y0, y1, y2, y3, y4]))
                }
            }
        }
        else {
            tag.0
        }
    }

    /// Returns the tag for the identifier octets.
    pub const fn tag(self) -> Tag {
        match self.0 {
            I::L1([x]) => Tag(Self(I::L1([x & 0xDF]))),
            I::L2([x, y0]) => Tag(Self(I::L2([x & 0xDF, y0]))),
            I::L3([x, y0, y1]) => Tag(Self(I::L3([x & 0xDF, y0, y1]))),
            I::L4([x, y0, y1, y2]) => {
                Tag(Self(I::L4([x & 0xDF, y0, y1, y2])))
            }
            I::L5([x, y0, y1, y2, y3]) => {
                Tag(Self(I::L5([x & 0xDF, y0, y1, y2, y3])))
            }
            I::L6([x, y0, y1, y2, y3, y4]) => {
                Tag(Self(I::L6([x & 0xDF, y0, y1, y2, y3, y4])))
            }
        }
    }

    /// Returns the class of the identifier octets.
    pub const fn class(self) -> Class {
        Class::from_u8(self.first())
    }

    /// Returns whether the value is to be a constructed value.
    pub const fn is_constructed(self) -> bool {
        self.first() & 0x20 != 0
    }

    /// Returns the number of the tag.
    pub const fn number(self) -> u32 {
        match self.0 {
            I::L1([x]) => (x & 0x1f) as u32,
            I::L2([_, x0]) => x0 as u32,
            I::L3([_, x1, x2]) => {
                  ((x1 & 0x7f) as u32) << 7
                | (x2 as u32)
            }
            I::L4([_, x1, x2, x3]) => {
                  ((x1 & 0x7f) as u32) << 14
                | ((x2 & 0x7f) as u32) << 7
                | (x3 as u32)
            }
            I::L5([_, x1, x2, x3, x4]) => {
                  ((x1 & 0x7f) as u32) << 21
                | ((x2 & 0x7f) as u32) << 14
                | ((x3 & 0x7f) as u32) << 7
                | (x4 as u32)
            }
            I::L6([_, x1, x2, x3, x4, x5]) => {
                  ((x1 & 0x7f) as u32) << 28
                | ((x2 & 0x7f) as u32) << 21
                | ((x3 & 0x7f) as u32) << 14
                | ((x4 & 0x7f) as u32) << 7
                | (x5 as u32)
            }
        }
    }

    /// Returns whether these are the end-of-contents identifier octets.
    pub fn is_end_of_contents(self) -> bool {
        self == Self::END_OF_CONTENTS
    }

    /// Returns a slice of the encoded octets.
    pub const fn as_slice(&self) -> &[u8] {
        match &self.0 {
            I::L1(arr) => arr.as_slice(),
            I::L2(arr) => arr.as_slice(),
            I::L3(arr) => arr.as_slice(),
            I::L4(arr) => arr.as_slice(),
            I::L5(arr) => arr.as_slice(),
            I::L6(arr) => arr.as_slice(),
        }
    }

    /// Returns the first octet.
    const fn first(self) -> u8 {
        match self.0 {
            I::L1([x]) => x,
            I::L2([x, ..]) => x,
            I::L3([x, ..]) => x,
            I::L4([x, ..]) => x,
            I::L5([x, ..]) => x,
            I::L6([x, ..]) => x,
        }
    }

    /// Takes the identifier octets from the beginning of a source.
    ///
    /// Returns `Ok(None)` if the source has no more data. Tag numbers that
    /// don’t use the shortest possible form are rejected under all rules.
    pub fn take_opt_from<S: Source>(
        source: &mut S
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let pos = source.pos();
        let Some(first) = source.take_opt_u8()? else {
            return Ok(None)
        };

        // If we have a single octet tag, we can already return.
        if (first & 0x1f) < 0x1f {
            return Ok(Some(Self(I::L1([first]))))
        }

        // Work your way through the multi-octet tags.
        let x0 = source.take_u8()?;
        if x0 == 0x80 {
            return Err(DecodeError::format(
                FormatError::IllegalTag("leading zero in tag number"), pos
            ))
        }
        if (x0 & 0x80) == 0 {
            if x0 < 0x1f {
                return Err(DecodeError::format(
                    FormatError::IllegalTag("low tag number in long form"),
                    pos
                ))
            }
            return Ok(Some(Self(I::L2([first, x0]))))
        }

        let x1 = source.take_u8()?;
        if (x1 & 0x80) == 0 {
            return Ok(Some(Self(I::L3([first, x0, x1]))))
        }

        let x2 = source.take_u8()?;
        if (x2 & 0x80) == 0 {
            return Ok(Some(Self(I::L4([first, x0, x1, x2]))))
        }

        let x3 = source.take_u8()?;
        if (x3 & 0x80) == 0 {
            return Ok(Some(Self(I::L5([first, x0, x1, x2, x3]))))
        }

        let x4 = source.take_u8()?;
        if (x4 & 0x80) == 0 {
            // In order to fit into a u32, only the lowest four bits of x0
            // may carry data.
            if x0 & 0x70 != 0 {
                return Err(DecodeError::format(
                    FormatError::IllegalTag("tag number exceeds 32 bits"),
                    pos
                ))
            }
            return Ok(Some(Self(I::L6([first, x0, x1, x2, x3, x4]))))
        }

        Err(DecodeError::format(
            FormatError::IllegalTag("tag number exceeds 32 bits"), pos
        ))
    }

    /// Takes the identifier octets from the beginning of a source.
    ///
    /// Returns an error if the source has no more data.
    pub fn take_from<S: Source>(
        source: &mut S
    ) -> Result<Self, DecodeError<S::Error>> {
        let pos = source.pos();
        Self::take_opt_from(source)?.ok_or_else(|| {
            DecodeError::format(FormatError::Truncated, pos)
        })
    }

    /// Returns the number of octets of the encoded form of the tag.
    pub fn encoded_len(self) -> usize {
        self.as_slice().len()
    }

    /// Writes the identifier octets to a target.
    pub fn write_encoded<T: Target>(
        self, target: &mut T
    ) -> Result<(), T::Error> {
        target.write_all(self.as_slice())
    }

    /// Appends the identifier octets to the end of a vec.
    pub fn append_encoded(self, target: &mut Vec<u8>) {
        infallible(self.write_encoded(target))
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.as_slice())
    }
}


//------------ Class ---------------------------------------------------------

/// The class of a tag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Class {
    Universal,
    Application,
    Context,
    Private,
}

impl Class {
    const fn from_u8(octet: u8) -> Self {
        match octet {
            0x00..=0x3F => Self::Universal,
            0x40..=0x7F => Self::Application,
            0x80..=0xBF => Self::Context,
            0xC0..=0xFF => Self::Private
        }
    }

    const fn into_u8(self) -> u8 {
        match self {
            Self::Universal => 0x00,
            Self::Application => 0x40,
            Self::Context => 0x80,
            Self::Private => 0xC0,
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::decode::SliceSource;
    use super::*;

    const CLASSES: &[Class] = &[
        Class::Universal, Class::Application, Class::Context, Class::Private
    ];

    fn take(data: &[u8]) -> Result<Ident, FormatError> {
        let mut source = SliceSource::new(data);
        let res = Ident::take_from(&mut source).map_err(|err| {
            err.into_format().expect("slice sources don’t fail")
        })?;
        assert!(source.remaining().is_empty());
        Ok(res)
    }

    #[test]
    fn numbers_survive_encoding() {
        let numbers = [
            0, 1, 0x1e, 0x1f, 0x7f, 0x80, 0x3fff, 0x4000, 0x1f_ffff,
            0x20_0000, 0x0fff_ffff, 0x1000_0000, u32::MAX
        ];
        for &class in CLASSES {
            for number in numbers {
                let tag = Tag::new(class, number);
                assert_eq!(tag.number(), number);
                assert_eq!(tag.class(), class);
                for constructed in [false, true] {
                    let ident = Ident::from_tag(tag, constructed);
                    assert_eq!(ident.is_constructed(), constructed);
                    assert_eq!(ident.tag(), tag);
                    assert_eq!(take(ident.as_slice()), Ok(ident));
                }
            }
        }
    }

    #[test]
    fn encoded_forms() {
        assert_eq!(Ident::from_tag(Tag::SEQUENCE, true).as_slice(), b"\x30");
        assert_eq!(Ident::from_tag(Tag::ctx(2), false).as_slice(), b"\x82");
        assert_eq!(Ident::from_tag(Tag::ctx(3), true).as_slice(), b"\xa3");
        assert_eq!(
            Ident::from_tag(Tag::application(31), false).as_slice(),
            b"\x5f\x1f"
        );
        assert_eq!(
            Ident::from_tag(Tag::private(201), false).as_slice(),
            b"\xdf\x81\x49"
        );
    }

    #[test]
    fn non_canonical_tags() {
        assert!(matches!(
            take(b"\x9f\x80\x01"), Err(FormatError::IllegalTag(_))
        ));
        assert!(matches!(take(b"\x9f\x05"), Err(FormatError::IllegalTag(_))));
        assert!(matches!(
            take(b"\x9f\xff\xff\xff\xff\x7f"), Err(FormatError::IllegalTag(_))
        ));
        assert!(matches!(
            take(b"\x9f\x81\x81\x81\x81\x81\x01"),
            Err(FormatError::IllegalTag(_))
        ));
        assert_eq!(take(b"\x9f\x81"), Err(FormatError::Truncated));
        assert_eq!(take(b""), Err(FormatError::Truncated));
    }

    #[test]
    fn display() {
        assert_eq!(Tag::SEQUENCE.to_string(), "SEQUENCE");
        assert_eq!(Tag::ctx(4).to_string(), "[4]");
        assert_eq!(Tag::application(7).to_string(), "[APPLICATION 7]");
        assert_eq!(Tag::universal(9).to_string(), "[UNIVERSAL 9]");
    }
}
