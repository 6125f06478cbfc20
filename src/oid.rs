//! ASN.1 Object Identifiers.
//!
//! This module contains the [`Oid`] type that implements object identifiers,
//! a construct used by ANS.1 to uniquely identify all sorts of things. The
//! type is also re-exported at the top-level.

use std::{fmt, str};
use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;


//------------ Oid -----------------------------------------------------------

/// An object identifer.
///
/// Object identifiers are globally unique, hierarchical values that are used
/// to identify objects or their type. When written, they are presented as a
/// sequence of integers separated by dots such as ‘1.3.6.1.5.5.7.1’.
///
/// Values of this type keep a single object identifer in the form of the
/// content octets of its BER encoding. Because the encoding is the same
/// under all encoding rules, two identifiers are equal if their octets are.
///
/// Individual arcs are limited to values that fit into a `u64`.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Oid(Bytes);

impl Oid {
    /// Creates an object identifier from its content octets.
    ///
    /// Returns an error if the octets are not a correctly encoded object
    /// identifier.
    pub fn from_content(content: Bytes) -> Result<Self, &'static str> {
        if content.is_empty() {
            return Err("empty object identifier")
        }
        let mut start = true;
        let mut arc_len = 0usize;
        for &octet in content.as_ref() {
            if start && octet == 0x80 {
                return Err("non-minimal arc")
            }
            arc_len += 1;
            if arc_len > MAX_ARC_OCTETS {
                return Err("arc too large")
            }
            start = octet & 0x80 == 0;
            if start {
                arc_len = 0;
            }
        }
        if !start {
            return Err("truncated arc")
        }
        let res = Oid(content);
        if res.subidentifiers().any(|arc| arc.is_none()) {
            return Err("arc too large")
        }
        Ok(res)
    }

    /// Creates an object identifier from its arcs.
    ///
    /// There must be at least two arcs. The first one must be 0, 1, or 2.
    /// If it is 0 or 1, the second arc must be less than 40.
    pub fn from_arcs(arcs: &[u64]) -> Result<Self, &'static str> {
        let (first, second, tail) = match arcs {
            [first, second, tail @ ..] => (*first, *second, tail),
            _ => return Err("at least two arcs required"),
        };
        let head = match first {
            0 | 1 if second < 40 => first * 40 + second,
            2 => second.checked_add(80).ok_or("arc too large")?,
            _ => return Err("illegal first arcs"),
        };
        let mut res = BytesMut::new();
        push_arc(&mut res, head);
        for &arc in tail {
            push_arc(&mut res, arc);
        }
        Ok(Oid(res.freeze()))
    }

    /// Returns the content octets of the identifier.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns the content octets as a bytes value.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Returns the arcs of the object identifier.
    pub fn arcs(&self) -> SmallVec<[u64; 8]> {
        let mut res = SmallVec::new();
        for (idx, subid) in self.subidentifiers().enumerate() {
            // Overly large subidentifiers have been rejected when creating
            // the value.
            let subid = subid.unwrap_or_default();
            if idx == 0 {
                let first = std::cmp::min(subid / 40, 2);
                res.push(first);
                res.push(subid - first * 40);
            }
            else {
                res.push(subid)
            }
        }
        res
    }

    /// Returns an iterator over the raw subidentifiers.
    ///
    /// Each item is `None` if the subidentifier doesn’t fit a `u64`.
    fn subidentifiers(&self) -> impl Iterator<Item = Option<u64>> + '_ {
        self.0.as_ref().split_inclusive(|octet| octet & 0x80 == 0).map(
            |subid| {
                subid.iter().try_fold(0u64, |res, octet| {
                    res.checked_mul(0x80).map(|res| {
                        res | u64::from(octet & 0x7F)
                    })
                })
            }
        )
    }
}

/// The maximum number of octets of a subidentifier fitting a `u64`.
const MAX_ARC_OCTETS: usize = 10;

fn push_arc(target: &mut BytesMut, arc: u64) {
    let mut octets = SmallVec::<[u8; MAX_ARC_OCTETS]>::new();
    let mut arc = arc;
    octets.push((arc & 0x7F) as u8);
    arc >>= 7;
    while arc != 0 {
        octets.push((arc & 0x7F) as u8 | 0x80);
        arc >>= 7;
    }
    for octet in octets.iter().rev() {
        target.put_u8(*octet);
    }
}


//--- FromStr

impl str::FromStr for Oid {
    type Err = &'static str;

    /// Parses an object identifier in dotted decimal notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s.split('.').map(|arc| {
            arc.parse::<u64>().map_err(|_| "invalid arc")
        }).collect::<Result<SmallVec<[u64; 8]>, _>>()?;
        Self::from_arcs(&arcs)
    }
}


//--- AsRef

impl AsRef<[u8]> for Oid {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}


//--- Display and Debug

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut arcs = self.arcs().into_iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
        }
        for arc in arcs {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_str_and_display() {
        for text in ["1.3.6.1.5.5.7.1", "2.5.4.3", "0.9", "2.999.3"] {
            let oid: Oid = text.parse().unwrap();
            assert_eq!(oid.to_string(), text);
        }
        assert!("1".parse::<Oid>().is_err());
        assert!("3.1".parse::<Oid>().is_err());
        assert!("1.40".parse::<Oid>().is_err());
        assert!("1..2".parse::<Oid>().is_err());
    }

    #[test]
    fn encoding() {
        let oid: Oid = "1.2.840.113549".parse().unwrap();
        assert_eq!(oid.as_slice(), b"\x2a\x86\x48\x86\xf7\x0d");
        let oid: Oid = "2.999.3".parse().unwrap();
        assert_eq!(oid.as_slice(), b"\x88\x37\x03");
    }

    #[test]
    fn from_content() {
        let oid = Oid::from_content(
            Bytes::from_static(b"\x2a\x86\x48\x86\xf7\x0d")
        ).unwrap();
        assert_eq!(oid.arcs().as_slice(), &[1, 2, 840, 113549]);
        assert!(Oid::from_content(Bytes::new()).is_err());
        assert!(Oid::from_content(Bytes::from_static(b"\x2a\x86")).is_err());
        assert!(Oid::from_content(Bytes::from_static(b"\x2a\x80\x01")).is_err());
        assert!(Oid::from_content(Bytes::from_static(
            b"\x2a\xff\xff\xff\xff\xff\xff\xff\xff\xff\x7f"
        )).is_err());
    }
}
