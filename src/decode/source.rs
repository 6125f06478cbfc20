//! The source for decoding data.
//!
//! This is an internal module. Its public types are re-exported by the
//! parent.

use std::{error, fmt, io, ops};
use std::convert::Infallible;
use std::io::Read;
use bytes::Bytes;
use crate::error::FormatError;
use super::error::DecodeError;


//------------ Source --------------------------------------------------------

/// A view into a sequence of octets.
///
/// Sources form the foundation of decoding. They provide the raw octets to
/// decoders. Data is requested as fragments of a given maximum length.
/// Only once a fragment is consumed is the source advanced. This allows
/// looking ahead without committing to anything.
///
/// A source can fail for its own reasons, for instance because reading
/// from an underlying file failed. These failures are represented by the
/// associated `Error` type.
pub trait Source {
    /// The fragment handed out by the source.
    type Fragment<'f>: Fragment<'f> where Self: 'f;

    /// The error produced when the source failed to read more data.
    type Error: error::Error;


    //--- Required methods

    /// Returns the current logical position within the source.
    fn pos(&self) -> Pos;

    /// Requests up to `len` octets of data.
    ///
    /// The returned fragment will be shorter than `len` only if the source
    /// has reached its end.
    fn request<'f>(
        &'f mut self, len: usize
    ) -> Result<Self::Fragment<'f>, Self::Error>;


    //--- Provided methods

    /// Requests exactly `len` octets of data.
    ///
    /// Returns a format error if the source ends before that.
    fn request_exact<'f>(
        &'f mut self, len: usize
    ) -> Result<Self::Fragment<'f>, DecodeError<Self::Error>> {
        let pos = self.pos();
        let frag = self.request(len)?;
        if frag.slice().len() < len {
            Err(DecodeError::format(FormatError::Truncated, pos))
        }
        else {
            Ok(frag)
        }
    }

    /// Takes a single octet from the source.
    ///
    /// If there aren’t any more octets available from the source, returns
    /// a format error.
    fn take_u8(&mut self) -> Result<u8, DecodeError<Self::Error>> {
        let pos = self.pos();
        self.take_opt_u8()?.ok_or_else(|| {
            DecodeError::format(FormatError::Truncated, pos)
        })
    }

    /// Takes an optional octet from the source.
    ///
    /// If there aren’t any more octets available from the source, returns
    /// `Ok(None)`.
    fn take_opt_u8(&mut self) -> Result<Option<u8>, Self::Error> {
        let frag = self.request(1)?;
        match frag.slice().first().copied() {
            Some(value) => {
                frag.consume();
                Ok(Some(value))
            }
            None => Ok(None)
        }
    }

    /// Takes exactly `len` octets from the source and returns them.
    fn take_bytes(
        &mut self, len: usize
    ) -> Result<Bytes, DecodeError<Self::Error>> {
        let frag = self.request_exact(len)?;
        let res = Bytes::copy_from_slice(frag.slice());
        frag.consume();
        Ok(res)
    }

    /// Returns whether the source has no more data.
    fn is_exhausted(&mut self) -> Result<bool, Self::Error> {
        Ok(self.request(1)?.slice().is_empty())
    }
}


//------------ Fragment ------------------------------------------------------

/// A piece of data requested from a source.
///
/// Dropping the fragment leaves the source where it was. Calling
/// [`consume`][Self::consume] advances the source past the fragment.
pub trait Fragment<'f> {
    /// Returns the data of the fragment.
    fn slice(&self) -> &[u8];

    /// Advances the source past the fragment.
    fn consume(self);
}


//------------ IntoSource ----------------------------------------------------

/// A type that can be converted into a source.
pub trait IntoSource {
    type Source: Source;

    fn into_source(self) -> Self::Source;
}

impl<T: Source> IntoSource for T {
    type Source = Self;

    fn into_source(self) -> Self::Source {
        self
    }
}

impl<'a> IntoSource for &'a [u8] {
    type Source = SliceSource<'a>;

    fn into_source(self) -> Self::Source {
        SliceSource::new(self)
    }
}

impl<'a> IntoSource for &'a Bytes {
    type Source = SliceSource<'a>;

    fn into_source(self) -> Self::Source {
        SliceSource::new(self.as_ref())
    }
}


//------------ SliceSource ---------------------------------------------------

/// A source atop a slice of octets.
#[derive(Clone, Copy, Debug)]
pub struct SliceSource<'s> {
    data: &'s [u8],
    pos: usize,
}

impl<'s> SliceSource<'s> {
    /// Creates a source for the given slice.
    pub fn new(data: &'s [u8]) -> Self {
        Self::new_at(data, Pos::default())
    }

    /// Creates a source for a slice that starts at `pos` in some outer data.
    ///
    /// This only affects the positions reported in errors.
    pub fn new_at(data: &'s [u8], pos: Pos) -> Self {
        Self { data, pos: pos.0 }
    }

    /// Returns the data not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        self.data
    }
}

impl<'s> Source for SliceSource<'s> {
    type Error = Infallible;
    type Fragment<'f> = SliceFragment<'s, 'f> where Self: 'f;

    fn pos(&self) -> Pos {
        self.pos.into()
    }

    fn request<'f>(
        &'f mut self, len: usize
    ) -> Result<Self::Fragment<'f>, Self::Error> {
        let (head, tail) = match self.data.split_at_checked(len) {
            Some(some) => some,
            None => (self.data, b"".as_ref())
        };
        Ok(SliceFragment { source: self, head, tail })
    }
}


//------------ SliceFragment -------------------------------------------------

pub struct SliceFragment<'s, 'f> {
    source: &'f mut SliceSource<'s>,
    head: &'s [u8],
    tail: &'s [u8],
}

impl<'s, 'f> Fragment<'f> for SliceFragment<'s, 'f> {
    fn slice(&self) -> &[u8] {
        self.head
    }

    fn consume(self) {
        self.source.data = self.tail;
        self.source.pos += self.head.len();
    }
}


//------------ ReaderSource --------------------------------------------------

/// A source reading from an `io::Read`.
///
/// The source only ever reads as much data as has been requested. Its
/// buffer grows with the data actually received, so requesting a large
/// fragment from a short reader doesn’t allocate up front.
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R> ReaderSource<R> {
    /// Creates a new source from a reader.
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new(), pos: 0 }
    }

    /// Converts the source back into the reader.
    ///
    /// Data already read from the reader but not yet consumed is lost.
    pub fn into_reader(self) -> R {
        self.reader
    }
}

impl<R: io::Read> Source for ReaderSource<R> {
    type Fragment<'f> = ReaderFragment<'f> where Self: 'f;
    type Error = io::Error;

    fn pos(&self) -> Pos {
        self.pos.into()
    }

    fn request<'f>(
        &'f mut self, len: usize
    ) -> Result<Self::Fragment<'f>, Self::Error> {
        if let Some(missing) = len.checked_sub(self.buf.len()) {
            if missing > 0 {
                (&mut self.reader).take(
                    u64::try_from(missing).unwrap_or(u64::MAX)
                ).read_to_end(&mut self.buf)?;
            }
        }
        let len = std::cmp::min(len, self.buf.len());
        Ok(ReaderFragment { buf: &mut self.buf, pos: &mut self.pos, len })
    }
}


//------------ ReaderFragment ------------------------------------------------

pub struct ReaderFragment<'f> {
    buf: &'f mut Vec<u8>,
    pos: &'f mut usize,
    len: usize,
}

impl<'f> Fragment<'f> for ReaderFragment<'f> {
    fn slice(&self) -> &[u8] {
        self.buf.get(..self.len).unwrap_or_default()
    }

    fn consume(self) {
        self.buf.drain(..self.len);
        *self.pos += self.len;
    }
}


//------------ Pos -----------------------------------------------------------

/// The logical position within a source.
///
/// Values of this type can only be used for diagnostics. They can not be used
/// to determine how far a source has been advanced since it was created. This
/// is why we used a newtype.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Pos(usize);

impl From<usize> for Pos {
    fn from(pos: usize) -> Pos {
        Pos(pos)
    }
}

impl ops::Add<usize> for Pos {
    type Output = Self;

    fn add(self, rhs: usize) -> Self {
        Pos(self.0 + rhs)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slice_source() {
        let mut source = SliceSource::new(b"\x01\x02\x03\x04");
        assert_eq!(source.take_u8().unwrap(), 1);
        assert_eq!(source.pos(), Pos::from(1));

        let frag = source.request(2).unwrap();
        assert_eq!(frag.slice(), b"\x02\x03");
        drop(frag);
        assert_eq!(source.remaining(), b"\x02\x03\x04");

        assert_eq!(source.take_bytes(2).unwrap().as_ref(), b"\x02\x03");
        assert!(source.take_bytes(2).is_err());
        assert_eq!(source.take_opt_u8().unwrap(), Some(4));
        assert_eq!(source.take_opt_u8().unwrap(), None);
        assert!(source.is_exhausted().unwrap());
    }

    #[test]
    fn reader_source() {
        let data: &[u8] = b"\x01\x02\x03";
        let mut source = ReaderSource::new(data);
        assert_eq!(source.request(2).unwrap().slice(), b"\x01\x02");
        assert_eq!(source.take_u8().unwrap(), 1);
        assert_eq!(source.request(1000).unwrap().slice(), b"\x02\x03");
        assert_eq!(
            source.take_bytes(1000).unwrap_err().into_format(),
            Some(FormatError::Truncated)
        );
        assert_eq!(source.take_bytes(2).unwrap().as_ref(), b"\x02\x03");
        assert!(source.is_exhausted().unwrap());
        assert_eq!(source.pos(), Pos::from(3));
    }
}
