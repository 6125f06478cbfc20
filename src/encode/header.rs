//! Writing identifier and length octets.
//!
//! This is a private module. Its public items are re-exported by the parent.

use crate::length::Length;
use crate::mode::Mode;
use crate::tag::{Ident, Tag};
use super::target::Target;


/// Writes the identifier and length octets of a value.
///
/// If `len` is `None`, an indefinite length is written. The caller has to
/// make sure that this is allowed under the rules of mode `M`.
pub fn write_header<M: Mode, T: Target>(
    target: &mut T, tag: Tag, constructed: bool, len: Option<usize>
) -> Result<(), T::Error> {
    Ident::from_tag(tag, constructed).write_encoded(target)?;
    Length::<M>::new(len).write_encoded(target)
}

/// Writes the end-of-contents marker closing an indefinite length value.
pub fn write_end_of_contents<T: Target>(
    target: &mut T
) -> Result<(), T::Error> {
    target.write_all(&[0, 0])
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::mode::{Ber, Der};
    use super::*;

    #[test]
    fn headers() {
        let mut target = Vec::new();
        write_header::<Der, _>(&mut target, Tag::SEQUENCE, true, Some(3))
            .unwrap();
        assert_eq!(target, b"\x30\x03");

        let mut target = Vec::new();
        write_header::<Ber, _>(&mut target, Tag::ctx(31), true, None).unwrap();
        write_end_of_contents(&mut target).unwrap();
        assert_eq!(target, b"\xbf\x1f\x80\x00\x00");

        let mut target = Vec::new();
        write_header::<Der, _>(
            &mut target, Tag::OCTET_STRING, false, Some(1000)
        ).unwrap();
        assert_eq!(target, b"\x04\x82\x03\xe8");
    }
}
