//! The encoding rules.
//!
//! Rules are selected through marker types rather than a runtime value so
//! that checks specific to one set of rules can be optimized away after
//! monomorphisation.

use std::fmt;


/// The maximum number of content octets of a primitive string under CER.
///
/// Longer strings are broken up into segments of this size.
pub(crate) const CER_SEGMENT_LEN: usize = 1000;


//------------ Ber -----------------------------------------------------------

/// Basic Encoding Rules.
///
/// These are the most flexible rules, allowing alternative encodings for
/// some types as well as indefinite length values.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ber;


//------------ Cer -----------------------------------------------------------

/// Canonical Encoding Rules.
///
/// These rules always employ indefinite length encoding for constructed
/// values and the shortest possible form for primitive values.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Cer;


//------------ Der -----------------------------------------------------------

/// Distinguished Encoding Rules.
///
/// These rules always employ definite length values and require the
/// shortest possible encoding. Components equal to their default value must
/// be left out.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Der;


//------------ Mode ----------------------------------------------------------

/// One of the encoding rules.
pub trait Mode: Copy + fmt::Debug + Eq + Send + Sync + 'static {
    /// A human readable name of the rules.
    const NAME: &'static str;

    /// Is this mode CER or DER?
    const IS_RESTRICTED: bool;

    /// Does this mode allow definite-length constructed values?
    const ALLOW_DEFINITE_CONSTRUCTED: bool;

    /// Does this mode allow indefinite length constructed values?
    const ALLOW_INDEFINITE_CONSTRUCTED: bool;
}

impl Mode for Ber {
    const NAME: &'static str = "BER";
    const IS_RESTRICTED: bool = false;
    const ALLOW_DEFINITE_CONSTRUCTED: bool = true;
    const ALLOW_INDEFINITE_CONSTRUCTED: bool = true;
}

impl Mode for Cer {
    const NAME: &'static str = "CER";
    const IS_RESTRICTED: bool = true;
    const ALLOW_DEFINITE_CONSTRUCTED: bool = false;
    const ALLOW_INDEFINITE_CONSTRUCTED: bool = true;
}

impl Mode for Der {
    const NAME: &'static str = "DER";
    const IS_RESTRICTED: bool = true;
    const ALLOW_DEFINITE_CONSTRUCTED: bool = true;
    const ALLOW_INDEFINITE_CONSTRUCTED: bool = false;
}
