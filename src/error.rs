//! The error taxonomy.
//!
//! Errors fall into three groups. A [`SchemaError`] is raised while a type
//! is compiled and renders the type unusable. A [`ValueError`] is raised
//! while a value is validated against or optimized for a type. A
//! [`FormatError`] is raised while encoding or decoding.

use thiserror::Error;
use crate::tag::Tag;
use crate::types::Family;


//------------ SchemaError ---------------------------------------------------

/// A type declaration is not legal.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SchemaError {
    #[error("duplicate component name '{0}'")]
    DuplicateName(String),

    #[error("extension version {found} must be greater than {previous}")]
    VersionOrder { previous: u32, found: u32 },

    #[error(
        "extension version {found} not allowed next to unversioned \
         extension additions"
    )]
    ProhibitedVersion { found: u32 },

    #[error("components '{first}' and '{second}' share the tag {tag}")]
    TagAmbiguity { first: String, second: String, tag: Tag },

    #[error("type '{0}' is defined in terms of itself")]
    CyclicDefinition(String),

    #[error("unresolved type reference '{0}'")]
    UnresolvedType(String),

    #[error("type '{0}' failed to compile earlier")]
    Failed(String),

    #[error("type '{0}' has not been compiled")]
    NotCompiled(String),

    #[error("COMPONENTS OF references '{0}' which is not a SEQUENCE or SET")]
    IllegalComponentsOf(String),

    #[error("invalid default for component '{name}': {reason}")]
    InvalidDefault { name: String, reason: String },
}


//------------ ValueError ----------------------------------------------------

/// A value does not conform to its type.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ValueError {
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    #[error("component '{0}' is out of order or repeated")]
    Order(String),

    #[error("missing required component '{name}' at index {index}")]
    MissingRequired { name: String, index: usize },

    #[error("empty value where components are required")]
    EmptyValue,

    #[error("illegal value: {0}")]
    IllegalValue(String),

    #[error("unresolved value reference '{0}'")]
    UnresolvedValue(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}


//------------ FormatError ---------------------------------------------------

/// Encoded data is malformed or a value can’t be encoded.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum FormatError {
    #[error("expected tag {expected}, found {found}")]
    UnexpectedTag { expected: Tag, found: Tag },

    #[error("unexpected element with tag {0}")]
    UnknownTag(Tag),

    #[error("tag {tag} has wrong encoding method")]
    MethodMismatch { tag: Tag, constructed: bool },

    #[error("unexpected end of data")]
    Truncated,

    #[error("missing end-of-contents marker")]
    MissingEndOfContents,

    #[error("primitive value with indefinite length")]
    IndefinitePrimitive,

    #[error("encoding rules violated: {0}")]
    DerViolation(&'static str),

    #[error("illegal length: {0}")]
    IllegalLength(&'static str),

    #[error("illegal tag: {0}")]
    IllegalTag(&'static str),

    #[error("nesting depth exceeded")]
    DepthExceeded,

    #[error("trailing data")]
    TrailingData,

    #[error("invalid {family} content: {reason}")]
    InvalidContent { family: Family, reason: &'static str },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl FormatError {
    pub(crate) fn content(family: Family, reason: &'static str) -> Self {
        FormatError::InvalidContent { family, reason }
    }
}


//============ Tests =========================================================
