//! Schema-driven handling of data in the ASN.1 Basic Encoding Rules.
//!
//! This crate describes ASN.1 types at runtime and uses these descriptions
//! to check values and to encode and decode them in BER, CER, or DER.
//!
//! Types are added to a [`Schema`] and compiled there before use. The
//! compiler resolves references between types, flattens the components of
//! SEQUENCE, SET, and CHOICE types including their extension additions,
//! assigns automatic tags, and makes sure that the components of a type
//! can be told apart by their tags.
//!
//! Values are represented by the dynamic [`Value`] type. A compiled type
//! can check a value via [`Schema::accept`] and turn it into its canonical
//! form via [`Schema::optimize`]. Values are encoded with an
//! [`Encoder`][encode::Encoder] and decoded with a
//! [`Decoder`][decode::Decoder]. Both are generic over the encoding rules
//! to use, which are picked through one of the marker types [`Ber`],
//! [`Cer`], and [`Der`].
//!
//! Components of extensible types that are unknown to the schema are kept
//! as opaque values when decoding and written back unchanged when
//! encoding.

pub use self::captured::Captured;
pub use self::constraint::{Constraint, Size, ValueRange};
pub use self::error::{FormatError, SchemaError, ValueError};
pub use self::length::Length;
pub use self::mode::{Ber, Cer, Der, Mode};
pub use self::oid::Oid;
pub use self::scope::Scope;
pub use self::tag::{Class, Ident, Tag, TagMethod};
pub use self::types::{
    Builtin, CollectionKind, CollectionType, ComponentDecl, Schema, Type,
    TypeId, TypeRef,
};
pub use self::value::{NamedValue, Value, ValueCollection};

pub mod decode;
pub mod encode;
pub mod types;

pub mod captured;
pub mod constraint;
pub mod error;
pub mod mode;
pub mod oid;
pub mod scope;
pub mod tag;
pub mod time;
pub mod value;

mod length;
