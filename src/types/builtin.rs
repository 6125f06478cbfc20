//! The built-in leaf types.
//!
//! This is a private module. Its public items are re-exported by the parent.

use bytes::Bytes;
use crate::error::{FormatError, ValueError};
use crate::mode::Mode;
use crate::oid::Oid;
use crate::tag::Tag;
use crate::time;
use crate::value::Value;
use super::Family;


//------------ Builtin -------------------------------------------------------

/// One of the primitive types known to the crate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Builtin {
    Boolean,
    Integer,
    Null,
    OctetString,
    ObjectIdentifier,
    Utf8String,
    PrintableString,
    Ia5String,
    VisibleString,
    UtcTime,
    GeneralizedTime,
}

impl Builtin {
    pub fn family(self) -> Family {
        match self {
            Builtin::Boolean => Family::Boolean,
            Builtin::Integer => Family::Integer,
            Builtin::Null => Family::Null,
            Builtin::OctetString => Family::OctetString,
            Builtin::ObjectIdentifier => Family::ObjectIdentifier,
            Builtin::Utf8String => Family::Utf8String,
            Builtin::PrintableString => Family::PrintableString,
            Builtin::Ia5String => Family::Ia5String,
            Builtin::VisibleString => Family::VisibleString,
            Builtin::UtcTime => Family::UtcTime,
            Builtin::GeneralizedTime => Family::GeneralizedTime,
        }
    }

    /// Returns the universal tag of the type.
    pub fn tag(self) -> Tag {
        match self {
            Builtin::Boolean => Tag::BOOLEAN,
            Builtin::Integer => Tag::INTEGER,
            Builtin::Null => Tag::NULL,
            Builtin::OctetString => Tag::OCTET_STRING,
            Builtin::ObjectIdentifier => Tag::OID,
            Builtin::Utf8String => Tag::UTF8_STRING,
            Builtin::PrintableString => Tag::PRINTABLE_STRING,
            Builtin::Ia5String => Tag::IA5_STRING,
            Builtin::VisibleString => Tag::VISIBLE_STRING,
            Builtin::UtcTime => Tag::UTC_TIME,
            Builtin::GeneralizedTime => Tag::GENERALIZED_TIME,
        }
    }

    /// Checks that a value is of this type.
    ///
    /// Value references must have been resolved already.
    pub fn accept(self, value: &Value) -> Result<(), ValueError> {
        let res = match (self, value) {
            (Builtin::Boolean, Value::Boolean(_)) => Ok(()),
            (Builtin::Integer, Value::Integer(_)) => Ok(()),
            (Builtin::Null, Value::Null) => Ok(()),
            (Builtin::OctetString, Value::OctetString(_)) => Ok(()),
            (Builtin::ObjectIdentifier, Value::Oid(_)) => Ok(()),
            (_, Value::String(s)) if self.is_string() => {
                self.check_string(s, false)
            }
            _ => {
                return Err(ValueError::IllegalValue(format!(
                    "{} value expected, found {}", self.family(), value.kind()
                )))
            }
        };
        res.map_err(|reason| {
            ValueError::IllegalValue(format!(
                "invalid {} value: {}", self.family(), reason
            ))
        })
    }

    /// Returns whether the content may be split into segments.
    ///
    /// Values of these types may be encoded in constructed form as a
    /// sequence of primitive OCTET STRING segments.
    pub fn is_segmentable(self) -> bool {
        self == Builtin::OctetString || self.is_string()
    }

    fn is_string(self) -> bool {
        matches!(
            self,
            Builtin::Utf8String | Builtin::PrintableString
            | Builtin::Ia5String | Builtin::VisibleString
            | Builtin::UtcTime | Builtin::GeneralizedTime
        )
    }

    /// Checks the characters and, for time types, the syntax of a string.
    fn check_string(
        self, s: &str, restricted: bool
    ) -> Result<(), &'static str> {
        let valid = match self {
            Builtin::Utf8String => true,
            Builtin::PrintableString => s.bytes().all(is_printable),
            Builtin::Ia5String => s.is_ascii(),
            Builtin::VisibleString | Builtin::UtcTime
            | Builtin::GeneralizedTime => {
                s.bytes().all(|ch| (0x20..0x7F).contains(&ch))
            }
            _ => false,
        };
        if !valid {
            return Err("illegal characters")
        }
        match self {
            Builtin::UtcTime => time::check_utc_time(s, restricted),
            Builtin::GeneralizedTime => {
                time::check_generalized_time(s, restricted)
            }
            _ => Ok(())
        }
    }

    /// Appends the content octets for `value` to `target`.
    ///
    /// The value must have been accepted by the type.
    pub fn encode_content<M: Mode>(
        self, value: &Value, target: &mut Vec<u8>
    ) -> Result<(), FormatError> {
        match (self, value) {
            (Builtin::Boolean, Value::Boolean(value)) => {
                target.push(if *value { 0xFF } else { 0x00 })
            }
            (Builtin::Integer, Value::Integer(value)) => {
                encode_integer(*value, target)
            }
            (Builtin::Null, Value::Null) => { }
            (Builtin::OctetString, Value::OctetString(value)) => {
                target.extend_from_slice(value)
            }
            (Builtin::ObjectIdentifier, Value::Oid(value)) => {
                target.extend_from_slice(value.as_slice())
            }
            (_, Value::String(value)) if self.is_string() => {
                if M::IS_RESTRICTED
                    && self.check_string(value, true).is_err()
                {
                    return Err(FormatError::DerViolation(
                        "value not in canonical form"
                    ))
                }
                target.extend_from_slice(value.as_bytes())
            }
            _ => {
                return Err(ValueError::IllegalValue(format!(
                    "cannot encode {} as {}", value.kind(), self.family()
                )).into())
            }
        }
        Ok(())
    }

    /// Decodes a value from its content octets.
    pub fn decode_content<M: Mode>(
        self, content: &Bytes
    ) -> Result<Value, FormatError> {
        self.decode_content_inner::<M>(content).map_err(|reason| {
            FormatError::content(self.family(), reason)
        })
    }

    fn decode_content_inner<M: Mode>(
        self, content: &Bytes
    ) -> Result<Value, &'static str> {
        match self {
            Builtin::Boolean => {
                match content.as_ref() {
                    [0] => Ok(Value::Boolean(false)),
                    [0xFF] => Ok(Value::Boolean(true)),
                    [_] if M::IS_RESTRICTED => {
                        Err("non-canonical boolean")
                    }
                    [_] => Ok(Value::Boolean(true)),
                    _ => Err("invalid length")
                }
            }
            Builtin::Integer => decode_integer(content).map(Value::Integer),
            Builtin::Null => {
                if content.is_empty() {
                    Ok(Value::Null)
                }
                else {
                    Err("invalid length")
                }
            }
            Builtin::OctetString => Ok(Value::OctetString(content.clone())),
            Builtin::ObjectIdentifier => {
                Oid::from_content(content.clone()).map(Value::Oid)
            }
            _ => {
                let s = std::str::from_utf8(content).map_err(|_| {
                    "invalid encoding"
                })?;
                self.check_string(s, M::IS_RESTRICTED)?;
                Ok(Value::String(s.into()))
            }
        }
    }
}

fn is_printable(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || // A-Z a-z 0-9
    ch == b' ' || ch == b'\'' || ch == b'(' || ch == b')' ||
    ch == b'+' || ch == b',' || ch == b'-' || ch == b'.' ||
    ch == b'/' || ch == b':' || ch == b'=' || ch == b'?'
}

/// Appends the shortest two’s complement form of `value`.
fn encode_integer(value: i128, target: &mut Vec<u8>) {
    let octets = value.to_be_bytes();
    let mut start = 0;
    while start < octets.len() - 1 {
        let (Some(&first), Some(&second)) = (
            octets.get(start), octets.get(start + 1)
        ) else {
            break
        };
        if (first == 0 && second & 0x80 == 0)
            || (first == 0xFF && second & 0x80 != 0)
        {
            start += 1;
        }
        else {
            break
        }
    }
    target.extend_from_slice(octets.get(start..).unwrap_or_default());
}

/// Decodes an integer.
///
/// The integer must be encoded in the smallest possible number of octets
/// under all encoding rules. That is, the first nine bits of a multi-octet
/// integer must not all be the same.
fn decode_integer(content: &[u8]) -> Result<i128, &'static str> {
    match (content.first(), content.get(1).map(|x| x & 0x80 != 0)) {
        (None, _) => return Err("empty integer"),
        (Some(0), Some(false)) | (Some(0xFF), Some(true)) => {
            return Err("non-minimal integer")
        }
        _ => { }
    }
    if content.len() > 16 {
        return Err("integer too large")
    }
    let mut res: i128 = match content.first() {
        Some(first) if first & 0x80 != 0 => -1,
        _ => 0,
    };
    for &octet in content {
        res = (res << 8) | i128::from(octet);
    }
    Ok(res)
}


//============ Tests =========================================================
