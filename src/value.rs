//! Runtime values.
//!
//! Values are plain data trees. They carry no reference to the type they
//! are an instance of. Whether a value is valid can only be determined by
//! checking it against a compiled type via [`Schema::accept`].
//!
//! [`Schema::accept`]: crate::types::Schema::accept

use std::fmt;
use bytes::Bytes;
use crate::captured::Captured;
use crate::oid::Oid;


//------------ Value ---------------------------------------------------------

/// A value of some ASN.1 type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    /// A BOOLEAN value.
    Boolean(bool),

    /// An INTEGER value.
    ///
    /// Only integers fitting an `i128` are supported.
    Integer(i128),

    /// The NULL value.
    Null,

    /// An OCTET STRING value.
    OctetString(Bytes),

    /// An OBJECT IDENTIFIER value.
    Oid(Oid),

    /// A value of any of the string or time types.
    String(String),

    /// A value of a SEQUENCE, SET, or CHOICE type.
    ///
    /// A CHOICE value is a collection with exactly one entry naming the
    /// chosen alternative.
    Collection(ValueCollection),

    /// A value of a SEQUENCE OF or SET OF type.
    List(Vec<Value>),

    /// An encoded value not known to the schema.
    Opaque(Captured),

    /// A reference to a value defined in the schema.
    Ref(String),
}

impl Value {
    /// Creates a CHOICE value for the given alternative.
    pub fn choice(name: impl Into<String>, value: Value) -> Self {
        Value::Collection(ValueCollection::new().with(name, value))
    }

    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Returns the value as a collection if it is one.
    pub fn as_collection(&self) -> Option<&ValueCollection> {
        match self {
            Value::Collection(coll) => Some(coll),
            _ => None
        }
    }

    /// Returns the value as a list if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None
        }
    }

    /// Returns a short description of the kind of value for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Null => "null",
            Value::OctetString(_) => "octet string",
            Value::Oid(_) => "object identifier",
            Value::String(_) => "string",
            Value::Collection(_) => "collection",
            Value::List(_) => "list",
            Value::Opaque(_) => "opaque value",
            Value::Ref(_) => "value reference",
        }
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Value::Boolean(src)
    }
}

impl From<i128> for Value {
    fn from(src: i128) -> Self {
        Value::Integer(src)
    }
}

impl From<i64> for Value {
    fn from(src: i64) -> Self {
        Value::Integer(src.into())
    }
}

impl From<Oid> for Value {
    fn from(src: Oid) -> Self {
        Value::Oid(src)
    }
}

impl From<ValueCollection> for Value {
    fn from(src: ValueCollection) -> Self {
        Value::Collection(src)
    }
}

impl From<Vec<Value>> for Value {
    fn from(src: Vec<Value>) -> Self {
        Value::List(src)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::Integer(value) => write!(f, "{}", value),
            Value::Null => f.write_str("NULL"),
            Value::OctetString(value) => {
                f.write_str("'")?;
                for octet in value.as_ref() {
                    write!(f, "{:02X}", octet)?;
                }
                f.write_str("'H")
            }
            Value::Oid(value) => write!(f, "{{ {} }}", value),
            Value::String(value) => write!(f, "{:?}", value),
            Value::Collection(value) => write!(f, "{}", value),
            Value::List(value) => {
                f.write_str("{ ")?;
                for (idx, item) in value.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(" }")
            }
            Value::Opaque(value) => write!(f, "{:?}", value),
            Value::Ref(name) => f.write_str(name),
        }
    }
}


//------------ NamedValue ----------------------------------------------------

/// A value together with the name of the component it is for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NamedValue {
    name: String,
    value: Value,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        NamedValue { name: name.into(), value: value.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.value)
    }
}


//------------ ValueCollection -----------------------------------------------

/// The value of a SEQUENCE, SET, or CHOICE type.
///
/// The collection keeps its entries in the order they were added. This
/// order is what validation checks against the declared order of the
/// components. Values resulting from decoding keep the order of the
/// elements in the encoded data.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValueCollection {
    items: Vec<NamedValue>,
}

impl ValueCollection {
    /// Creates a new, empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry and returns the collection.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(NamedValue::new(name, value));
        self
    }

    /// Appends an entry to the end of the collection.
    pub fn push(&mut self, item: NamedValue) {
        self.items.push(item)
    }

    /// Returns the value of the first entry with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.items.iter().find(|item| item.name == name).map(|item| {
            &item.value
        })
    }

    /// Returns an iterator over the entries.
    pub fn iter(&self) -> std::slice::Iter<NamedValue> {
        self.items.iter()
    }

    /// Returns the entries as a slice.
    pub fn as_slice(&self) -> &[NamedValue] {
        &self.items
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<NamedValue> for ValueCollection {
    fn from_iter<I: IntoIterator<Item = NamedValue>>(iter: I) -> Self {
        ValueCollection { items: iter.into_iter().collect() }
    }
}

impl IntoIterator for ValueCollection {
    type Item = NamedValue;
    type IntoIter = std::vec::IntoIter<NamedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueCollection {
    type Item = &'a NamedValue;
    type IntoIter = std::slice::Iter<'a, NamedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for ValueCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (idx, item) in self.items.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, " {} {}", item.name, item.value)?;
        }
        f.write_str(" }")
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collection() {
        let coll = ValueCollection::new()
            .with("a", 1i64)
            .with("b", Value::string("x"))
            .with("a", 2i64);
        assert_eq!(coll.len(), 3);
        assert_eq!(coll.get("a"), Some(&Value::Integer(1)));
        assert_eq!(coll.get("c"), None);
        assert_eq!(coll.to_string(), "{ a 1, b \"x\", a 2 }");

        let names: Vec<_> = coll.iter().map(NamedValue::name).collect();
        assert_eq!(names, ["a", "b", "a"]);
    }

    #[test]
    fn display() {
        assert_eq!(
            Value::OctetString(Bytes::from_static(b"\x0a\xff")).to_string(),
            "'0AFF'H"
        );
        assert_eq!(
            Value::List(vec![true.into(), Value::Null]).to_string(),
            "{ TRUE, NULL }"
        );
        assert_eq!(
            Value::choice("x", Value::Integer(3)).to_string(), "{ x 3 }"
        );
    }
}
