//! Encoding values of a schema.
//!
//! This is a private module. Its public items are re-exported by the parent.

use std::convert::Infallible;
use std::marker::PhantomData;
use tracing::trace;
use crate::captured::Captured;
use crate::error::{FormatError, SchemaError, ValueError};
use crate::mode::{CER_SEGMENT_LEN, Mode};
use crate::tag::{Tag, TagMethod};
use crate::types::{Builtin, CollectionType, Schema, TypeId, TypeKind};
use crate::value::Value;
use super::error::EncodeError;
use super::header::{write_end_of_contents, write_header};
use super::target::Target;


//------------ Encoder -------------------------------------------------------

/// Encodes values of a schema’s types under the rules of mode `M`.
///
/// Constructed values are preferably written with a definite length. For
/// this, the encoder needs to buffer the content of each constructed value
/// before it can write its header. Whether it is allowed to do so is
/// decided when the encoder is created. Without buffering, or if the rules
/// demand it as CER does, constructed values are written with indefinite
/// length. Since DER doesn’t allow indefinite length values, a streaming
/// encoder will fail for any DER value containing a constructed value.
///
/// Values are optimized before encoding, so components equal to their
/// default value are never written.
pub struct Encoder<'s, M> {
    schema: &'s Schema,
    buffering: bool,
    marker: PhantomData<M>,
}

/// The content of a constructed value.
enum Content<'a> {
    /// The explicitly tagged value of a type.
    Explicit(TypeId, &'a Value),

    /// The components of a SEQUENCE, SET, or *-OF value.
    Collection(&'a CollectionType, &'a Value),

    /// The segments of a string.
    Segments(&'a [u8]),
}

impl<'s, M: Mode> Encoder<'s, M> {
    /// Creates an encoder that buffers constructed content.
    pub fn new(schema: &'s Schema) -> Self {
        Encoder { schema, buffering: true, marker: PhantomData }
    }

    /// Creates an encoder that writes everything straight to the target.
    pub fn streaming(schema: &'s Schema) -> Self {
        Encoder { schema, buffering: false, marker: PhantomData }
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Encodes a value of the given type into a target.
    ///
    /// If encoding fails, the target may already have received parts of
    /// the encoding.
    pub fn encode<T: Target>(
        &self, id: TypeId, value: &Value, target: &mut T
    ) -> Result<(), EncodeError<T::Error>> {
        let value = self.schema.optimize(id, value)?;
        self.encode_value(id, &value, None, target)
    }

    /// Encodes a value of the given type into a new vec.
    pub fn encode_to_vec(
        &self, id: TypeId, value: &Value
    ) -> Result<Vec<u8>, EncodeError<Infallible>> {
        let mut res = Vec::new();
        self.encode(id, value, &mut res)?;
        Ok(res)
    }

    /// Encodes a value, using `implicit` as its tag if given.
    fn encode_value<T: Target>(
        &self,
        id: TypeId,
        value: &Value,
        implicit: Option<Tag>,
        target: &mut T,
    ) -> Result<(), EncodeError<T::Error>> {
        match *self.schema.get(id).kind() {
            TypeKind::Builtin(builtin) => {
                self.encode_builtin(builtin, value, implicit, target)
            }
            TypeKind::Tagged(ref tagged) => {
                let inner = self.schema.resolve(tagged.inner())?;
                let tag = implicit.unwrap_or(tagged.tag());
                match tagged.method() {
                    TagMethod::Implicit => {
                        self.encode_value(inner, value, Some(tag), target)
                    }
                    TagMethod::Explicit => {
                        self.encode_constructed(
                            tag, Content::Explicit(inner, value), target
                        )
                    }
                }
            }
            TypeKind::Defined(ref defined) => {
                let defined = self.schema.resolve(defined)?;
                self.encode_value(defined, value, implicit, target)
            }
            TypeKind::Collection(ref coll) => {
                match coll.kind().tag() {
                    Some(tag) => {
                        self.encode_constructed(
                            implicit.unwrap_or(tag),
                            Content::Collection(coll, value),
                            target
                        )
                    }
                    None if implicit.is_some() => {
                        Err(ValueError::IllegalValue(
                            "CHOICE cannot be tagged implicitly".into()
                        ).into())
                    }
                    None => self.write_components(coll, value, target)
                }
            }
        }
    }

    fn encode_builtin<T: Target>(
        &self,
        builtin: Builtin,
        value: &Value,
        implicit: Option<Tag>,
        target: &mut T,
    ) -> Result<(), EncodeError<T::Error>> {
        let tag = implicit.unwrap_or(builtin.tag());
        let mut content = Vec::new();
        builtin.encode_content::<M>(value, &mut content)?;

        // CER demands long strings to be broken up.
        if !M::ALLOW_DEFINITE_CONSTRUCTED
            && builtin.is_segmentable()
            && content.len() > CER_SEGMENT_LEN
        {
            return self.encode_constructed(
                tag, Content::Segments(&content), target
            )
        }
        write_header::<M, _>(
            target, tag, false, Some(content.len())
        ).map_err(EncodeError::Target)?;
        target.write_all(&content).map_err(EncodeError::Target)
    }

    /// Writes a constructed value.
    fn encode_constructed<T: Target>(
        &self, tag: Tag, content: Content, target: &mut T
    ) -> Result<(), EncodeError<T::Error>> {
        if self.buffering && M::ALLOW_DEFINITE_CONSTRUCTED {
            let mut buf = Vec::new();
            self.write_content(&content, &mut buf).map_err(
                EncodeError::convert
            )?;
            write_header::<M, _>(
                target, tag, true, Some(buf.len())
            ).map_err(EncodeError::Target)?;
            target.write_all(&buf).map_err(EncodeError::Target)
        }
        else if M::ALLOW_INDEFINITE_CONSTRUCTED {
            trace!(%tag, rules = M::NAME, "writing indefinite length value");
            write_header::<M, _>(
                target, tag, true, None
            ).map_err(EncodeError::Target)?;
            self.write_content(&content, target)?;
            write_end_of_contents(target).map_err(EncodeError::Target)
        }
        else {
            Err(FormatError::DerViolation(
                "definite length encoding requires buffering"
            ).into())
        }
    }

    fn write_content<T: Target>(
        &self, content: &Content, target: &mut T
    ) -> Result<(), EncodeError<T::Error>> {
        match *content {
            Content::Explicit(id, value) => {
                self.encode_value(id, value, None, target)
            }
            Content::Collection(coll, value) => {
                self.write_components(coll, value, target)
            }
            Content::Segments(data) => {
                for segment in data.chunks(CER_SEGMENT_LEN) {
                    write_header::<M, _>(
                        target, Tag::OCTET_STRING, false, Some(segment.len())
                    ).map_err(EncodeError::Target)?;
                    target.write_all(segment).map_err(EncodeError::Target)?;
                }
                Ok(())
            }
        }
    }

    /// Writes the components of a collection value in order.
    ///
    /// The value has been optimized, so its entries are in index order.
    fn write_components<T: Target>(
        &self, coll: &CollectionType, value: &Value, target: &mut T
    ) -> Result<(), EncodeError<T::Error>> {
        let layout = coll.layout().ok_or_else(|| {
            SchemaError::NotCompiled(coll.kind().family().to_string())
        })?;
        if coll.kind().is_list() {
            let element = layout.components().first().ok_or_else(|| {
                ValueError::IllegalValue("list type without element".into())
            })?;
            let items = value.as_list().ok_or_else(|| {
                ValueError::IllegalValue(format!(
                    "list expected, found {}", value.kind()
                ))
            })?;
            for item in items {
                self.encode_value(element.type_id(), item, None, target)?;
            }
            return Ok(())
        }

        let values = value.as_collection().ok_or_else(|| {
            ValueError::IllegalValue(format!(
                "collection expected, found {}", value.kind()
            ))
        })?;
        for entry in values {
            match layout.component(entry.name()) {
                Some(component) => {
                    self.encode_value(
                        component.type_id(), entry.value(), None, target
                    )?;
                }
                None => self.write_unknown(entry.value(), target)?,
            }
        }
        Ok(())
    }

    /// Writes a component not known to the schema.
    ///
    /// Only captured values can be written.
    fn write_unknown<T: Target>(
        &self, value: &Value, target: &mut T
    ) -> Result<(), EncodeError<T::Error>> {
        let Value::Opaque(captured) = value else {
            return Err(ValueError::IllegalValue(format!(
                "cannot encode unknown component of kind {}", value.kind()
            )).into())
        };
        if M::IS_RESTRICTED
            && Captured::from_bytes::<M>(captured.clone().into_bytes()).is_err()
        {
            return Err(FormatError::DerViolation(
                "captured value violates encoding rules"
            ).into())
        }
        captured.write_encoded(target).map_err(EncodeError::Target)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::io;
    use bytes::Bytes;
    use crate::encode::IoTarget;
    use crate::mode::{Ber, Cer, Der};
    use crate::types::{CollectionType, ComponentDecl, Type};
    use crate::value::ValueCollection;
    use super::*;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.define("Int", Builtin::Integer).unwrap();
        schema.define("Bool", Builtin::Boolean).unwrap();
        schema.define("Octets", Builtin::OctetString).unwrap();
        schema
    }

    fn compile(schema: &mut Schema, ty: impl Into<Type>) -> TypeId {
        let id = schema.add(ty);
        schema.compile(id).unwrap();
        id
    }

    #[test]
    fn primitives() {
        let mut schema = schema();
        let int = schema.lookup("Int").unwrap();
        schema.compile(int).unwrap();
        assert_eq!(
            Encoder::<Der>::new(&schema).encode_to_vec(
                int, &Value::Integer(300)
            ).unwrap(),
            b"\x02\x02\x01\x2c"
        );
        assert!(matches!(
            Encoder::<Der>::new(&schema).encode_to_vec(int, &Value::Null),
            Err(EncodeError::Value(_))
        ));
    }

    #[test]
    fn tagging() {
        let mut schema = schema();
        let explicit = compile(&mut schema, Type::tagged(
            Tag::ctx(1), TagMethod::Explicit, "Int"
        ));
        let implicit = compile(&mut schema, Type::tagged(
            Tag::application(2), TagMethod::Implicit, "Int"
        ));
        let outer = compile(&mut schema, Type::tagged(
            Tag::ctx(3), TagMethod::Implicit, explicit
        ));
        let encoder = Encoder::<Der>::new(&schema);
        let five = Value::Integer(5);
        assert_eq!(
            encoder.encode_to_vec(explicit, &five).unwrap(),
            b"\xa1\x03\x02\x01\x05"
        );
        assert_eq!(
            encoder.encode_to_vec(implicit, &five).unwrap(),
            b"\x42\x01\x05"
        );
        assert_eq!(
            encoder.encode_to_vec(outer, &five).unwrap(),
            b"\xa3\x03\x02\x01\x05"
        );
    }

    #[test]
    fn sequences_under_all_rules() {
        let mut schema = schema();
        let seq = compile(&mut schema, CollectionType::sequence()
            .component(ComponentDecl::new("a", "Int").default(0i64))
            .component(ComponentDecl::new("b", "Bool"))
        );
        let value = Value::Collection(
            ValueCollection::new().with("a", 0i64).with("b", true)
        );
        assert_eq!(
            Encoder::<Der>::new(&schema).encode_to_vec(seq, &value).unwrap(),
            b"\x30\x03\x01\x01\xff"
        );
        assert_eq!(
            Encoder::<Cer>::new(&schema).encode_to_vec(seq, &value).unwrap(),
            b"\x30\x80\x01\x01\xff\x00\x00"
        );
        assert_eq!(
            Encoder::<Ber>::streaming(&schema).encode_to_vec(
                seq, &value
            ).unwrap(),
            b"\x30\x80\x01\x01\xff\x00\x00"
        );
        assert!(matches!(
            Encoder::<Der>::streaming(&schema).encode_to_vec(seq, &value),
            Err(EncodeError::Format(FormatError::DerViolation(_)))
        ));
    }

    struct BrokenWriter;

    impl io::Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn streaming_into_writer() {
        let mut schema = schema();
        let list = compile(&mut schema, CollectionType::sequence_of("Int"));
        let value = Value::List(vec![Value::Integer(1), Value::Integer(2)]);

        let mut target = IoTarget::new(io::Cursor::new(Vec::new()));
        Encoder::<Ber>::streaming(&schema).encode(
            list, &value, &mut target
        ).unwrap();
        assert_eq!(
            target.into_writer().into_inner(),
            b"\x30\x80\x02\x01\x01\x02\x01\x02\x00\x00"
        );

        let mut target = IoTarget::new(BrokenWriter);
        let err = Encoder::<Ber>::streaming(&schema).encode(
            list, &value, &mut target
        ).unwrap_err();
        assert!(matches!(
            err, EncodeError::Target(ref err)
                if err.kind() == io::ErrorKind::BrokenPipe
        ));
    }

    #[test]
    fn sets_are_written_in_index_order() {
        let mut schema = schema();
        let set = compile(&mut schema, CollectionType::set()
            .component(ComponentDecl::new("a", "Int"))
            .component(ComponentDecl::new("b", "Bool"))
        );
        let value = Value::Collection(
            ValueCollection::new().with("b", false).with("a", 1i64)
        );
        assert_eq!(
            Encoder::<Der>::new(&schema).encode_to_vec(set, &value).unwrap(),
            b"\x31\x06\x02\x01\x01\x01\x01\x00"
        );
    }

    #[test]
    fn choices_and_lists() {
        let mut schema = schema();
        let choice = compile(&mut schema, CollectionType::choice()
            .component(ComponentDecl::new("i", "Int"))
            .component(ComponentDecl::new("b", "Bool"))
        );
        let list = compile(&mut schema, CollectionType::set_of(choice));
        let value = Value::List(vec![
            Value::choice("b", Value::Boolean(true)),
            Value::choice("i", Value::Integer(-1)),
        ]);
        assert_eq!(
            Encoder::<Der>::new(&schema).encode_to_vec(list, &value).unwrap(),
            b"\x31\x06\x01\x01\xff\x02\x01\xff"
        );
    }

    #[test]
    fn unknown_components() {
        let mut schema = schema();
        let seq = compile(&mut schema, CollectionType::sequence()
            .component(ComponentDecl::new("a", "Int"))
            .extension(ComponentDecl::new("x", "Int").optional())
        );
        let captured = Captured::from_bytes::<Der>(
            Bytes::from_static(b"\x81\x01\x07")
        ).unwrap();
        let value = Value::Collection(
            ValueCollection::new()
                .with("a", 1i64)
                .with("x", 2i64)
                .with("[1]", Value::Opaque(captured))
        );
        assert_eq!(
            Encoder::<Der>::new(&schema).encode_to_vec(seq, &value).unwrap(),
            b"\x30\x09\x02\x01\x01\x02\x01\x02\x81\x01\x07"
        );

        let value = Value::Collection(
            ValueCollection::new()
                .with("a", 1i64)
                .with("x", 2i64)
                .with("y", 3i64)
        );
        assert!(matches!(
            Encoder::<Der>::new(&schema).encode_to_vec(seq, &value),
            Err(EncodeError::Value(ValueError::IllegalValue(_)))
        ));
    }

    #[test]
    fn cer_segments_long_strings() {
        let mut schema = schema();
        let octets = schema.lookup("Octets").unwrap();
        schema.compile(octets).unwrap();
        let value = Value::OctetString(Bytes::from(vec![0xAA; 1500]));

        let encoded = Encoder::<Cer>::new(&schema).encode_to_vec(
            octets, &value
        ).unwrap();
        assert_eq!(encoded.len(), 2 + 4 + 1000 + 4 + 500 + 2);
        assert_eq!(encoded.get(..6), Some(&b"\x24\x80\x04\x82\x03\xe8"[..]));
        assert_eq!(
            encoded.get(1006..1010), Some(&b"\x04\x82\x01\xf4"[..])
        );
        assert!(encoded.ends_with(b"\x00\x00"));

        let encoded = Encoder::<Der>::new(&schema).encode_to_vec(
            octets, &value
        ).unwrap();
        assert_eq!(encoded.get(..4), Some(&b"\x04\x82\x05\xdc"[..]));
    }
}
