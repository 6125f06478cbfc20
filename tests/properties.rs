//! Properties that hold for all compiled types.

use std::borrow::Cow;
use bertype::{
    Ber, Builtin, Cer, CollectionType, ComponentDecl, Der, FormatError, Mode,
    Schema, SchemaError, Tag, TagMethod, TypeId, Value, ValueCollection,
    ValueError,
};
use bertype::decode::{Decoder, ReaderSource};
use bertype::encode::{EncodeError, Encoder};
use bertype::types::TypeKind;


fn schema() -> Schema {
    let mut schema = Schema::new();
    schema.define("Int", Builtin::Integer).unwrap();
    schema.define("Bool", Builtin::Boolean).unwrap();
    schema.define("Octets", Builtin::OctetString).unwrap();
    schema.define("Text", Builtin::Utf8String).unwrap();
    schema.define("Oid", Builtin::ObjectIdentifier).unwrap();
    schema
}

fn compile(schema: &mut Schema, ty: CollectionType) -> TypeId {
    let id = schema.add(ty);
    schema.compile(id).unwrap();
    id
}

fn values(entries: &[(&str, Value)]) -> Value {
    let mut res = ValueCollection::new();
    for (name, value) in entries {
        res = res.with(*name, value.clone());
    }
    Value::Collection(res)
}

/// Defines a record type that touches most features.
fn record(schema: &mut Schema) -> TypeId {
    let alt = schema.define("Alt", CollectionType::choice()
        .component(ComponentDecl::new("number", "Int"))
        .component(ComponentDecl::new("text", "Text"))
    ).unwrap();
    let attrs = schema.define("Attrs", CollectionType::set()
        .component(ComponentDecl::new("flag", "Bool"))
        .component(ComponentDecl::new("data", "Octets").optional())
    ).unwrap();
    let numbers = schema.add(CollectionType::sequence_of("Int"));
    compile(schema, CollectionType::sequence().automatic_tags()
        .component(ComponentDecl::new("id", "Int"))
        .component(ComponentDecl::new("alt", alt))
        .component(ComponentDecl::new("attrs", attrs).optional())
        .component(ComponentDecl::new("numbers", numbers))
        .component(ComponentDecl::new("level", "Int").default(1i64))
        .extension(ComponentDecl::new("note", "Text").optional())
        .trailing(ComponentDecl::new("kind", "Oid").optional())
    )
}

fn record_value() -> Value {
    values(&[
        ("id", Value::Integer(-300)),
        ("alt", Value::choice("text", Value::string("hello"))),
        ("attrs", values(&[
            ("data", Value::OctetString(vec![1u8; 1200].into())),
            ("flag", Value::Boolean(true)),
        ])),
        ("numbers", Value::List(vec![
            Value::Integer(3), Value::Integer(1), Value::Integer(2)
        ])),
        ("level", Value::Integer(1)),
        ("note", Value::string("some note")),
    ])
}

#[test]
fn optimizing_is_idempotent() {
    let mut schema = schema();
    let id = record(&mut schema);

    let value = record_value();
    let optimized = schema.optimize(id, &value).unwrap();
    assert!(matches!(optimized, Cow::Owned(_)));
    match schema.optimize(id, &optimized).unwrap() {
        Cow::Borrowed(res) => assert!(std::ptr::eq(res, optimized.as_ref())),
        Cow::Owned(_) => panic!("optimized value changed again"),
    }
}

#[test]
fn component_indexes_follow_declaration_order() {
    let mut schema = schema();
    let id = compile(&mut schema, CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .extension_group(None, [
            ComponentDecl::new("x", "Bool").optional(),
            ComponentDecl::new("y", "Text").optional(),
        ])
        .extension(ComponentDecl::new("z", "Octets").optional())
        .trailing(ComponentDecl::new("b", "Oid"))
        .component(ComponentDecl::new("c", "Text"))
    );
    let layout = schema.layout(id).unwrap();
    let names: Vec<_> = layout.components().iter().map(|item| {
        item.name()
    }).collect();
    assert_eq!(names, ["a", "c", "x", "y", "z", "b"]);
    for (pos, item) in layout.components().iter().enumerate() {
        assert_eq!(item.index(), pos);
    }
    let versions: Vec<_> = layout.components().iter().map(|item| {
        item.version()
    }).collect();
    assert_eq!(versions, [1, 1, 2, 2, 3, 1]);
    assert_eq!(layout.extension_range(), Some((2, 4)));
}

#[test]
fn extension_versions_increase() {
    let mut schema = schema();
    let good = schema.add(CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .extension_group(Some(2), [ComponentDecl::new("x", "Int")])
        .extension_group(Some(5), [ComponentDecl::new("y", "Int")])
    );
    assert_eq!(schema.compile(good), Ok(()));

    let unordered = schema.add(CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .extension_group(Some(3), [ComponentDecl::new("x", "Int")])
        .extension_group(Some(2), [ComponentDecl::new("y", "Int")])
    );
    assert!(matches!(
        schema.compile(unordered),
        Err(SchemaError::VersionOrder { found: 2, .. })
    ));

    let mixed = schema.add(CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .extension(ComponentDecl::new("x", "Int"))
        .extension_group(Some(3), [ComponentDecl::new("y", "Int")])
    );
    assert!(matches!(
        schema.compile(mixed),
        Err(SchemaError::ProhibitedVersion { found: 3 })
    ));

    // Failed types stay failed.
    assert!(matches!(
        schema.compile(mixed), Err(SchemaError::Failed(_))
    ));
}

fn round_trip<M: Mode>(schema: &Schema, id: TypeId, value: &Value) {
    let optimized = schema.optimize(id, value).unwrap();
    let encoded = Encoder::<M>::new(schema).encode_to_vec(id, value).unwrap();
    let decoded = Decoder::<M>::new(schema).decode_slice(
        id, &encoded
    ).unwrap();
    assert_eq!(schema.accept(id, &decoded), Ok(()));
    assert_eq!(&decoded, optimized.as_ref(), "{}", M::NAME);
}

#[test]
fn encoded_values_decode_to_their_canonical_form() {
    let mut schema = schema();
    let id = record(&mut schema);
    let value = record_value();

    round_trip::<Ber>(&schema, id, &value);
    round_trip::<Cer>(&schema, id, &value);
    round_trip::<Der>(&schema, id, &value);

    let encoded = Encoder::<Ber>::streaming(&schema).encode_to_vec(
        id, &value
    ).unwrap();
    let decoded = Decoder::<Ber>::new(&schema).decode(
        id, ReaderSource::new(encoded.as_slice())
    ).unwrap();
    assert_eq!(&decoded, schema.optimize(id, &value).unwrap().as_ref());
}

#[test]
fn unknown_components_only_follow_extensions() {
    let mut schema = schema();
    let one = Value::Integer(1);
    let flag = Value::Boolean(true);
    let text = Value::string("text");
    let octets = Value::OctetString(vec![1u8].into());
    let extensible = compile(&mut schema, CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .extension(ComponentDecl::new("x", "Bool").optional())
        .extension(ComponentDecl::new("y", "Text").optional())
        .trailing(ComponentDecl::new("b", "Octets").optional())
    );
    let closed = compile(&mut schema, CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .component(ComponentDecl::new("x", "Bool").optional())
    );

    for (previous, value) in [("x", &flag), ("y", &text)] {
        assert_eq!(
            schema.accept(extensible, &values(&[
                ("a", one.clone()), (previous, value.clone()),
                ("new", one.clone()),
            ])),
            Ok(())
        );
    }
    assert_eq!(
        schema.accept(extensible, &values(&[
            ("a", one.clone()), ("x", flag.clone()), ("y", text.clone()),
            ("new", one.clone()), ("b", octets.clone()),
        ])),
        Ok(())
    );
    assert_eq!(
        schema.accept(extensible, &values(&[
            ("a", one.clone()), ("new", one.clone())
        ])),
        Err(ValueError::UnknownComponent("new".into()))
    );
    assert_eq!(
        schema.accept(extensible, &values(&[
            ("a", one.clone()), ("b", octets), ("new", one.clone())
        ])),
        Err(ValueError::UnknownComponent("new".into()))
    );
    assert_eq!(
        schema.accept(closed, &values(&[
            ("a", one.clone()), ("x", flag), ("new", one.clone())
        ])),
        Err(ValueError::UnknownComponent("new".into()))
    );
}

#[test]
fn automatic_tags_follow_declaration_order() {
    let mut schema = schema();
    let alt = schema.define("Alt", CollectionType::choice()
        .component(ComponentDecl::new("i", "Int"))
        .component(ComponentDecl::new("t", "Text"))
    ).unwrap();
    let id = compile(&mut schema, CollectionType::sequence().automatic_tags()
        .component(ComponentDecl::new("first", "Int"))
        .component(ComponentDecl::new("second", alt))
        .component(ComponentDecl::new("third", "Bool"))
    );

    let tags: Vec<_> = schema.layout(id).unwrap().components().iter().map(
        |item| {
            match *schema.get(item.type_id()).kind() {
                TypeKind::Tagged(ref tagged) => {
                    (tagged.tag(), tagged.method())
                }
                _ => panic!("component {} not tagged", item.name()),
            }
        }
    ).collect();
    assert_eq!(
        tags,
        [
            (Tag::ctx(0), TagMethod::Implicit),
            (Tag::ctx(1), TagMethod::Explicit),
            (Tag::ctx(2), TagMethod::Implicit),
        ]
    );
}

#[test]
fn der_requires_buffering() {
    let mut schema = schema();
    let id = compile(&mut schema, CollectionType::sequence_of("Int"));
    let value = Value::List(vec![Value::Integer(1), Value::Integer(2)]);

    let err = Encoder::<Der>::streaming(&schema).encode_to_vec(
        id, &value
    ).unwrap_err();
    assert!(matches!(err, EncodeError::Format(FormatError::DerViolation(_))));

    assert_eq!(
        Encoder::<Der>::new(&schema).encode_to_vec(id, &value).unwrap(),
        b"\x30\x06\x02\x01\x01\x02\x01\x02"
    );
}

#[test]
fn missing_required_components_are_reported() {
    let mut schema = schema();
    let id = compile(&mut schema, CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int"))
        .component(ComponentDecl::new("b", "Bool").optional())
        .component(ComponentDecl::new("c", "Int"))
    );
    assert_eq!(
        schema.accept(id, &values(&[("c", Value::Integer(2))])),
        Err(ValueError::MissingRequired { name: "a".into(), index: 0 })
    );
}

#[test]
fn empty_values() {
    let mut schema = schema();
    let optional = compile(&mut schema, CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int").optional())
        .component(ComponentDecl::new("b", "Bool").default(true))
    );
    let required = compile(&mut schema, CollectionType::sequence()
        .component(ComponentDecl::new("a", "Int").optional())
        .component(ComponentDecl::new("b", "Bool"))
    );
    let empty = Value::Collection(ValueCollection::new());
    assert_eq!(schema.accept(optional, &empty), Ok(()));
    assert_eq!(schema.accept(required, &empty), Err(ValueError::EmptyValue));
}
