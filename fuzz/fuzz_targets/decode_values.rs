#![no_main]

use libfuzzer_sys::fuzz_target;
use bertype::{
    Ber, Builtin, CollectionType, ComponentDecl, Der, Mode, Schema, TypeId,
};
use bertype::decode::Decoder;
use bertype::encode::Encoder;

fn schema() -> (Schema, TypeId) {
    let mut schema = Schema::new();
    schema.define("Int", Builtin::Integer).unwrap();
    schema.define("Text", Builtin::Utf8String).unwrap();
    schema.define("Octets", Builtin::OctetString).unwrap();
    let alt = schema.define("Alt", CollectionType::choice()
        .component(ComponentDecl::new("int", "Int"))
        .component(ComponentDecl::new("text", "Text"))
        .extensible()
    ).unwrap();
    let list = schema.add(CollectionType::set_of(alt));
    let id = schema.add(CollectionType::sequence().automatic_tags()
        .component(ComponentDecl::new("id", "Int"))
        .component(ComponentDecl::new("data", "Octets").optional())
        .component(ComponentDecl::new("items", list))
        .extension(ComponentDecl::new("note", "Text").optional())
    );
    schema.compile(id).unwrap();
    (schema, id)
}

fn decode<M: Mode>(schema: &Schema, id: TypeId, data: &[u8]) {
    let decoder = Decoder::<M>::new(schema).with_max_depth(16);
    if let Ok(value) = decoder.decode_slice(id, data) {
        // Everything we decode must be encodable again.
        Encoder::<Ber>::new(schema).encode_to_vec(id, &value).unwrap();
    }
}

fuzz_target!(|data: &[u8]| {
    let (schema, id) = schema();
    decode::<Ber>(&schema, id, data);
    decode::<Der>(&schema, id, data);
});
