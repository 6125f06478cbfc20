//! Decoding values of a schema.
//!
//! This is a private module. Its public items are re-exported by the parent.

use std::convert::Infallible;
use std::marker::PhantomData;
use bytes::BytesMut;
use tracing::debug;
use crate::captured::Captured;
use crate::error::{FormatError, SchemaError, ValueError};
use crate::mode::{CER_SEGMENT_LEN, Mode};
use crate::tag::{Tag, TagMethod};
use crate::types::{
    Builtin, CollectionKind, CollectionLayout, CollectionType, Schema, TypeId,
    TypeKind, TypeRef,
};
use crate::value::{NamedValue, Value, ValueCollection};
use super::error::DecodeError;
use super::header::Header;
use super::source::{Fragment, IntoSource, Pos, SliceSource, Source};


/// The default limit for the nesting of values.
pub const DEFAULT_MAX_DEPTH: usize = 64;


//------------ Decoder -------------------------------------------------------

/// Decodes values of a schema’s types under the rules of mode `M`.
///
/// The decoder follows the compiled type and matches the encoded elements
/// to the components of collection types by their tags. Elements of
/// extensible types not known to the schema are kept as
/// [`Value::Opaque`] entries where the type allows unknown components.
/// Once decoded, the complete value is validated against the type.
///
/// Each level of nesting in the encoded data costs one unit of depth. If
/// the data nests deeper than the configured maximum, decoding fails.
#[derive(Clone, Copy, Debug)]
pub struct Decoder<'s, M> {
    schema: &'s Schema,
    max_depth: usize,
    marker: PhantomData<M>,
}

/// The content of a constructed value.
#[derive(Clone, Copy)]
enum Content<'a> {
    /// The single value inside an explicit tag.
    Explicit(TypeId),

    /// The segments of a string type in constructed form.
    Segments(Builtin),

    /// The components of a SEQUENCE, SET, or *-OF value.
    Collection(&'a CollectionType),
}

impl<'s, M: Mode> Decoder<'s, M> {
    pub fn new(schema: &'s Schema) -> Self {
        Decoder { schema, max_depth: DEFAULT_MAX_DEPTH, marker: PhantomData }
    }

    /// Changes the nesting limit of the decoder.
    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Decoder { max_depth, ..self }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decodes a value of the given type.
    ///
    /// The source must contain exactly the encoded value.
    pub fn decode<I: IntoSource>(
        &self, id: TypeId, source: I
    ) -> Result<Value, DecodeError<<I::Source as Source>::Error>> {
        let mut source = source.into_source();
        let res = self.decode_one(id, &mut source)?;
        let pos = source.pos();
        if !source.is_exhausted()? {
            return Err(DecodeError::format(FormatError::TrailingData, pos))
        }
        Ok(res)
    }

    /// Decodes a value of the given type from a slice.
    pub fn decode_slice(
        &self, id: TypeId, data: &[u8]
    ) -> Result<Value, DecodeError<Infallible>> {
        self.decode(id, data)
    }

    /// Decodes a single value from the beginning of a source.
    ///
    /// The source is left positioned after the value.
    pub fn decode_one<S: Source>(
        &self, id: TypeId, source: &mut S
    ) -> Result<Value, DecodeError<S::Error>> {
        let start = source.pos();
        self.schema.require_compiled(id).map_err(|err| {
            DecodeError::format(err, start)
        })?;
        let header = Header::take_from(source)?;
        let res = self.decode_value(header, source, id, None, self.max_depth)?;
        self.schema.accept(id, &res).map_err(|err| {
            DecodeError::format(err, start)
        })?;
        Ok(res)
    }

    /// Decodes a value whose header has already been taken.
    ///
    /// If `implicit` is given, the value carries this tag instead of its
    /// own.
    fn decode_value<S: Source>(
        &self,
        header: Header<M>,
        source: &mut S,
        id: TypeId,
        implicit: Option<Tag>,
        depth: usize,
    ) -> Result<Value, DecodeError<S::Error>> {
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::format(
                FormatError::DepthExceeded, header.pos()
            ))
        };
        match *self.schema.get(id).kind() {
            TypeKind::Builtin(builtin) => {
                self.decode_builtin(header, source, builtin, implicit, depth)
            }
            TypeKind::Tagged(ref tagged) => {
                let inner = self.resolve(tagged.inner(), header.pos())?;
                let tag = implicit.unwrap_or(tagged.tag());
                match tagged.method() {
                    TagMethod::Implicit => {
                        self.decode_value(
                            header, source, inner, Some(tag), depth
                        )
                    }
                    TagMethod::Explicit => {
                        check_tag(&header, tag)?;
                        self.constructed(
                            &header, source, Content::Explicit(inner), depth
                        )
                    }
                }
            }
            TypeKind::Defined(ref defined) => {
                let defined = self.resolve(defined, header.pos())?;
                self.decode_value(header, source, defined, implicit, depth)
            }
            TypeKind::Collection(ref coll) => {
                match coll.kind().tag() {
                    Some(tag) => {
                        check_tag(&header, implicit.unwrap_or(tag))?;
                        self.constructed(
                            &header, source, Content::Collection(coll), depth
                        )
                    }
                    None if implicit.is_some() => {
                        Err(DecodeError::format(
                            ValueError::IllegalValue(
                                "CHOICE cannot be tagged implicitly".into()
                            ),
                            header.pos()
                        ))
                    }
                    None => self.decode_choice(header, source, coll, depth)
                }
            }
        }
    }

    fn resolve<E>(
        &self, type_ref: &TypeRef, pos: Pos
    ) -> Result<TypeId, DecodeError<E>> {
        self.schema.resolve(type_ref).map_err(|err| {
            DecodeError::format(err, pos)
        })
    }

    fn decode_builtin<S: Source>(
        &self,
        header: Header<M>,
        source: &mut S,
        builtin: Builtin,
        implicit: Option<Tag>,
        depth: usize,
    ) -> Result<Value, DecodeError<S::Error>> {
        check_tag(&header, implicit.unwrap_or(builtin.tag()))?;
        if header.is_constructed() {
            if !builtin.is_segmentable() {
                return Err(DecodeError::format(
                    FormatError::MethodMismatch {
                        tag: header.tag(), constructed: true
                    },
                    header.pos()
                ))
            }
            if M::IS_RESTRICTED && M::ALLOW_DEFINITE_CONSTRUCTED {
                return Err(DecodeError::format(
                    FormatError::DerViolation("constructed string"),
                    header.pos()
                ))
            }
            return self.constructed(
                &header, source, Content::Segments(builtin), depth
            )
        }

        let len = header.length().definite().ok_or_else(|| {
            DecodeError::format(FormatError::IndefinitePrimitive, header.pos())
        })?;
        if !M::ALLOW_DEFINITE_CONSTRUCTED
            && builtin.is_segmentable()
            && len > CER_SEGMENT_LEN
        {
            return Err(DecodeError::format(
                FormatError::DerViolation("unsegmented long string"),
                header.pos()
            ))
        }
        let pos = source.pos();
        let content = source.take_bytes(len)?;
        builtin.decode_content::<M>(&content).map_err(|err| {
            DecodeError::format(err, pos)
        })
    }

    /// Decodes the value of an untagged CHOICE.
    ///
    /// The header belongs to the chosen alternative.
    fn decode_choice<S: Source>(
        &self,
        header: Header<M>,
        source: &mut S,
        coll: &CollectionType,
        depth: usize,
    ) -> Result<Value, DecodeError<S::Error>> {
        let layout = compiled_layout(coll, header.pos())?;
        match layout.component_by_tag(header.tag()) {
            Some(component) => {
                let value = self.decode_value(
                    header, source, component.type_id(), None, depth
                )?;
                Ok(Value::choice(component.name(), value))
            }
            None if coll.allows_unknown(None) => {
                let captured = self.capture(&header, source, depth)?;
                Ok(Value::choice(header.tag().to_string(), captured))
            }
            None => {
                Err(DecodeError::format(
                    FormatError::UnknownTag(header.tag()), header.pos()
                ))
            }
        }
    }

    /// Decodes the content of a constructed value.
    ///
    /// Content of definite length is taken from the source as a whole and
    /// decoded from memory.
    fn constructed<S: Source>(
        &self,
        header: &Header<M>,
        source: &mut S,
        content: Content,
        depth: usize,
    ) -> Result<Value, DecodeError<S::Error>> {
        if !header.is_constructed() {
            return Err(DecodeError::format(
                FormatError::MethodMismatch {
                    tag: header.tag(), constructed: false
                },
                header.pos()
            ))
        }
        match header.length().definite() {
            Some(len) => {
                let pos = source.pos();
                let data = source.take_bytes(len)?;
                self.read_content(
                    &mut SliceSource::new_at(&data, pos), true, content, depth
                ).map_err(DecodeError::convert)
            }
            None => self.read_content(source, false, content, depth)
        }
    }

    fn read_content<S: Source>(
        &self,
        source: &mut S,
        definite: bool,
        content: Content,
        depth: usize,
    ) -> Result<Value, DecodeError<S::Error>> {
        match content {
            Content::Explicit(id) => {
                let pos = source.pos();
                let header = next_header(source, definite)?.ok_or_else(|| {
                    DecodeError::format(FormatError::Truncated, pos)
                })?;
                let res = self.decode_value(header, source, id, None, depth)?;
                let pos = source.pos();
                if next_header::<M, _>(source, definite)?.is_some() {
                    return Err(DecodeError::format(
                        FormatError::TrailingData, pos
                    ))
                }
                Ok(res)
            }
            Content::Segments(builtin) => {
                let pos = source.pos();
                let data = self.read_segments(source, definite, depth)?;
                builtin.decode_content::<M>(&data.freeze()).map_err(|err| {
                    DecodeError::format(err, pos)
                })
            }
            Content::Collection(coll) => {
                self.read_components(source, definite, coll, depth)
            }
        }
    }

    /// Collects the content of the segments of a constructed string.
    ///
    /// Under CER, all segments but the last one must be of exactly the
    /// segment size and the string must be longer than one segment.
    fn read_segments<S: Source>(
        &self,
        source: &mut S,
        definite: bool,
        depth: usize,
    ) -> Result<BytesMut, DecodeError<S::Error>> {
        let start = source.pos();
        let mut res = BytesMut::new();
        let mut short = false;
        while let Some(header) = next_header::<M, _>(source, definite)? {
            check_tag(&header, Tag::OCTET_STRING)?;
            if short {
                return Err(DecodeError::format(
                    FormatError::DerViolation("short string segment"),
                    header.pos()
                ))
            }
            if header.is_constructed() {
                if M::IS_RESTRICTED {
                    return Err(DecodeError::format(
                        FormatError::DerViolation("nested string segments"),
                        header.pos()
                    ))
                }
                let Some(depth) = depth.checked_sub(1) else {
                    return Err(DecodeError::format(
                        FormatError::DepthExceeded, header.pos()
                    ))
                };
                match self.constructed(
                    &header, source,
                    Content::Segments(Builtin::OctetString), depth
                )? {
                    Value::OctetString(data) => res.extend_from_slice(&data),
                    _ => {
                        return Err(DecodeError::format(
                            FormatError::IllegalTag("invalid segment"),
                            header.pos()
                        ))
                    }
                }
                continue
            }
            let len = header.length().definite().ok_or_else(|| {
                DecodeError::format(
                    FormatError::IndefinitePrimitive, header.pos()
                )
            })?;
            if !M::ALLOW_DEFINITE_CONSTRUCTED {
                if len > CER_SEGMENT_LEN {
                    return Err(DecodeError::format(
                        FormatError::DerViolation("long string segment"),
                        header.pos()
                    ))
                }
                short = len < CER_SEGMENT_LEN;
            }
            let frag = source.request_exact(len)?;
            res.extend_from_slice(frag.slice());
            frag.consume();
        }
        if !M::ALLOW_DEFINITE_CONSTRUCTED && res.len() <= CER_SEGMENT_LEN {
            return Err(DecodeError::format(
                FormatError::DerViolation("short constructed string"), start
            ))
        }
        Ok(res)
    }

    /// Decodes the components of a collection value.
    ///
    /// Elements are matched to components via their tags. In a SEQUENCE,
    /// only components after the previously matched one are considered.
    fn read_components<S: Source>(
        &self,
        source: &mut S,
        definite: bool,
        coll: &CollectionType,
        depth: usize,
    ) -> Result<Value, DecodeError<S::Error>> {
        let layout = compiled_layout(coll, source.pos())?;
        if coll.kind().is_list() {
            let element = layout.components().first().ok_or_else(|| {
                DecodeError::format(
                    ValueError::IllegalValue("list type without element".into()),
                    source.pos()
                )
            })?;
            let mut res = Vec::new();
            while let Some(header) = next_header(source, definite)? {
                res.push(self.decode_value(
                    header, source, element.type_id(), None, depth
                )?);
            }
            return Ok(Value::List(res))
        }

        let mut res = ValueCollection::new();
        let mut previous: Option<usize> = None;
        while let Some(header) = next_header(source, definite)? {
            let component = match coll.kind() {
                CollectionKind::Sequence => {
                    let start = previous.map_or(0, |index| index + 1);
                    layout.components().get(start..).and_then(|rest| {
                        rest.iter().find(|item| item.has_tag(header.tag()))
                    })
                }
                _ => layout.component_by_tag(header.tag())
            };
            let Some(component) = component else {
                if !coll.allows_unknown(previous) {
                    return Err(DecodeError::format(
                        FormatError::UnknownTag(header.tag()), header.pos()
                    ))
                }
                let captured = self.capture(&header, source, depth)?;
                res.push(NamedValue::new(header.tag().to_string(), captured));
                continue
            };
            let pos = header.pos();
            let value = self.decode_value(
                header, source, component.type_id(), None, depth
            )?;
            if M::IS_RESTRICTED && component.default() == Some(&value) {
                return Err(DecodeError::format(
                    FormatError::DerViolation("component equal to its default"),
                    pos
                ))
            }
            res.push(NamedValue::new(component.name(), value));
            previous = Some(component.index());
        }
        Ok(Value::Collection(res))
    }

    /// Keeps an element not known to the schema.
    fn capture<S: Source>(
        &self, header: &Header<M>, source: &mut S, depth: usize
    ) -> Result<Value, DecodeError<S::Error>> {
        let captured = Captured::take_from(header, source, depth)?;
        debug!(
            tag = %header.tag(), pos = %header.pos(),
            "preserving unknown extension element"
        );
        Ok(Value::Opaque(captured))
    }
}


//------------ Helpers -------------------------------------------------------

/// Takes the header of the next element of constructed content.
///
/// Returns `Ok(None)` at the end of the content. For definite length
/// content, this is the end of the source. Otherwise it is the
/// end-of-contents marker.
fn next_header<M: Mode, S: Source>(
    source: &mut S, definite: bool
) -> Result<Option<Header<M>>, DecodeError<S::Error>> {
    let pos = source.pos();
    match Header::<M>::take_opt_from(source)? {
        None if definite => Ok(None),
        None => {
            Err(DecodeError::format(FormatError::MissingEndOfContents, pos))
        }
        Some(header) if header.is_end_of_contents() => {
            if definite {
                Err(DecodeError::format(
                    FormatError::IllegalTag("unexpected end-of-contents"), pos
                ))
            }
            else {
                Ok(None)
            }
        }
        Some(header) => Ok(Some(header))
    }
}

fn check_tag<M: Mode, E>(
    header: &Header<M>, expected: Tag
) -> Result<(), DecodeError<E>> {
    if header.tag() == expected {
        Ok(())
    }
    else {
        Err(DecodeError::format(
            FormatError::UnexpectedTag { expected, found: header.tag() },
            header.pos()
        ))
    }
}

fn compiled_layout<E>(
    coll: &CollectionType, pos: Pos
) -> Result<&CollectionLayout, DecodeError<E>> {
    coll.layout().ok_or_else(|| {
        DecodeError::format(
            SchemaError::NotCompiled(coll.kind().family().to_string()), pos
        )
    })
}


//============ Tests =========================================================
