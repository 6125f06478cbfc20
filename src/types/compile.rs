//! Compiling types.
//!
//! Compilation happens once per type. Each type moves from
//! [`State::Unvalidated`] through [`State::Validating`] to either
//! [`State::Done`] or [`State::Failed`]. Reaching a type that is still in
//! the validating state means it is defined in terms of itself.

use std::borrow::Cow;
use std::collections::HashSet;
use smallvec::SmallVec;
use tracing::{debug, warn};
use crate::error::SchemaError;
use crate::tag::{Tag, TagMethod};
use crate::value::Value;
use super::{Schema, State, TaggedType, Type, TypeId, TypeKind, TypeRef};
use super::collection::{
    CollectionKind, CollectionLayout, CollectionType, ComponentDecl,
    ComponentSource, ComponentType, ExtensionGroup,
};


//------------ Schema --------------------------------------------------------

impl Schema {
    /// Compiles a type and all types it depends on.
    ///
    /// Compiling a type that has been compiled successfully before is a
    /// no-op. Compiling a type that failed before returns an error.
    pub fn compile(&mut self, id: TypeId) -> Result<(), SchemaError> {
        let id = self.resolve(&id.into())?;
        match self.state(id) {
            State::Done => return Ok(()),
            State::Failed => {
                return Err(SchemaError::Failed(self.describe(id)))
            }
            State::Validating => {
                return Err(SchemaError::CyclicDefinition(self.describe(id)))
            }
            State::Unvalidated => { }
        }
        self.node_mut(id).state = State::Validating;
        match self.on_validate(id) {
            Ok(()) => {
                self.node_mut(id).state = State::Done;
                Ok(())
            }
            Err(err) => {
                self.node_mut(id).state = State::Failed;
                warn!(ty = %self.describe(id), error = %err, "type failed");
                Err(err)
            }
        }
    }

    /// Compiles all types of the schema.
    ///
    /// Stops at the first type that fails.
    pub fn compile_all(&mut self) -> Result<(), SchemaError> {
        for idx in 0..self.nodes.len() {
            self.compile(TypeId(idx))?;
        }
        Ok(())
    }

    fn on_validate(&mut self, id: TypeId) -> Result<(), SchemaError> {
        match self.get(id).kind().clone() {
            TypeKind::Builtin(_) => Ok(()),
            TypeKind::Defined(target) => {
                let target = self.resolve(&target)?;
                self.compile(target)?;
                self.node_mut(id).ty.kind = TypeKind::Defined(target.into());
                Ok(())
            }
            TypeKind::Tagged(tagged) => {
                let inner = self.resolve(&tagged.inner)?;
                self.compile(inner)?;

                // An untagged CHOICE can’t be tagged implicitly as that
                // would lose the tag of the alternative.
                let method = if tagged.method == TagMethod::Implicit
                    && self.is_untagged_choice(inner)?
                {
                    TagMethod::Explicit
                }
                else {
                    tagged.method
                };
                self.node_mut(id).ty.kind = TypeKind::Tagged(TaggedType {
                    tag: tagged.tag, method, inner: inner.into()
                });
                Ok(())
            }
            TypeKind::Collection(coll) => {
                let layout = ComponentCompiler::new(self, &coll).compile()?;
                debug!(
                    ty = %self.describe(id),
                    kind = ?coll.kind(),
                    components = layout.components.len(),
                    extension_range = ?layout.extension_range,
                    "compiled collection layout"
                );
                if let TypeKind::Collection(ref mut stored)
                    = self.node_mut(id).ty.kind
                {
                    stored.layout = Some(layout);
                }
                Ok(())
            }
        }
    }
}


//------------ ComponentCompiler ---------------------------------------------

/// Turns the declaration of a collection type into its layout.
struct ComponentCompiler<'a> {
    schema: &'a mut Schema,
    coll: &'a CollectionType,
}

/// A component after flattening but before compilation.
struct Pending {
    name: String,
    type_ref: TypeRef,
    optional: bool,
    default: Option<Value>,
    version: u32,

    /// Was the component declared by the collection itself?
    direct: bool,
}

impl Pending {
    fn declared(decl: &ComponentDecl, version: u32) -> Self {
        Pending {
            name: decl.name.clone(),
            type_ref: decl.type_ref.clone(),
            optional: decl.optional,
            default: decl.default.clone(),
            version,
            direct: true,
        }
    }
}

impl<'a> ComponentCompiler<'a> {
    fn new(schema: &'a mut Schema, coll: &'a CollectionType) -> Self {
        ComponentCompiler { schema, coll }
    }

    fn compile(mut self) -> Result<CollectionLayout, SchemaError> {
        self.check_versions()?;
        let pending = self.flatten()?;
        check_names(&pending)?;
        let (mut components, textually_tagged) = self.components(pending)?;

        if self.coll.has_automatic_tags()
            && !self.coll.kind().is_list()
            && !textually_tagged
        {
            self.apply_automatic_tags(&mut components)?;
        }

        for component in &mut components {
            component.tags = self.schema.outer_tags(component.type_id)?;
        }
        self.check_ambiguity(&components)?;

        let extension_range = components.iter().filter(|item| {
            item.version > 1
        }).fold(None, |range, item| match range {
            None => Some((item.index, item.index)),
            Some((start, end)) => {
                Some((
                    std::cmp::min(start, item.index),
                    std::cmp::max(end, item.index)
                ))
            }
        });
        let all_optional = components.iter().all(|item| !item.is_required());
        Ok(CollectionLayout { components, extension_range, all_optional })
    }

    /// Checks the version numbers of extension addition groups.
    ///
    /// Either all extension additions are groups with explicit versions
    /// that strictly increase or none of them has an explicit version.
    fn check_versions(&self) -> Result<(), SchemaError> {
        let unversioned = self.coll.extensions.iter().any(|source| {
            !matches!(
                source,
                ComponentSource::Group(ExtensionGroup {
                    version: Some(_), ..
                })
            )
        });
        let mut previous = 1;
        for source in &self.coll.extensions {
            if let ComponentSource::Group(ExtensionGroup {
                version: Some(found), ..
            }) = *source {
                if unversioned {
                    return Err(SchemaError::ProhibitedVersion { found })
                }
                if found <= previous {
                    return Err(SchemaError::VersionOrder { previous, found })
                }
                previous = found;
            }
        }
        Ok(())
    }

    /// Flattens the declaration into the final component order.
    ///
    /// Root components come first, then extension additions, then the
    /// root components after the extension additions. Without explicit
    /// versions, each extension addition gets the next version number.
    fn flatten(&mut self) -> Result<Vec<Pending>, SchemaError> {
        let coll = self.coll;
        let mut res = Vec::new();
        for source in &coll.primary {
            self.flatten_source(source, 1, &mut res)?;
        }
        let mut implicit_version = 1;
        for source in &coll.extensions {
            let version = match *source {
                ComponentSource::Group(ExtensionGroup {
                    version: Some(version), ..
                }) => version,
                _ => {
                    implicit_version += 1;
                    implicit_version
                }
            };
            self.flatten_source(source, version, &mut res)?;
        }
        for source in &coll.trailing {
            self.flatten_source(source, 1, &mut res)?;
        }
        Ok(res)
    }

    fn flatten_source(
        &mut self,
        source: &ComponentSource,
        version: u32,
        target: &mut Vec<Pending>,
    ) -> Result<(), SchemaError> {
        match source {
            ComponentSource::Component(decl) => {
                target.push(Pending::declared(decl, version));
            }
            ComponentSource::Group(group) => {
                target.extend(group.components.iter().map(|decl| {
                    Pending::declared(decl, version)
                }));
            }
            ComponentSource::ComponentsOf(type_ref) => {
                self.include_components(type_ref, version, target)?;
            }
        }
        Ok(())
    }

    /// Adds the root components of another collection type.
    fn include_components(
        &mut self,
        type_ref: &TypeRef,
        version: u32,
        target: &mut Vec<Pending>,
    ) -> Result<(), SchemaError> {
        let included = self.schema.resolve(type_ref)?;
        self.schema.compile(included)?;
        let base = self.schema.dereference(included)?;
        let kind = self.coll.kind();
        let compatible = matches!(
            kind, CollectionKind::Sequence | CollectionKind::Set
        ) && matches!(
            self.schema.get(base).kind(),
            TypeKind::Collection(coll) if coll.kind() == kind
        );
        let layout = match self.schema.layout(base) {
            Some(layout) if compatible => layout,
            _ => {
                return Err(SchemaError::IllegalComponentsOf(
                    self.schema.describe(included)
                ))
            }
        };
        target.extend(
            layout.components().iter().filter(|item| {
                item.version == 1
            }).map(|item| Pending {
                name: item.name.clone(),
                type_ref: item.declared.clone(),
                optional: item.optional,
                default: item.default.clone(),
                version,
                direct: false,
            })
        );
        Ok(())
    }

    /// Compiles the component types.
    ///
    /// Also returns whether any component declared by the collection itself
    /// carries a tag.
    fn components(
        &mut self, pending: Vec<Pending>
    ) -> Result<(Vec<ComponentType>, bool), SchemaError> {
        let mut res = Vec::with_capacity(pending.len());
        let mut textually_tagged = false;
        for (index, item) in pending.into_iter().enumerate() {
            let type_id = self.schema.resolve(&item.type_ref)?;
            self.schema.compile(type_id)?;

            // Only an anonymous tagged type counts as a tag written on the
            // component. Referring to a named tagged type doesn’t.
            let explicitly_tagged = matches!(item.type_ref, TypeRef::Id(_))
                && self.schema.name(type_id).is_none()
                && matches!(self.schema.get(type_id).kind(), TypeKind::Tagged(_));
            textually_tagged |= item.direct && explicitly_tagged;

            let default = match item.default {
                Some(ref value) => {
                    Some(self.check_default(type_id, &item.name, value)?)
                }
                None => None,
            };
            res.push(ComponentType {
                name: item.name,
                index,
                version: item.version,
                optional: item.optional,
                default,
                declared: item.type_ref,
                type_id,
                explicitly_tagged,
                tags: SmallVec::new(),
            });
        }
        Ok((res, textually_tagged))
    }

    /// Checks a default value and returns its optimized form.
    fn check_default(
        &self, type_id: TypeId, name: &str, value: &Value
    ) -> Result<Value, SchemaError> {
        self.schema.optimize(type_id, value).map(Cow::into_owned).map_err(
            |err| SchemaError::InvalidDefault {
                name: name.into(),
                reason: err.to_string(),
            }
        )
    }

    /// Wraps each component in a context specific tag.
    ///
    /// Root components are numbered first, extension additions after them.
    /// Untagged CHOICE types are tagged explicitly, everything else
    /// implicitly.
    fn apply_automatic_tags(
        &mut self, components: &mut [ComponentType]
    ) -> Result<(), SchemaError> {
        let order: Vec<usize> = components.iter().filter(|item| {
            item.version == 1
        }).chain(components.iter().filter(|item| {
            item.version > 1
        })).map(|item| item.index).collect();

        for (number, index) in (0u32..).zip(order) {
            let Some(component) = components.get_mut(index) else {
                continue
            };
            let method = if self.schema.is_untagged_choice(component.type_id)? {
                TagMethod::Explicit
            }
            else {
                TagMethod::Implicit
            };
            let tagged = self.schema.add(
                Type::tagged(Tag::ctx(number), method, component.type_id)
            );
            self.schema.compile(tagged)?;
            component.type_id = tagged;
        }
        Ok(())
    }

    /// Checks that the components can be told apart by their tags.
    ///
    /// In SET and CHOICE types, all components must have distinct tags. In
    /// SEQUENCE types, each run of optional components must have tags
    /// distinct from each other and from the component following the run.
    fn check_ambiguity(
        &self, components: &[ComponentType]
    ) -> Result<(), SchemaError> {
        match self.coll.kind() {
            CollectionKind::Set | CollectionKind::Choice => {
                check_distinct(components)
            }
            CollectionKind::Sequence => {
                for (start, item) in components.iter().enumerate() {
                    if item.is_required() {
                        continue
                    }
                    let end = components.iter().skip(start).position(|item| {
                        item.is_required()
                    }).map_or(components.len(), |pos| start + pos + 1);
                    check_distinct(components.get(start..end).unwrap_or_default())?;
                }
                Ok(())
            }
            CollectionKind::SequenceOf | CollectionKind::SetOf => Ok(())
        }
    }
}

fn check_names(pending: &[Pending]) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    for item in pending {
        if !names.insert(item.name.as_str()) {
            return Err(SchemaError::DuplicateName(item.name.clone()))
        }
    }
    Ok(())
}

fn check_distinct(components: &[ComponentType]) -> Result<(), SchemaError> {
    let mut seen: Vec<(Tag, &str)> = Vec::new();
    for item in components {
        for &tag in item.tags() {
            if let Some(&(_, first)) = seen.iter().find(|seen| seen.0 == tag) {
                return Err(SchemaError::TagAmbiguity {
                    first: first.into(),
                    second: item.name.clone(),
                    tag,
                })
            }
            seen.push((tag, item.name()));
        }
    }
    Ok(())
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::types::{Builtin, CollectionType, ComponentDecl, Family};
    use super::*;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.define("Int", Builtin::Integer).unwrap();
        schema.define("Bool", Builtin::Boolean).unwrap();
        schema.define("Str", Builtin::Utf8String).unwrap();
        schema
    }

    fn layout(schema: &Schema, id: TypeId) -> &CollectionLayout {
        schema.layout(id).unwrap()
    }

    fn versions(schema: &Schema, id: TypeId) -> Vec<(String, usize, u32)> {
        layout(schema, id).components().iter().map(|item| {
            (item.name().to_string(), item.index(), item.version())
        }).collect()
    }

    #[test]
    fn flatten_with_implicit_versions() {
        let mut schema = schema();
        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int"))
                .extension(ComponentDecl::new("x", "Int").optional())
                .extension_group(None, [
                    ComponentDecl::new("y", "Bool"),
                    ComponentDecl::new("z", "Str"),
                ])
                .trailing(ComponentDecl::new("b", "Str"))
        );
        schema.compile(seq).unwrap();
        assert_eq!(schema.state(seq), State::Done);
        assert_eq!(
            versions(&schema, seq),
            [
                ("a".into(), 0, 1), ("x".into(), 1, 2), ("y".into(), 2, 3),
                ("z".into(), 3, 3), ("b".into(), 4, 1),
            ]
        );
        assert_eq!(layout(&schema, seq).extension_range(), Some((1, 3)));
        assert!(!layout(&schema, seq).is_all_optional());
    }

    #[test]
    fn explicit_versions() {
        let mut schema = schema();
        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int"))
                .extension_group(Some(2), [ComponentDecl::new("b", "Int")])
                .extension_group(Some(5), [ComponentDecl::new("c", "Int")])
        );
        schema.compile(seq).unwrap();
        assert_eq!(
            versions(&schema, seq),
            [("a".into(), 0, 1), ("b".into(), 1, 2), ("c".into(), 2, 5)]
        );

        let seq = schema.add(
            CollectionType::sequence()
                .extension_group(Some(3), [ComponentDecl::new("b", "Int")])
                .extension_group(Some(3), [ComponentDecl::new("c", "Int")])
        );
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::VersionOrder { previous: 3, found: 3 })
        );
        assert_eq!(schema.state(seq), State::Failed);
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::Failed(schema.describe(seq)))
        );

        let seq = schema.add(
            CollectionType::sequence()
                .extension_group(Some(1), [ComponentDecl::new("b", "Int")])
        );
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::VersionOrder { previous: 1, found: 1 })
        );

        let seq = schema.add(
            CollectionType::sequence()
                .extension(ComponentDecl::new("b", "Int"))
                .extension_group(Some(2), [ComponentDecl::new("c", "Int")])
        );
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::ProhibitedVersion { found: 2 })
        );
    }

    #[test]
    fn duplicate_names() {
        let mut schema = schema();
        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int"))
                .extension_group(None, [ComponentDecl::new("a", "Int")])
        );
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::DuplicateName("a".into()))
        );

        schema.define("Base", CollectionType::sequence()
            .component(ComponentDecl::new("a", "Int"))
            .extension(ComponentDecl::new("ext", "Int").optional())
        ).unwrap();
        let seq = schema.add(
            CollectionType::sequence()
                .components_of("Base")
                .component(ComponentDecl::new("ext", "Bool"))
        );
        schema.compile(seq).unwrap();
        assert_eq!(
            versions(&schema, seq),
            [("a".into(), 0, 1), ("ext".into(), 1, 1)]
        );

        let seq = schema.add(
            CollectionType::sequence()
                .components_of("Base")
                .component(ComponentDecl::new("a", "Bool"))
        );
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::DuplicateName("a".into()))
        );

        let set = schema.add(CollectionType::set().components_of("Base"));
        assert_eq!(
            schema.compile(set),
            Err(SchemaError::IllegalComponentsOf("Base".into()))
        );
    }

    #[test]
    fn automatic_tags() {
        let mut schema = schema();
        let choice = schema.define("Alt", CollectionType::choice()
            .component(ComponentDecl::new("i", "Int"))
            .component(ComponentDecl::new("b", "Bool"))
        ).unwrap();
        let seq = schema.add(
            CollectionType::sequence().automatic_tags()
                .component(ComponentDecl::new("a", "Int"))
                .extension(ComponentDecl::new("x", "Str").optional())
                .component(ComponentDecl::new("c", choice))
                .trailing(ComponentDecl::new("d", "Bool"))
        );
        schema.compile(seq).unwrap();

        let tags: Vec<_> = layout(&schema, seq).components().iter().map(|item| {
            let TypeKind::Tagged(ref tagged) = *schema.get(item.type_id()).kind()
            else {
                panic!("component not tagged")
            };
            (item.name().to_string(), tagged.tag(), tagged.method())
        }).collect();
        assert_eq!(
            tags,
            [
                ("a".into(), Tag::ctx(0), TagMethod::Implicit),
                ("c".into(), Tag::ctx(1), TagMethod::Explicit),
                ("x".into(), Tag::ctx(3), TagMethod::Implicit),
                ("d".into(), Tag::ctx(2), TagMethod::Implicit),
            ]
        );
        let component = layout(&schema, seq).component("c").unwrap();
        assert_eq!(schema.family(component.type_id()), Ok(Family::Choice));
        assert_eq!(component.tags(), &[Tag::ctx(1)]);
    }

    #[test]
    fn automatic_tags_suppressed_by_explicit_tag() {
        let mut schema = schema();
        let int = schema.lookup("Int").unwrap();
        let tagged = schema.add(
            Type::tagged(Tag::ctx(7), TagMethod::Implicit, int)
        );
        let seq = schema.add(
            CollectionType::sequence().automatic_tags()
                .component(ComponentDecl::new("a", "Int"))
                .component(ComponentDecl::new("b", tagged))
        );
        schema.compile(seq).unwrap();
        let layout = layout(&schema, seq);
        assert_eq!(layout.components()[0].tags(), &[Tag::INTEGER]);
        assert_eq!(layout.components()[1].tags(), &[Tag::ctx(7)]);
        assert!(layout.components()[1].is_explicitly_tagged());
    }

    #[test]
    fn tag_ambiguity() {
        let mut schema = schema();
        let set = schema.add(
            CollectionType::set()
                .component(ComponentDecl::new("a", "Int"))
                .component(ComponentDecl::new("b", "Int"))
        );
        assert_eq!(
            schema.compile(set),
            Err(SchemaError::TagAmbiguity {
                first: "a".into(), second: "b".into(), tag: Tag::INTEGER
            })
        );

        let alt = schema.define("Alt", CollectionType::choice()
            .component(ComponentDecl::new("i", "Int"))
            .component(ComponentDecl::new("s", "Str"))
        ).unwrap();
        let choice = schema.add(
            CollectionType::choice()
                .component(ComponentDecl::new("nested", alt))
                .component(ComponentDecl::new("s2", "Str"))
        );
        assert!(matches!(
            schema.compile(choice), Err(SchemaError::TagAmbiguity { .. })
        ));

        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int").optional())
                .component(ComponentDecl::new("b", "Int"))
        );
        assert!(matches!(
            schema.compile(seq), Err(SchemaError::TagAmbiguity { .. })
        ));

        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int"))
                .component(ComponentDecl::new("b", "Int"))
                .component(ComponentDecl::new("c", "Bool").optional())
                .component(ComponentDecl::new("d", "Int"))
        );
        assert!(schema.compile(seq).is_ok());
    }

    #[test]
    fn cyclic_definitions() {
        let mut schema = schema();
        let node = schema.define("Node", CollectionType::sequence()
            .component(ComponentDecl::new("value", "Int"))
            .component(ComponentDecl::new("next", "Node").optional())
        ).unwrap();
        assert_eq!(
            schema.compile(node),
            Err(SchemaError::CyclicDefinition("Node".into()))
        );
        assert_eq!(schema.state(node), State::Failed);

        let a = schema.define("A", Type::defined("B")).unwrap();
        schema.define("B", Type::defined("A")).unwrap();
        assert!(matches!(
            schema.compile(a), Err(SchemaError::CyclicDefinition(_))
        ));
    }

    #[test]
    fn defaults() {
        let mut schema = schema();
        schema.define_value("five", Value::Integer(5)).unwrap();
        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int").default(
                    Value::Ref("five".into())
                ))
        );
        schema.compile(seq).unwrap();
        let layout = layout(&schema, seq);
        assert_eq!(layout.components()[0].default(), Some(&Value::Integer(5)));
        assert!(layout.is_all_optional());

        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Int").default(true))
        );
        assert!(matches!(
            schema.compile(seq), Err(SchemaError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn implicitly_tagged_choice_becomes_explicit() {
        let mut schema = schema();
        let choice = schema.add(
            CollectionType::choice()
                .component(ComponentDecl::new("i", "Int"))
        );
        let tagged = schema.add(
            Type::tagged(Tag::application(1), TagMethod::Implicit, choice)
        );
        schema.compile(tagged).unwrap();
        let TypeKind::Tagged(ref tagged) = *schema.get(tagged).kind() else {
            panic!("not a tagged type")
        };
        assert_eq!(tagged.method(), TagMethod::Explicit);
    }

    #[test]
    fn unresolved_reference() {
        let mut schema = schema();
        let seq = schema.add(
            CollectionType::sequence()
                .component(ComponentDecl::new("a", "Missing"))
        );
        assert_eq!(
            schema.compile(seq),
            Err(SchemaError::UnresolvedType("Missing".into()))
        );
    }
}
