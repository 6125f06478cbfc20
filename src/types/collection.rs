//! Collection types and their components.
//!
//! This is a private module. Its public items are re-exported by the parent.

use smallvec::SmallVec;
use crate::tag::Tag;
use crate::value::Value;
use super::{Family, TypeId, TypeRef};


//------------ CollectionKind ------------------------------------------------

/// The kind of a collection type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CollectionKind {
    Sequence,
    Set,
    Choice,
    SequenceOf,
    SetOf,
}

impl CollectionKind {
    pub fn family(self) -> Family {
        match self {
            CollectionKind::Sequence => Family::Sequence,
            CollectionKind::Set => Family::Set,
            CollectionKind::Choice => Family::Choice,
            CollectionKind::SequenceOf => Family::SequenceOf,
            CollectionKind::SetOf => Family::SetOf,
        }
    }

    /// Returns whether this is one of the SEQUENCE OF or SET OF kinds.
    pub fn is_list(self) -> bool {
        matches!(self, CollectionKind::SequenceOf | CollectionKind::SetOf)
    }

    /// Returns the universal tag of the kind, if there is one.
    pub fn tag(self) -> Option<Tag> {
        match self {
            CollectionKind::Sequence | CollectionKind::SequenceOf => {
                Some(Tag::SEQUENCE)
            }
            CollectionKind::Set | CollectionKind::SetOf => Some(Tag::SET),
            CollectionKind::Choice => None,
        }
    }
}


//------------ CollectionType ------------------------------------------------

/// A SEQUENCE, SET, CHOICE, SEQUENCE OF, or SET OF type.
///
/// The type is declared through its builder methods. Components go into
/// one of three places: the root components before the extension marker,
/// the extension additions, and the root components after the second
/// extension marker. Compiling the type flattens these into a single
/// [`CollectionLayout`].
#[derive(Clone, Debug)]
pub struct CollectionType {
    kind: CollectionKind,
    automatic_tags: bool,
    extensible: bool,
    pub(super) primary: Vec<ComponentSource>,
    pub(super) extensions: Vec<ComponentSource>,
    pub(super) trailing: Vec<ComponentSource>,
    pub(super) layout: Option<CollectionLayout>,
}

impl CollectionType {
    fn new(kind: CollectionKind) -> Self {
        CollectionType {
            kind,
            automatic_tags: false,
            extensible: false,
            primary: Vec::new(),
            extensions: Vec::new(),
            trailing: Vec::new(),
            layout: None,
        }
    }

    /// Creates a new, empty SEQUENCE type.
    pub fn sequence() -> Self {
        Self::new(CollectionKind::Sequence)
    }

    /// Creates a new, empty SET type.
    pub fn set() -> Self {
        Self::new(CollectionKind::Set)
    }

    /// Creates a new CHOICE type without any alternatives.
    pub fn choice() -> Self {
        Self::new(CollectionKind::Choice)
    }

    /// Creates a SEQUENCE OF type for the given element type.
    pub fn sequence_of(element: impl Into<TypeRef>) -> Self {
        Self::new(CollectionKind::SequenceOf).component(
            ComponentDecl::new(ELEMENT_NAME, element)
        )
    }

    /// Creates a SET OF type for the given element type.
    pub fn set_of(element: impl Into<TypeRef>) -> Self {
        Self::new(CollectionKind::SetOf).component(
            ComponentDecl::new(ELEMENT_NAME, element)
        )
    }

    /// Requests automatic tagging of the components.
    pub fn automatic_tags(mut self) -> Self {
        self.automatic_tags = true;
        self
    }

    /// Marks the type as extensible.
    pub fn extensible(mut self) -> Self {
        self.extensible = true;
        self
    }

    /// Adds a root component before the extension marker.
    pub fn component(mut self, component: ComponentDecl) -> Self {
        self.primary.push(ComponentSource::Component(component));
        self
    }

    /// Includes the root components of another SEQUENCE or SET type.
    pub fn components_of(mut self, ty: impl Into<TypeRef>) -> Self {
        self.primary.push(ComponentSource::ComponentsOf(ty.into()));
        self
    }

    /// Adds a single extension addition.
    pub fn extension(mut self, component: ComponentDecl) -> Self {
        self.extensible = true;
        self.extensions.push(ComponentSource::Component(component));
        self
    }

    /// Adds the root components of another type as extension additions.
    pub fn extension_components_of(mut self, ty: impl Into<TypeRef>) -> Self {
        self.extensible = true;
        self.extensions.push(ComponentSource::ComponentsOf(ty.into()));
        self
    }

    /// Adds an extension addition group.
    ///
    /// If the group carries an explicit version number, all extension
    /// additions of the type must be groups with increasing version numbers.
    pub fn extension_group(
        mut self,
        version: Option<u32>,
        components: impl IntoIterator<Item = ComponentDecl>,
    ) -> Self {
        self.extensible = true;
        self.extensions.push(ComponentSource::Group(ExtensionGroup {
            version,
            components: components.into_iter().collect(),
        }));
        self
    }

    /// Adds a root component after the second extension marker.
    pub fn trailing(mut self, component: ComponentDecl) -> Self {
        self.extensible = true;
        self.trailing.push(ComponentSource::Component(component));
        self
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub fn has_automatic_tags(&self) -> bool {
        self.automatic_tags
    }

    /// Returns the compiled layout if the type has been compiled.
    pub fn layout(&self) -> Option<&CollectionLayout> {
        self.layout.as_ref()
    }

    /// Returns whether an unknown component may follow `previous`.
    ///
    /// Here, `previous` is the index of the last known component seen. In
    /// a SEQUENCE, unknown components may only follow an extension
    /// addition. In a SET or CHOICE, they may appear anywhere. In all
    /// cases, the type must be extensible.
    pub fn allows_unknown(&self, previous: Option<usize>) -> bool {
        if !self.extensible {
            return false
        }
        match self.kind {
            CollectionKind::Sequence => {
                match (self.layout.as_ref(), previous) {
                    (Some(layout), Some(index)) => {
                        layout.in_extension_range(index)
                    }
                    _ => false
                }
            }
            CollectionKind::Set | CollectionKind::Choice => true,
            CollectionKind::SequenceOf | CollectionKind::SetOf => false,
        }
    }

    /// Returns a copy of the declaration without the compiled layout.
    pub(super) fn copy(&self) -> Self {
        CollectionType { layout: None, ..self.clone() }
    }
}

/// The name of the single component of SEQUENCE OF and SET OF types.
pub(crate) const ELEMENT_NAME: &str = "item";


//------------ ComponentSource -----------------------------------------------

/// One entry in the declaration of a collection type.
#[derive(Clone, Debug)]
pub(crate) enum ComponentSource {
    Component(ComponentDecl),
    ComponentsOf(TypeRef),
    Group(ExtensionGroup),
}


//------------ ExtensionGroup ------------------------------------------------

/// An extension addition group.
#[derive(Clone, Debug)]
pub(crate) struct ExtensionGroup {
    pub version: Option<u32>,
    pub components: Vec<ComponentDecl>,
}


//------------ ComponentDecl -------------------------------------------------

/// The declaration of a single component.
#[derive(Clone, Debug)]
pub struct ComponentDecl {
    pub(super) name: String,
    pub(super) type_ref: TypeRef,
    pub(super) optional: bool,
    pub(super) default: Option<Value>,
}

impl ComponentDecl {
    /// Declares a required component.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        ComponentDecl {
            name: name.into(),
            type_ref: ty.into(),
            optional: false,
            default: None,
        }
    }

    /// Marks the component as OPTIONAL.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Gives the component a DEFAULT value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}


//------------ ComponentType -------------------------------------------------

/// A compiled component of a collection type.
#[derive(Clone, Debug)]
pub struct ComponentType {
    pub(super) name: String,
    pub(super) index: usize,
    pub(super) version: u32,
    pub(super) optional: bool,
    pub(super) default: Option<Value>,
    pub(super) declared: TypeRef,
    pub(super) type_id: TypeId,
    pub(super) explicitly_tagged: bool,
    pub(super) tags: SmallVec<[Tag; 4]>,
}

impl ComponentType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the position of the component in the layout.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the extension version.
    ///
    /// Root components have version 1.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns whether the component was declared OPTIONAL.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns whether the component must be present in a value.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// Returns the optimized DEFAULT value of the component.
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the type of the component.
    ///
    /// If automatic tagging was applied, this is the tagged type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type as it was declared.
    pub fn declared_type(&self) -> &TypeRef {
        &self.declared
    }

    /// Returns whether the declaration itself carried a tag.
    pub fn is_explicitly_tagged(&self) -> bool {
        self.explicitly_tagged
    }

    /// Returns the tags an encoding of the component can start with.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}


//------------ CollectionLayout ----------------------------------------------

/// The compiled, flattened components of a collection type.
#[derive(Clone, Debug)]
pub struct CollectionLayout {
    pub(super) components: Vec<ComponentType>,
    pub(super) extension_range: Option<(usize, usize)>,
    pub(super) all_optional: bool,
}

impl CollectionLayout {
    /// Returns the components in index order.
    pub fn components(&self) -> &[ComponentType] {
        &self.components
    }

    /// Returns the component with the given name.
    pub fn component(&self, name: &str) -> Option<&ComponentType> {
        self.components.iter().find(|item| item.name == name)
    }

    /// Returns the component whose encoding can start with `tag`.
    pub fn component_by_tag(&self, tag: Tag) -> Option<&ComponentType> {
        self.components.iter().find(|item| item.has_tag(tag))
    }

    /// Returns the inclusive index range of all extension additions.
    pub fn extension_range(&self) -> Option<(usize, usize)> {
        self.extension_range
    }

    /// Returns whether `index` lies within the extension range.
    pub fn in_extension_range(&self, index: usize) -> bool {
        self.extension_range.is_some_and(|(start, end)| {
            (start..=end).contains(&index)
        })
    }

    /// Returns whether no component is required.
    pub fn is_all_optional(&self) -> bool {
        self.all_optional
    }

    /// Returns the first component that is required but missing.
    ///
    /// Considers components with an index strictly between `after` and
    /// `before` and a version not exceeding `version`. An `after` of `None`
    /// starts at the very first component, a `before` of `None` goes to the
    /// end.
    pub fn missing_required(
        &self, after: Option<usize>, before: Option<usize>, version: u32
    ) -> Option<&ComponentType> {
        let start = after.map_or(0, |idx| idx + 1);
        let end = before.unwrap_or(self.components.len());
        self.components.get(start..end)?.iter().find(|item| {
            item.is_required() && item.version <= version
        })
    }
}
