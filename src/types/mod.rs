//! The type graph.
//!
//! All types live in a [`Schema`]. Types refer to each other either through
//! the [`TypeId`] handed out when adding a type or through the name given to
//! it when defining it. Before a type can be used for anything, it needs to
//! be compiled via [`Schema::compile`]. Compilation resolves all references,
//! flattens the components of collection types, and checks the declarations
//! for errors. A type that fails to compile stays unusable.
//!
//! Compiled types are never modified again. They can be shared freely
//! between concurrent validation, encoding, and decoding operations.

pub use self::builtin::Builtin;
pub use self::collection::{
    CollectionKind, CollectionLayout, CollectionType, ComponentDecl,
    ComponentType,
};

use std::fmt;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use smallvec::{SmallVec, smallvec};
use crate::constraint::Constraint;
use crate::error::{SchemaError, ValueError};
use crate::scope::Scope;
use crate::tag::{Tag, TagMethod};
use crate::value::Value;

mod builtin;
mod collection;
mod compile;
mod traverse;


//------------ TypeId --------------------------------------------------------

/// The handle of a type within its schema.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TypeId(usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}


//------------ TypeRef -------------------------------------------------------

/// A reference to a type.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TypeRef {
    /// A type given by its handle.
    Id(TypeId),

    /// A type given by the name it was defined under.
    Named(String),
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        TypeRef::Id(id)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.into())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Named(name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeRef::Id(id) => id.fmt(f),
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}


//------------ State ---------------------------------------------------------

/// The compilation state of a type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Unvalidated,
    Validating,
    Done,
    Failed,
}


//------------ Family --------------------------------------------------------

/// The family of a type.
///
/// The family determines the semantics of the values of a type. Tagging or
/// naming a type does not change its family.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Family {
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
    Sequence,
    Set,
    Choice,
    SequenceOf,
    SetOf,
}

impl Family {
    /// Returns whether values of the family are encoded constructed.
    ///
    /// For CHOICE, this depends on the chosen alternative and the method
    /// returns `false`.
    pub fn is_constructed(self) -> bool {
        matches!(
            self,
            Family::Sequence | Family::Set
            | Family::SequenceOf | Family::SetOf
        )
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Family::Boolean => "BOOLEAN",
            Family::Integer => "INTEGER",
            Family::Null => "NULL",
            Family::OctetString => "OCTET STRING",
            Family::ObjectIdentifier => "OBJECT IDENTIFIER",
            Family::Utf8String => "UTF8String",
            Family::PrintableString => "PrintableString",
            Family::Ia5String => "IA5String",
            Family::VisibleString => "VisibleString",
            Family::UtcTime => "UTCTime",
            Family::GeneralizedTime => "GeneralizedTime",
            Family::Sequence => "SEQUENCE",
            Family::Set => "SET",
            Family::Choice => "CHOICE",
            Family::SequenceOf => "SEQUENCE OF",
            Family::SetOf => "SET OF",
        })
    }
}


//------------ Type ----------------------------------------------------------

/// The declaration of a type.
#[derive(Clone, Debug)]
pub struct Type {
    kind: TypeKind,
    constraints: Vec<Arc<dyn Constraint>>,
}

/// The different kinds of types.
#[derive(Clone, Debug)]
pub enum TypeKind {
    /// One of the built-in leaf types.
    Builtin(Builtin),

    /// A collection type.
    Collection(CollectionType),

    /// A tagged type.
    Tagged(TaggedType),

    /// A reference to another type.
    Defined(TypeRef),
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type { kind, constraints: Vec::new() }
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(TypeKind::Builtin(builtin))
    }

    /// Creates a type by tagging another type.
    pub fn tagged(
        tag: Tag, method: TagMethod, inner: impl Into<TypeRef>
    ) -> Self {
        Self::new(TypeKind::Tagged(TaggedType {
            tag, method, inner: inner.into()
        }))
    }

    /// Creates a type referring to another type.
    pub fn defined(target: impl Into<TypeRef>) -> Self {
        Self::new(TypeKind::Defined(target.into()))
    }

    /// Adds a constraint to the type.
    pub fn with_constraint(
        mut self, constraint: impl Constraint + 'static
    ) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn constraints(&self) -> &[Arc<dyn Constraint>] {
        &self.constraints
    }

    /// Returns an uncompiled copy of the declaration.
    pub fn copy(&self) -> Type {
        let kind = match self.kind {
            TypeKind::Collection(ref coll) => {
                TypeKind::Collection(coll.copy())
            }
            ref kind => kind.clone(),
        };
        Type { kind, constraints: self.constraints.clone() }
    }
}

impl From<Builtin> for Type {
    fn from(builtin: Builtin) -> Self {
        Self::builtin(builtin)
    }
}

impl From<CollectionType> for Type {
    fn from(coll: CollectionType) -> Self {
        Self::new(TypeKind::Collection(coll))
    }
}


//------------ TaggedType ----------------------------------------------------

/// A type with an added tag.
#[derive(Clone, Debug)]
pub struct TaggedType {
    tag: Tag,
    method: TagMethod,
    inner: TypeRef,
}

impl TaggedType {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Returns the tagging method.
    ///
    /// After compilation, implicitly tagged untagged CHOICE types have been
    /// changed to explicit tagging.
    pub fn method(&self) -> TagMethod {
        self.method
    }

    pub fn inner(&self) -> &TypeRef {
        &self.inner
    }
}


//------------ Schema --------------------------------------------------------

/// A collection of types and values.
///
/// Type handles are only meaningful for the schema that issued them.
/// Methods returning a `Result` report a foreign handle as
/// [`SchemaError::UnresolvedType`].
///
/// # Panics
///
/// Methods that don’t return a `Result`, such as [`get`][Self::get],
/// [`state`][Self::state], or [`describe`][Self::describe], panic if
/// given a handle not issued by this schema.
#[derive(Debug, Default)]
pub struct Schema {
    nodes: Vec<Node>,
    names: HashMap<String, TypeId>,
    values: HashMap<String, Value>,
}

#[derive(Debug)]
struct Node {
    ty: Type,
    name: Option<String>,
    state: State,
}

/// The number of references followed before assuming a cycle.
const MAX_REF_HOPS: usize = 64;

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an anonymous type and returns its handle.
    pub fn add(&mut self, ty: impl Into<Type>) -> TypeId {
        self.push_node(ty.into(), None)
    }

    /// Adds a named type and returns its handle.
    pub fn define(
        &mut self, name: impl Into<String>, ty: impl Into<Type>
    ) -> Result<TypeId, SchemaError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(SchemaError::DuplicateName(name))
        }
        let id = self.push_node(ty.into(), Some(name.clone()));
        self.names.insert(name, id);
        Ok(id)
    }

    fn push_node(&mut self, ty: Type, name: Option<String>) -> TypeId {
        let id = TypeId(self.nodes.len());
        self.nodes.push(Node { ty, name, state: State::Unvalidated });
        id
    }

    /// Defines a named value.
    ///
    /// Named values can be referred to via [`Value::Ref`].
    pub fn define_value(
        &mut self, name: impl Into<String>, value: Value
    ) -> Result<(), SchemaError> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(SchemaError::DuplicateName(name))
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Returns the named value with the given name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns the handle of the named type.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Returns the declaration of a type.
    ///
    /// # Panics
    ///
    /// The method panics if the handle was not issued by this schema.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.node(id).ty
    }

    fn node(&self, id: TypeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: TypeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Returns the name a type was defined under.
    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    /// Returns a description of the type for diagnostics.
    pub fn describe(&self, id: TypeId) -> String {
        match self.node(id).name {
            Some(ref name) => name.clone(),
            None => format!("<anonymous {}>", id),
        }
    }

    /// Returns the compilation state of a type.
    pub fn state(&self, id: TypeId) -> State {
        self.node(id).state
    }

    /// Resolves a type reference.
    pub fn resolve(&self, type_ref: &TypeRef) -> Result<TypeId, SchemaError> {
        match type_ref {
            TypeRef::Id(id) if id.0 < self.nodes.len() => Ok(*id),
            TypeRef::Id(id) => {
                Err(SchemaError::UnresolvedType(id.to_string()))
            }
            TypeRef::Named(name) => {
                self.lookup(name).ok_or_else(|| {
                    SchemaError::UnresolvedType(name.clone())
                })
            }
        }
    }

    /// Returns an error if the type is not ready for use.
    pub(crate) fn require_compiled(&self, id: TypeId) -> Result<(), SchemaError> {
        let id = self.resolve(&id.into())?;
        match self.state(id) {
            State::Done => Ok(()),
            State::Failed => Err(SchemaError::Failed(self.describe(id))),
            _ => Err(SchemaError::NotCompiled(self.describe(id))),
        }
    }

    /// Follows references until reaching a type that isn’t one.
    fn dereference(&self, id: TypeId) -> Result<TypeId, SchemaError> {
        let mut res = self.resolve(&id.into())?;
        for _ in 0..MAX_REF_HOPS {
            match self.node(res).ty.kind {
                TypeKind::Defined(ref target) => res = self.resolve(target)?,
                _ => return Ok(res)
            }
        }
        Err(SchemaError::CyclicDefinition(self.describe(id)))
    }

    /// Follows references and tags until reaching the underlying type.
    fn underlying(&self, id: TypeId) -> Result<TypeId, SchemaError> {
        let mut res = self.resolve(&id.into())?;
        for _ in 0..MAX_REF_HOPS {
            match self.node(res).ty.kind {
                TypeKind::Defined(ref target) => res = self.resolve(target)?,
                TypeKind::Tagged(ref tagged) => {
                    res = self.resolve(&tagged.inner)?
                }
                _ => return Ok(res)
            }
        }
        Err(SchemaError::CyclicDefinition(self.describe(id)))
    }

    /// Returns the family of a type.
    pub fn family(&self, id: TypeId) -> Result<Family, SchemaError> {
        match self.node(self.underlying(id)?).ty.kind {
            TypeKind::Builtin(builtin) => Ok(builtin.family()),
            TypeKind::Collection(ref coll) => Ok(coll.kind().family()),
            _ => Err(SchemaError::UnresolvedType(self.describe(id))),
        }
    }

    /// Returns whether a type is a CHOICE type without a tag of its own.
    pub fn is_untagged_choice(&self, id: TypeId) -> Result<bool, SchemaError> {
        Ok(matches!(
            self.node(self.dereference(id)?).ty.kind,
            TypeKind::Collection(ref coll)
                if coll.kind() == CollectionKind::Choice
        ))
    }

    /// Returns the compiled layout of a collection type.
    ///
    /// References to other types are followed. Returns `None` if the type
    /// is not a collection or hasn’t been compiled.
    pub fn layout(&self, id: TypeId) -> Option<&CollectionLayout> {
        match self.node(self.dereference(id).ok()?).ty.kind {
            TypeKind::Collection(ref coll) => coll.layout(),
            _ => None,
        }
    }

    /// Returns the tags the encoding of a type can start with.
    ///
    /// This is a single tag for all types except untagged CHOICE types,
    /// where it is the tags of all the alternatives.
    pub fn outer_tags(
        &self, id: TypeId
    ) -> Result<SmallVec<[Tag; 4]>, SchemaError> {
        let id = self.dereference(id)?;
        match self.node(id).ty.kind {
            TypeKind::Builtin(builtin) => Ok(smallvec![builtin.tag()]),
            TypeKind::Tagged(ref tagged) => Ok(smallvec![tagged.tag]),
            TypeKind::Collection(ref coll) => {
                if let Some(tag) = coll.kind().tag() {
                    return Ok(smallvec![tag])
                }
                let layout = coll.layout().ok_or_else(|| {
                    SchemaError::NotCompiled(self.describe(id))
                })?;
                Ok(layout.components().iter().flat_map(|item| {
                    item.tags().iter().copied()
                }).collect())
            }
            TypeKind::Defined(_) => {
                Err(SchemaError::CyclicDefinition(self.describe(id)))
            }
        }
    }

    /// Adds an uncompiled copy of a type and returns its handle.
    ///
    /// The copy is anonymous.
    pub fn copy_type(&mut self, id: TypeId) -> TypeId {
        let ty = self.get(id).copy();
        self.push_node(ty, None)
    }

    /// Checks that a value is a valid value of a type.
    pub fn accept(&self, id: TypeId, value: &Value) -> Result<(), ValueError> {
        self.accept_in(&Scope::new(self), id, value)
    }

    /// Returns the canonical form of a value of a type.
    ///
    /// This also checks that the value is valid. Value references are
    /// replaced by the values they refer to and components equal to their
    /// default are removed. If the value is already in canonical form, it
    /// is returned borrowed.
    pub fn optimize<'v>(
        &self, id: TypeId, value: &'v Value
    ) -> Result<Cow<'v, Value>, ValueError> {
        self.optimize_in(&Scope::new(self), id, value)
    }

    pub(crate) fn accept_in(
        &self, scope: &Scope, id: TypeId, value: &Value
    ) -> Result<(), ValueError> {
        self.require_compiled(id)?;
        let scope = scope.typed(id);
        let value = scope.resolve_value(value)?;
        let node = self.node(id);
        match node.ty.kind {
            TypeKind::Builtin(builtin) => builtin.accept(value)?,
            TypeKind::Collection(ref coll) => {
                traverse::accept(self, &scope, coll, value)?
            }
            TypeKind::Tagged(ref tagged) => {
                self.accept_in(&scope, self.resolve(&tagged.inner)?, value)?
            }
            TypeKind::Defined(ref target) => {
                self.accept_in(&scope, self.resolve(target)?, value)?
            }
        }
        for constraint in &node.ty.constraints {
            constraint.check(&scope, value)?;
        }
        Ok(())
    }

    pub(crate) fn optimize_in<'v>(
        &self, scope: &Scope, id: TypeId, value: &'v Value
    ) -> Result<Cow<'v, Value>, ValueError> {
        if let Value::Ref(_) = value {
            let resolved = scope.resolve_value(value)?;
            return self.optimize_in(scope, id, resolved).map(|res| {
                Cow::Owned(res.into_owned())
            })
        }

        self.require_compiled(id)?;
        let scope = scope.typed(id);
        let node = self.node(id);
        let res = match node.ty.kind {
            TypeKind::Builtin(builtin) => {
                builtin.accept(value)?;
                Cow::Borrowed(value)
            }
            TypeKind::Collection(ref coll) => {
                traverse::optimize(self, &scope, coll, value)?
            }
            TypeKind::Tagged(ref tagged) => {
                self.optimize_in(&scope, self.resolve(&tagged.inner)?, value)?
            }
            TypeKind::Defined(ref target) => {
                self.optimize_in(&scope, self.resolve(target)?, value)?
            }
        };
        for constraint in &node.ty.constraints {
            constraint.check(&scope, &res)?;
        }
        Ok(res)
    }
}


//============ Tests =========================================================
