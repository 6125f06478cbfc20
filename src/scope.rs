//! Lexical context for resolution and traversal.
//!
//! Every operation on a schema starts with a module-level scope and pushes
//! a child scope for each type it descends into and for each collection
//! value it walks. Scopes live on the stack of the operation and are
//! dropped when it returns.

use crate::error::ValueError;
use crate::types::{Schema, TypeId};
use crate::value::{Value, ValueCollection};


//------------ Scope ---------------------------------------------------------

/// One level of lexical context.
#[derive(Clone, Copy, Debug)]
pub struct Scope<'a> {
    schema: &'a Schema,
    parent: Option<&'a Scope<'a>>,
    level: Level<'a>,
    depth: usize,
}

#[derive(Clone, Copy, Debug)]
enum Level<'a> {
    Module,
    Type(TypeId),
    Value(&'a ValueCollection),
}

/// The number of value references followed before giving up.
const MAX_VALUE_HOPS: usize = 32;

impl<'a> Scope<'a> {
    /// Creates the top-level scope of a schema.
    pub fn new(schema: &'a Schema) -> Self {
        Scope { schema, parent: None, level: Level::Module, depth: 0 }
    }

    /// Creates a child scope for descending into a type.
    pub fn typed(&self, id: TypeId) -> Scope<'_> {
        self.child(Level::Type(id))
    }

    /// Creates a child scope for walking a collection value.
    pub fn with_value_level<'s>(
        &'s self, value: &'s ValueCollection
    ) -> Scope<'s> {
        self.child(Level::Value(value))
    }

    fn child<'s>(&'s self, level: Level<'s>) -> Scope<'s> {
        Scope {
            schema: self.schema,
            parent: Some(self),
            level,
            depth: self.depth + 1,
        }
    }

    /// Returns the schema the scope belongs to.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Returns the number of levels above this scope.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the type of the closest typed scope.
    pub fn current_type(&self) -> Option<TypeId> {
        self.levels().find_map(|level| match level {
            Level::Type(id) => Some(id),
            _ => None
        })
    }

    /// Returns the collection value currently being walked.
    pub fn value_level(&self) -> Option<&'a ValueCollection> {
        self.levels().find_map(|level| match level {
            Level::Value(value) => Some(value),
            _ => None
        })
    }

    fn levels(&self) -> impl Iterator<Item = Level<'a>> + '_ {
        std::iter::successors(Some(self), |scope| scope.parent).map(|scope| {
            scope.level
        })
    }

    /// Resolves a value reference.
    ///
    /// Returns the value itself if it isn’t a reference.
    pub fn resolve_value<'v>(
        &self, value: &'v Value
    ) -> Result<&'v Value, ValueError>
    where 'a: 'v {
        let mut res = value;
        for _ in 0..MAX_VALUE_HOPS {
            match res {
                Value::Ref(name) => {
                    res = self.schema.value(name).ok_or_else(|| {
                        ValueError::UnresolvedValue(name.clone())
                    })?;
                }
                _ => return Ok(res)
            }
        }
        match value {
            Value::Ref(name) => Err(ValueError::UnresolvedValue(name.clone())),
            _ => Ok(value)
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::types::{Builtin, Type};
    use super::*;

    #[test]
    fn levels() {
        let mut schema = Schema::new();
        let int = schema.add(Type::builtin(Builtin::Integer));
        let outer = ValueCollection::new().with("a", 1i64);
        let inner = ValueCollection::new().with("b", 2i64);

        let top = Scope::new(&schema);
        assert_eq!(top.current_type(), None);
        assert!(top.value_level().is_none());

        let typed = top.typed(int);
        let walked = typed.with_value_level(&outer);
        let nested = walked.with_value_level(&inner);
        assert_eq!(nested.depth(), 3);
        assert_eq!(nested.current_type(), Some(int));
        assert_eq!(nested.value_level(), Some(&inner));
        assert_eq!(walked.value_level(), Some(&outer));
    }

    #[test]
    fn resolve_value() {
        let mut schema = Schema::new();
        schema.define_value("one", Value::Integer(1)).unwrap();
        schema.define_value("uno", Value::Ref("one".into())).unwrap();
        schema.define_value("loop", Value::Ref("loop".into())).unwrap();
        let scope = Scope::new(&schema);

        let two = Value::Integer(2);
        assert_eq!(scope.resolve_value(&two), Ok(&two));
        assert_eq!(
            scope.resolve_value(&Value::Ref("uno".into())),
            Ok(&Value::Integer(1))
        );
        assert_eq!(
            scope.resolve_value(&Value::Ref("nope".into())),
            Err(ValueError::UnresolvedValue("nope".into()))
        );
        assert!(scope.resolve_value(&Value::Ref("loop".into())).is_err());
    }
}
