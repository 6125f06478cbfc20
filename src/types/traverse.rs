//! Walking collection values.
//!
//! Validation and optimization of collection values share the same walk
//! over the entries of the value. The walk matches each entry to a
//! component, checks ordering and presence rules, and hands matched entries
//! to a [`Visitor`].

use std::borrow::Cow;
use std::cmp;
use std::collections::HashSet;
use crate::error::{SchemaError, ValueError};
use crate::scope::Scope;
use crate::value::{NamedValue, Value, ValueCollection};
use super::Schema;
use super::collection::{
    CollectionKind, CollectionLayout, CollectionType, ComponentType,
};


//------------ Entry points --------------------------------------------------

/// Checks that `value` is a valid value of a collection type.
pub(super) fn accept(
    schema: &Schema,
    scope: &Scope,
    coll: &CollectionType,
    value: &Value,
) -> Result<(), ValueError> {
    let layout = compiled_layout(scope, coll)?;
    if coll.kind().is_list() {
        let element = element(layout)?;
        for item in list(coll, value)? {
            schema.accept_in(scope, element.type_id(), item)?;
        }
        return Ok(())
    }
    let values = collection(coll, value)?;
    let scope = scope.with_value_level(values);
    walk(coll, layout, &scope, values, &mut Acceptor { schema })
}

/// Returns the canonical form of a value of a collection type.
pub(super) fn optimize<'v>(
    schema: &Schema,
    scope: &Scope,
    coll: &CollectionType,
    value: &'v Value,
) -> Result<Cow<'v, Value>, ValueError> {
    let layout = compiled_layout(scope, coll)?;
    if coll.kind().is_list() {
        let element = element(layout)?;
        let items = list(coll, value)?;
        let mut changed = false;
        let mut res = Vec::with_capacity(items.len());
        for item in items {
            let item = schema.optimize_in(scope, element.type_id(), item)?;
            changed |= matches!(item, Cow::Owned(_));
            res.push(item);
        }
        if !changed {
            return Ok(Cow::Borrowed(value))
        }
        return Ok(Cow::Owned(Value::List(
            res.into_iter().map(Cow::into_owned).collect()
        )))
    }

    let values = collection(coll, value)?;
    let scope = scope.with_value_level(values);
    let mut optimizer = Optimizer {
        schema,
        entries: Vec::with_capacity(values.len()),
        changed: false,
    };
    walk(coll, layout, &scope, values, &mut optimizer)?;
    if coll.kind() == CollectionKind::Set {
        optimizer.sort();
    }
    Ok(optimizer.finish(value))
}


//------------ Helpers -------------------------------------------------------

fn compiled_layout<'c>(
    scope: &Scope, coll: &'c CollectionType
) -> Result<&'c CollectionLayout, ValueError> {
    coll.layout().ok_or_else(|| {
        let name = match scope.current_type() {
            Some(id) => scope.schema().describe(id),
            None => coll.kind().family().to_string(),
        };
        SchemaError::NotCompiled(name).into()
    })
}

fn element(layout: &CollectionLayout) -> Result<&ComponentType, ValueError> {
    layout.components().first().ok_or_else(|| {
        ValueError::IllegalValue("list type without element type".into())
    })
}

fn list<'v>(
    coll: &CollectionType, value: &'v Value
) -> Result<&'v [Value], ValueError> {
    value.as_list().ok_or_else(|| {
        ValueError::IllegalValue(format!(
            "{} value expected, found {}", coll.kind().family(), value.kind()
        ))
    })
}

fn collection<'v>(
    coll: &CollectionType, value: &'v Value
) -> Result<&'v ValueCollection, ValueError> {
    value.as_collection().ok_or_else(|| {
        ValueError::IllegalValue(format!(
            "{} value expected, found {}", coll.kind().family(), value.kind()
        ))
    })
}

fn missing(component: &ComponentType) -> ValueError {
    ValueError::MissingRequired {
        name: component.name().into(),
        index: component.index(),
    }
}


//------------ Visitor -------------------------------------------------------

/// Receives the entries of a collection value during a walk.
trait Visitor<'v> {
    /// Processes an entry matched to a component.
    fn component(
        &mut self,
        scope: &Scope,
        component: &ComponentType,
        entry: &'v NamedValue,
    ) -> Result<(), ValueError>;

    /// Processes an entry not matching any component.
    ///
    /// This is only called if the type allows the entry.
    fn unknown(&mut self, entry: &'v NamedValue) -> Result<(), ValueError>;
}


//------------ Walking -------------------------------------------------------

fn walk<'v>(
    coll: &CollectionType,
    layout: &CollectionLayout,
    scope: &Scope,
    values: &'v ValueCollection,
    visitor: &mut impl Visitor<'v>,
) -> Result<(), ValueError> {
    if values.is_empty() && coll.kind() != CollectionKind::Choice {
        if layout.is_all_optional() {
            return Ok(())
        }
        return Err(ValueError::EmptyValue)
    }
    match coll.kind() {
        CollectionKind::Sequence => {
            walk_ordered(coll, layout, scope, values, visitor)
        }
        CollectionKind::Set => {
            walk_unordered(coll, layout, scope, values, visitor)
        }
        CollectionKind::Choice => {
            walk_choice(coll, layout, scope, values, visitor)
        }
        CollectionKind::SequenceOf | CollectionKind::SetOf => {
            Err(ValueError::IllegalValue(
                "list type walked as collection".into()
            ))
        }
    }
}

/// Walks the entries of a SEQUENCE value.
///
/// Entries must appear in index order. A required component may only be
/// skipped if its version is higher than that of any component present
/// so far.
fn walk_ordered<'v>(
    coll: &CollectionType,
    layout: &CollectionLayout,
    scope: &Scope,
    values: &'v ValueCollection,
    visitor: &mut impl Visitor<'v>,
) -> Result<(), ValueError> {
    let mut previous: Option<usize> = None;
    let mut version = 1;
    for entry in values {
        let Some(component) = layout.component(entry.name()) else {
            if !coll.allows_unknown(previous) {
                return Err(ValueError::UnknownComponent(entry.name().into()))
            }
            visitor.unknown(entry)?;
            continue
        };
        if previous.is_some_and(|previous| component.index() <= previous) {
            return Err(ValueError::Order(entry.name().into()))
        }
        version = cmp::max(version, component.version());
        if let Some(component) = layout.missing_required(
            previous, Some(component.index()), version
        ) {
            return Err(missing(component))
        }
        visitor.component(scope, component, entry)?;
        previous = Some(component.index());
    }
    match layout.missing_required(previous, None, version) {
        Some(component) => Err(missing(component)),
        None => Ok(())
    }
}

/// Walks the entries of a SET value.
///
/// Entries may appear in any order but at most once.
fn walk_unordered<'v>(
    coll: &CollectionType,
    layout: &CollectionLayout,
    scope: &Scope,
    values: &'v ValueCollection,
    visitor: &mut impl Visitor<'v>,
) -> Result<(), ValueError> {
    let mut seen = HashSet::new();
    let mut version = 1;
    for entry in values {
        let Some(component) = layout.component(entry.name()) else {
            if !coll.allows_unknown(None) {
                return Err(ValueError::UnknownComponent(entry.name().into()))
            }
            visitor.unknown(entry)?;
            continue
        };
        if !seen.insert(component.index()) {
            return Err(ValueError::Order(entry.name().into()))
        }
        version = cmp::max(version, component.version());
        visitor.component(scope, component, entry)?;
    }
    match layout.components().iter().find(|component| {
        component.is_required()
            && component.version() <= version
            && !seen.contains(&component.index())
    }) {
        Some(component) => Err(missing(component)),
        None => Ok(())
    }
}

/// Walks the single entry of a CHOICE value.
fn walk_choice<'v>(
    coll: &CollectionType,
    layout: &CollectionLayout,
    scope: &Scope,
    values: &'v ValueCollection,
    visitor: &mut impl Visitor<'v>,
) -> Result<(), ValueError> {
    let entry = match values.as_slice() {
        [entry] => entry,
        [] => return Err(ValueError::EmptyValue),
        _ => {
            return Err(ValueError::IllegalValue(
                "more than one alternative chosen".into()
            ))
        }
    };
    match layout.component(entry.name()) {
        Some(component) => visitor.component(scope, component, entry),
        None if coll.allows_unknown(None) => visitor.unknown(entry),
        None => Err(ValueError::UnknownComponent(entry.name().into())),
    }
}


//------------ Acceptor ------------------------------------------------------

struct Acceptor<'s> {
    schema: &'s Schema,
}

impl<'v> Visitor<'v> for Acceptor<'_> {
    fn component(
        &mut self,
        scope: &Scope,
        component: &ComponentType,
        entry: &'v NamedValue,
    ) -> Result<(), ValueError> {
        self.schema.accept_in(scope, component.type_id(), entry.value())
    }

    fn unknown(&mut self, _entry: &'v NamedValue) -> Result<(), ValueError> {
        Ok(())
    }
}


//------------ Optimizer -----------------------------------------------------

struct Optimizer<'s, 'v> {
    schema: &'s Schema,
    entries: Vec<Entry<'v>>,
    changed: bool,
}

struct Entry<'v> {
    /// The component index or `None` for unknown components.
    index: Option<usize>,
    name: &'v str,
    value: Cow<'v, Value>,
}

impl<'v> Entry<'v> {
    fn sort_key(&self) -> usize {
        self.index.unwrap_or(usize::MAX)
    }
}

impl<'v> Optimizer<'_, 'v> {
    /// Brings the entries into index order.
    ///
    /// Unknown entries go last, keeping their relative order.
    fn sort(&mut self) {
        let sorted = self.entries.windows(2).all(|pair| match pair {
            [left, right] => left.sort_key() <= right.sort_key(),
            _ => true
        });
        if !sorted {
            self.entries.sort_by_key(Entry::sort_key);
            self.changed = true;
        }
    }

    fn finish(self, value: &'v Value) -> Cow<'v, Value> {
        if !self.changed {
            return Cow::Borrowed(value)
        }
        Cow::Owned(Value::Collection(
            self.entries.into_iter().map(|entry| {
                NamedValue::new(entry.name, entry.value.into_owned())
            }).collect()
        ))
    }
}

impl<'v> Visitor<'v> for Optimizer<'_, 'v> {
    fn component(
        &mut self,
        scope: &Scope,
        component: &ComponentType,
        entry: &'v NamedValue,
    ) -> Result<(), ValueError> {
        let value = self.schema.optimize_in(
            scope, component.type_id(), entry.value()
        )?;
        if component.default() == Some(value.as_ref()) {
            self.changed = true;
            return Ok(())
        }
        if let Cow::Owned(_) = value {
            self.changed = true;
        }
        self.entries.push(Entry {
            index: Some(component.index()),
            name: entry.name(),
            value
        });
        Ok(())
    }

    fn unknown(&mut self, entry: &'v NamedValue) -> Result<(), ValueError> {
        self.entries.push(Entry {
            index: None,
            name: entry.name(),
            value: Cow::Borrowed(entry.value()),
        });
        Ok(())
    }
}


//============ Tests =========================================================
