use std::{collections::BTreeMap, rc::Rc};

use parse_display::Display;

use crate::value::{Record, Value};


/// A structural patch over a record.
///
/// Each entry names a field and how it changes; fields not named are carried
/// into the next value by reference. Build one with the chaining methods:
///
/// ```
/// use coreflux::Diff;
/// let diff = Diff::new()
///     .set("name", "x")
///     .with("count", |v| (v.as_int().unwrap_or(0) + 1).into());
/// ```
#[derive(Clone, Default)]
pub struct Diff(BTreeMap<String, Patch>);

impl Diff {
    pub fn new() -> Diff {
        Diff::default()
    }

    /// Replaces the field with a literal value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Diff {
        self.0.insert(key.into(), Patch::Value(value.into()));
        self
    }

    /// Transforms the field with a function of its current value.
    pub fn with(mut self, key: impl Into<String>, f: impl Fn(&Value) -> Value + 'static) -> Diff {
        self.0.insert(key.into(), Patch::with(f));
        self
    }

    /// Recursively patches the record at the field.
    pub fn nest(mut self, key: impl Into<String>, diff: Diff) -> Diff {
        self.0.insert(key.into(), Patch::Diff(diff));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Patch)> {
        self.0.iter().map(|(key, patch)| (key.as_str(), patch))
    }
}

impl FromIterator<(String, Patch)> for Diff {
    fn from_iter<I: IntoIterator<Item = (String, Patch)>>(entries: I) -> Diff {
        Diff(entries.into_iter().collect())
    }
}

/// One change to one field: a literal replacement, a transform of the
/// current value, or a nested [`Diff`].
#[derive(Clone)]
pub enum Patch {
    Value(Value),
    With(Rc<dyn Fn(&Value) -> Value>),
    Diff(Diff),
}

impl Patch {
    pub fn value(value: impl Into<Value>) -> Patch {
        Patch::Value(value.into())
    }
    pub fn with(f: impl Fn(&Value) -> Value + 'static) -> Patch {
        Patch::With(Rc::new(f))
    }
}

impl From<Value> for Patch {
    fn from(value: Value) -> Patch {
        Patch::Value(value)
    }
}
impl From<Diff> for Patch {
    fn from(diff: Diff) -> Patch {
        Patch::Diff(diff)
    }
}

/// The diff handed to an update was a bare transform function rather than a
/// structural patch.
#[derive(Display, Debug)]
#[display("the top-level diff must be a structural patch, not a bare transform function")]
pub struct InvalidDiffError {}

impl std::error::Error for InvalidDiffError {}

/// Applies `diff` to `current` without mutating it, sharing every untouched
/// subtree with the original.
///
/// When `current` is not a record (so there are no current fields to merge
/// into), the diff is applied to an empty record and transforms see
/// `Value::Null`. An empty diff returns `current` itself.
pub fn merge(current: &Value, diff: &Diff) -> Value {
    if diff.is_empty() {
        return current.clone();
    }
    let mut record = match current {
        Value::Record(record) => (**record).clone(),
        _ => Record::new(),
    };
    for (key, patch) in diff.iter() {
        let field = record.get(key).cloned().unwrap_or(Value::Null);
        record.insert(key.to_owned(), apply_field(&field, patch));
    }
    Value::Record(Rc::new(record))
}

fn apply_field(current: &Value, patch: &Patch) -> Value {
    match patch {
        Patch::Value(value) => value.clone(),
        Patch::With(f) => f(current),
        Patch::Diff(diff) => merge(current, diff),
    }
}

/// Applies a top-level patch: a [`Patch::Diff`] merges, a [`Patch::Value`]
/// replaces the whole state, and a bare [`Patch::With`] is rejected.
pub fn apply(current: &Value, patch: &Patch) -> Result<Value, InvalidDiffError> {
    match patch {
        Patch::Value(value) => Ok(value.clone()),
        Patch::With(_) => Err(InvalidDiffError {}),
        Patch::Diff(diff) => Ok(merge(current, diff)),
    }
}
