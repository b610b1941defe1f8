use std::{any::Any, collections::BTreeMap, fmt, rc::Rc};

use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::{self, SerializeMap, SerializeSeq},
    Deserialize, Serialize,
};

#[cfg(test)]
mod tests;

/// The field map backing [`Value::Record`].
pub type Record = BTreeMap<String, Value>;

/// An immutable, structurally shared value tree.
///
/// `Value` is the shape states and event payload fragments take inside a
/// store. Str, List, Record and Opaque share their interior through `Rc`,
/// so cloning a `Value` never copies a subtree and a published value can
/// never be written through: there is no mutating API and the shared
/// interiors cannot be borrowed mutably.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Record(Rc<Record>),
    /// An application value the store treats as an indivisible leaf.
    /// Compared by identity and always replaced wholesale, never merged.
    Opaque(Rc<dyn Any>),
}

impl Value {
    /// Builds a record from key/value entries.
    pub fn record<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Record(Rc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// Wraps an application value as an opaque leaf.
    pub fn opaque(value: impl Any) -> Value {
        Value::Opaque(Rc::new(value))
    }

    /// The field at `key`, or `None` when this is not a record or the key
    /// is absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(record) => record.get(key),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Identity comparison: pointer equality for shared variants, value
    /// equality for primitives and strings.
    ///
    /// This is the comparison the store uses to decide whether a transition
    /// produced a new state. Two records with equal contents but distinct
    /// allocations are *not* the same.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Field-wise identity comparison of two records.
///
/// Returns `true` when both values are records with the same key set and
/// every field is [`Value::same`]. Non-record values fall back to
/// [`Value::same`].
pub fn shallow_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Record(a), Value::Record(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| value.same(other)))
        }
        _ => a.same(b),
    }
}

impl PartialEq for Value {
    /// Deep structural equality; opaque leaves compare by identity.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(value) => fmt::Debug::fmt(value, f),
            Value::Int(value) => fmt::Debug::fmt(value, f),
            Value::Float(value) => fmt::Debug::fmt(value, f),
            Value::Str(value) => fmt::Debug::fmt(value, f),
            Value::List(values) => f.debug_list().entries(values.iter()).finish(),
            Value::Record(record) => f.debug_map().entries(record.iter()).finish(),
            Value::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}
impl From<i32> for Value {
    fn from(value: i32) -> Value {
        Value::Int(value.into())
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Value {
        Value::Int(value)
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Float(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Str(Rc::from(value))
    }
}
impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Str(Rc::from(value))
    }
}
impl From<Record> for Value {
    fn from(value: Record) -> Value {
        Value::Record(Rc::new(value))
    }
}
impl<T> From<Vec<T>> for Value
where
    Value: From<T>,
{
    fn from(values: Vec<T>) -> Value {
        Value::List(values.into_iter().map(Value::from).collect())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::Str(value) => serializer.serialize_str(value),
            Value::List(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values.iter() {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (key, value) in record.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Opaque(_) => Err(ser::Error::custom("opaque value")),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a value tree")
    }

    fn visit_bool<E>(self, value: bool) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Bool(value))
    }
    fn visit_i64<E>(self, value: i64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Int(value))
    }
    fn visit_u64<E>(self, value: u64) -> Result<Value, E>
    where
        E: de::Error,
    {
        if let Ok(value) = i64::try_from(value) {
            Ok(Value::Int(value))
        } else {
            Ok(Value::Float(value as f64))
        }
    }
    fn visit_f64<E>(self, value: f64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Float(value))
    }
    fn visit_str<E>(self, value: &str) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(value))
    }
    fn visit_string<E>(self, value: String) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(value))
    }
    fn visit_unit<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }
    fn visit_none<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }
    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }
    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values: Vec<Value> = Vec::new();
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(Value::List(Rc::from(values)))
    }
    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut record = Record::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            record.insert(key, value);
        }
        Ok(Value::Record(Rc::new(record)))
    }
}
