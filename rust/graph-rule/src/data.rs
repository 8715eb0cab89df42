use crate::ModelError;
use graph_rule_common::Deferred;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Number;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

/// A raw value that becomes available later.
pub type DeferredData = Deferred<Data, ModelError>;

type GetterFn = dyn Fn(&Record) -> Result<Data, ModelError> + Send + Sync;
type MethodFn = dyn Fn(&Record, &[Data]) -> Result<Data, ModelError> + Send + Sync;

/// Raw payload data wrapped by model instances.
///
/// Besides the JSON shapes, raw data may carry values that are computed
/// rather than stored: a [`Deferred`] value that resolves later, a
/// [`Getter`] that is evaluated every time the raw field is read, and a
/// [`Method`] that is invoked with call-time arguments.
#[derive(Clone, Default)]
pub enum Data {
    /// JSON `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(Number),
    /// A string.
    String(String),
    /// An ordered list of raw values.
    List(Vec<Data>),
    /// A nested record.
    Record(Record),
    /// A raw value that resolves later.
    Deferred(DeferredData),
    /// A raw value computed on every read.
    Getter(Getter),
    /// A callable raw value.
    Method(Method),
}

impl Data {
    /// Raw data that resolves once `future` completes.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Data, ModelError>> + Send + 'static,
    {
        Data::Deferred(Deferred::new(future))
    }

    /// Raw data computed from the owning record on every read.
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn(&Record) -> Result<Data, ModelError> + Send + Sync + 'static,
    {
        Data::Getter(Getter(Arc::new(getter)))
    }

    /// Raw data that is invoked with the owning record and call arguments.
    pub fn method<F>(method: F) -> Self
    where
        F: Fn(&Record, &[Data]) -> Result<Data, ModelError> + Send + Sync + 'static,
    {
        Data::Method(Method(Arc::new(method)))
    }

    /// Whether this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Data::Null)
    }

    /// Truthiness: `null`, `false`, zero and the empty string are falsy,
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Data::Null => false,
            Data::Bool(value) => *value,
            Data::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
            Data::String(value) => !value.is_empty(),
            _ => true,
        }
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The number as `i64`, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Number(number) => number.as_i64(),
            _ => None,
        }
    }

    /// The number as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Data::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// The string slice, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::String(value) => Some(value),
            _ => None,
        }
    }

    /// The nested record, if this is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Data::Record(record) => Some(record),
            _ => None,
        }
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Data::List(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Null, Data::Null) => true,
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Number(a), Data::Number(b)) => a == b,
            (Data::String(a), Data::String(b)) => a == b,
            (Data::List(a), Data::List(b)) => a == b,
            (Data::Record(a), Data::Record(b)) => a == b,
            (Data::Deferred(a), Data::Deferred(b)) => a.ptr_eq(b),
            (Data::Getter(a), Data::Getter(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Data::Method(a), Data::Method(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Data::Null => f.write_str("Null"),
            Data::Bool(value) => write!(f, "Bool({value})"),
            Data::Number(value) => write!(f, "Number({value})"),
            Data::String(value) => write!(f, "String({value:?})"),
            Data::List(items) => f.debug_tuple("List").field(items).finish(),
            Data::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Data::Deferred(_) => f.write_str("Deferred"),
            Data::Getter(_) => f.write_str("Getter"),
            Data::Method(_) => f.write_str("Method"),
        }
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Data::Null,
            serde_json::Value::Bool(value) => Data::Bool(value),
            serde_json::Value::Number(number) => Data::Number(number),
            serde_json::Value::String(value) => Data::String(value),
            serde_json::Value::Array(items) => {
                Data::List(items.into_iter().map(Data::from).collect())
            }
            serde_json::Value::Object(map) => Data::Record(Record::from(map)),
        }
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Data::Bool(value)
    }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self {
        Data::Number(value.into())
    }
}

impl From<i32> for Data {
    fn from(value: i32) -> Self {
        Data::Number(value.into())
    }
}

impl From<u64> for Data {
    fn from(value: u64) -> Self {
        Data::Number(value.into())
    }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Data::Null, Data::Number)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::String(value.to_string())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::String(value)
    }
}

impl From<Record> for Data {
    fn from(record: Record) -> Self {
        Data::Record(record)
    }
}

impl<T: Into<Data>> From<Vec<T>> for Data {
    fn from(items: Vec<T>) -> Self {
        Data::List(items.into_iter().map(Into::into).collect())
    }
}

/// A raw value evaluated on every read of its field.
#[derive(Clone)]
pub struct Getter(Arc<GetterFn>);

impl Getter {
    /// Evaluate the getter against the record that holds it.
    pub fn get(&self, record: &Record) -> Result<Data, ModelError> {
        (self.0)(record)
    }
}

/// A callable raw value.
#[derive(Clone)]
pub struct Method(Arc<MethodFn>);

impl Method {
    /// Invoke the method with the record that holds it as receiver.
    pub fn call(&self, record: &Record, args: &[Data]) -> Result<Data, ModelError> {
        (self.0)(record, args)
    }
}

/// A shared, mutable, ordered map of raw fields.
///
/// Cloning a `Record` yields another handle to the same fields; model
/// instances keep the handle they were constructed with, so changes made
/// through [`set`](Record::set) are visible to every holder.
#[derive(Clone, Default)]
pub struct Record {
    fields: Arc<RwLock<IndexMap<String, Data>>>,
}

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Record::set).
    pub fn with(self, key: impl Into<String>, value: impl Into<Data>) -> Self {
        self.set(key, value);
        self
    }

    /// The raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Data> {
        self.fields.read().get(key).cloned()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Data>) -> Option<Data> {
        self.fields.write().insert(key.into(), value.into())
    }

    /// Remove the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Data> {
        self.fields.write().shift_remove(key)
    }

    /// Whether a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.read().contains_key(key)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// Whether both handles refer to the same fields.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (left, right) = (self.fields.read(), other.fields.read());
        left.len() == right.len()
            && left
                .iter()
                .all(|(key, value)| right.get(key).is_some_and(|other| other == value))
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.fields.read().iter()).finish()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: Arc::new(RwLock::new(
                map.into_iter()
                    .map(|(key, value)| (key, Data::from(value)))
                    .collect(),
            )),
        }
    }
}

impl<K: Into<String>, V: Into<Data>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: Arc::new(RwLock::new(
                iter.into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            )),
        }
    }
}
