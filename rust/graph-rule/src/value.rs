use crate::{Data, Model, ModelError};
use graph_rule_common::Deferred;
use std::fmt::{Debug, Formatter};
use std::future::Future;

/// A field value that is still being computed.
///
/// A pending value never settles into another pending value: stages that
/// produce asynchronous results are flattened into a single [`Deferred`].
pub type Pending = Deferred<Value, ModelError>;

/// The result of reading a model field.
#[derive(Clone, Default)]
pub enum Value {
    /// The field has no rule or the raw field is absent.
    #[default]
    Undefined,
    /// Raw data passed through as-is.
    Data(Data),
    /// A child model instance.
    Model(Model),
    /// A materialized list of child values.
    List(Vec<Value>),
    /// A value that settles later.
    Pending(Pending),
    /// A callable field bound to its instance.
    Method(BoundMethod),
    /// An error-like value returned by `read_fail` as data. Failures compare
    /// equal when their messages do.
    Failure(ModelError),
}

impl Value {
    /// JSON `null`.
    pub fn null() -> Self {
        Value::Data(Data::Null)
    }

    /// A value that settles once `future` completes.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, ModelError>> + Send + 'static,
    {
        Value::Pending(Deferred::new(async move {
            match future.await? {
                Value::Pending(inner) => inner.await,
                value => Ok(value),
            }
        }))
    }

    /// Lift raw data into a value. Deferred raw data becomes a pending value
    /// that settles with the eventual raw data.
    pub fn from_data(data: Data) -> Self {
        match data {
            Data::Deferred(deferred) => Value::Pending(Deferred::new(async move {
                let mut data = deferred.await?;
                loop {
                    match data {
                        Data::Deferred(next) => data = next.await?,
                        data => return Ok(Value::Data(data)),
                    }
                }
            })),
            data => Value::Data(data),
        }
    }

    /// Wait for the value to settle. Values that are already available are
    /// returned immediately.
    pub async fn settle(self) -> Result<Value, ModelError> {
        match self {
            Value::Pending(pending) => pending.await,
            value => Ok(value),
        }
    }

    /// Apply `f` now, or once the value settles if it is pending.
    pub fn then<F>(self, f: F) -> Result<Value, ModelError>
    where
        F: FnOnce(Value) -> Result<Value, ModelError> + Send + 'static,
    {
        match self {
            Value::Pending(pending) => Ok(Value::pending(async move { f(pending.await?) })),
            value => f(value),
        }
    }

    /// Whether the value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether the value is raw `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(Data::Null))
    }

    /// Whether the value is still pending.
    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending(_))
    }

    /// Truthiness as used by read predicates: undefined and falsy raw data
    /// are falsy, models, lists, methods and failures are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Data(data) => data.is_truthy(),
            _ => true,
        }
    }

    /// The raw data, if this is passed-through data.
    pub fn as_data(&self) -> Option<&Data> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    /// The child instance, if this is one.
    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    /// The child instance, if this is one.
    pub fn into_model(self) -> Option<Model> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    /// The materialized list, if this is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The bound method, if this field is callable.
    pub fn as_method(&self) -> Option<&BoundMethod> {
        match self {
            Value::Method(method) => Some(method),
            _ => None,
        }
    }

    /// The failure returned as data, if any.
    pub fn as_failure(&self) -> Option<&ModelError> {
        match self {
            Value::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// Shorthand for the raw boolean.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(Data::as_bool)
    }

    /// Shorthand for the raw integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(Data::as_i64)
    }

    /// Shorthand for the raw string.
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Data::as_str)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Model(a), Value::Model(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Pending(a), Value::Pending(b)) => a.ptr_eq(b),
            (Value::Method(a), Value::Method(b)) => a == b,
            (Value::Failure(a), Value::Failure(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Data(data) => data.fmt(f),
            Value::Model(model) => model.fmt(f),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Pending(_) => f.write_str("Pending"),
            Value::Method(method) => method.fmt(f),
            Value::Failure(error) => f.debug_tuple("Failure").field(error).finish(),
        }
    }
}

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        Value::from_data(data)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Data(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Data(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Data(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Data(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Data(value.into())
    }
}

impl From<Model> for Value {
    fn from(model: Model) -> Self {
        Value::Model(model)
    }
}

/// A method field bound to the instance it was read from.
///
/// Each call goes through the field's pre-read gate, runs the raw method and
/// pipes its result through materialization and the access check. Calls are
/// never cached.
#[derive(Clone)]
pub struct BoundMethod {
    model: Model,
    field: String,
}

impl BoundMethod {
    pub(crate) fn new(model: Model, field: impl Into<String>) -> Self {
        Self {
            model,
            field: field.into(),
        }
    }

    /// Invoke the method with `args`.
    pub fn call<I, A>(&self, args: I) -> Result<Value, ModelError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Data>,
    {
        self.model.call(&self.field, args)
    }

    /// The instance the method is bound to.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The name of the method field.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl PartialEq for BoundMethod {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.field == other.field
    }
}

impl Debug for BoundMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Method({}.{})", self.model.type_name(), self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_compares_failures_by_message() {
        let failure = Value::Failure(ModelError::message("denied"));

        assert_eq!(failure, failure.clone());
        assert_eq!(failure, Value::Failure(ModelError::message("denied")));
        assert_ne!(failure, Value::Failure(ModelError::message("hidden")));
        assert_ne!(failure, Value::from("denied"));
    }
}
