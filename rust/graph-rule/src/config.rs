use crate::{IntoVerdict, Model, ModelError, Value, Verdict};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Predicate consulted before a field's raw value is read.
pub type PreReadFn = Arc<dyn Fn(&Model, &str) -> Result<Verdict, ModelError> + Send + Sync>;

/// Predicate consulted once a field's value has been resolved.
pub type ReadFn = Arc<dyn Fn(&Model, &str, &Value) -> Result<Verdict, ModelError> + Send + Sync>;

/// Produces the result of a denied read, or raises.
pub type ReadFailFn = Arc<dyn Fn(&Model, &str, &Value) -> Result<Value, ModelError> + Send + Sync>;

/// A read gate: a constant decision or a predicate.
pub enum Gate<F> {
    /// Always permitted.
    Allow,
    /// Always denied.
    Deny,
    /// Decided by a predicate.
    When(F),
}

impl<F: Clone> Clone for Gate<F> {
    fn clone(&self) -> Self {
        match self {
            Gate::Allow => Gate::Allow,
            Gate::Deny => Gate::Deny,
            Gate::When(predicate) => Gate::When(predicate.clone()),
        }
    }
}

impl<F> From<bool> for Gate<F> {
    fn from(allowed: bool) -> Self {
        if allowed { Gate::Allow } else { Gate::Deny }
    }
}

impl<F> Debug for Gate<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Gate::Allow => f.write_str("Allow"),
            Gate::Deny => f.write_str("Deny"),
            Gate::When(_) => f.write_str("When(..)"),
        }
    }
}

/// What a denied read produces.
#[derive(Clone)]
pub enum ReadFail {
    /// Return this value.
    Value(Value),
    /// Return this error as data ([`Value::Failure`]); it is not raised.
    Failure(ModelError),
    /// Call this handler; it may return a value or raise by returning `Err`.
    With(ReadFailFn),
}

impl ReadFail {
    /// Normalize into a handler so that callers always invoke a function.
    pub(crate) fn into_handler(self) -> ReadFailFn {
        match self {
            ReadFail::With(handler) => handler,
            ReadFail::Value(value) => {
                Arc::new(move |_: &Model, _: &str, _: &Value| Ok(value.clone()))
            }
            ReadFail::Failure(error) => Arc::new(move |_: &Model, _: &str, _: &Value| {
                Ok(Value::Failure(error.clone()))
            }),
        }
    }
}

impl Debug for ReadFail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadFail::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ReadFail::Failure(error) => f.debug_tuple("Failure").field(error).finish(),
            ReadFail::With(_) => f.write_str("With(..)"),
        }
    }
}

pub(crate) fn pre_read_fn<F, R>(predicate: F) -> PreReadFn
where
    F: Fn(&Model, &str) -> R + Send + Sync + 'static,
    R: IntoVerdict,
{
    Arc::new(move |model: &Model, field: &str| predicate(model, field).into_verdict())
}

pub(crate) fn read_fn<F, R>(predicate: F) -> ReadFn
where
    F: Fn(&Model, &str, &Value) -> R + Send + Sync + 'static,
    R: IntoVerdict,
{
    Arc::new(move |model: &Model, field: &str, value: &Value| {
        predicate(model, field, value).into_verdict()
    })
}

/// Defaults for the `pre_read`, `read`, `read_fail` and `cache` members of a
/// field rule.
///
/// Used both as the process-wide configuration of a
/// [`Registry`](crate::Registry) and as a model's default rule. Every member
/// is optional; unset members fall through to the next layer of defaults.
///
/// ```rust
/// use graph_rule::{Config, ModelError};
///
/// let config = Config::new()
///     .read(true)
///     .read_fail_with(|_, field, _| Err(ModelError::message(format!("Cannot access '{field}'"))));
/// ```
#[derive(Clone, Default)]
pub struct Config {
    pub(crate) pre_read: Option<Gate<PreReadFn>>,
    pub(crate) read: Option<Gate<ReadFn>>,
    pub(crate) read_fail: Option<ReadFail>,
    pub(crate) cache: Option<bool>,
}

impl Config {
    /// A configuration with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in defaults: everything readable, denied reads yield
    /// `null`, values are cached.
    pub fn builtin() -> Self {
        Self {
            pre_read: Some(Gate::Allow),
            read: Some(Gate::Allow),
            read_fail: Some(ReadFail::Value(Value::null())),
            cache: Some(true),
        }
    }

    /// Constant pre-read decision.
    pub fn pre_read(mut self, allowed: bool) -> Self {
        self.pre_read = Some(allowed.into());
        self
    }

    /// Pre-read predicate.
    pub fn pre_read_when<F, R>(mut self, predicate: F) -> Self
    where
        F: Fn(&Model, &str) -> R + Send + Sync + 'static,
        R: IntoVerdict,
    {
        self.pre_read = Some(Gate::When(pre_read_fn(predicate)));
        self
    }

    /// Constant read decision.
    pub fn read(mut self, allowed: bool) -> Self {
        self.read = Some(allowed.into());
        self
    }

    /// Read predicate.
    pub fn read_when<F, R>(mut self, predicate: F) -> Self
    where
        F: Fn(&Model, &str, &Value) -> R + Send + Sync + 'static,
        R: IntoVerdict,
    {
        self.read = Some(Gate::When(read_fn(predicate)));
        self
    }

    /// Denied reads return `value`.
    pub fn read_fail(mut self, value: impl Into<Value>) -> Self {
        self.read_fail = Some(ReadFail::Value(value.into()));
        self
    }

    /// Denied reads return `error` as data.
    pub fn read_fail_error(mut self, error: ModelError) -> Self {
        self.read_fail = Some(ReadFail::Failure(error));
        self
    }

    /// Denied reads are answered by `handler`.
    pub fn read_fail_with<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Model, &str, &Value) -> Result<Value, ModelError> + Send + Sync + 'static,
    {
        self.read_fail = Some(ReadFail::With(Arc::new(handler)));
        self
    }

    /// Whether resolved values are cached.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Overwrite the members that are set in `other`, keeping the rest.
    pub(crate) fn merge(&mut self, other: Config) {
        if let Some(pre_read) = other.pre_read {
            self.pre_read = Some(pre_read);
        }
        if let Some(read) = other.read {
            self.read = Some(read);
        }
        if let Some(read_fail) = other.read_fail {
            self.read_fail = Some(read_fail);
        }
        if let Some(cache) = other.cache {
            self.cache = Some(cache);
        }
    }

    /// Fill the members that are unset from `fallback`.
    pub(crate) fn or(mut self, fallback: &Config) -> Config {
        self.pre_read = self.pre_read.or_else(|| fallback.pre_read.clone());
        self.read = self.read.or_else(|| fallback.read.clone());
        self.read_fail = self.read_fail.or_else(|| fallback.read_fail.clone());
        self.cache = self.cache.or(fallback.cache);
        self
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("pre_read", &self.pre_read)
            .field("read", &self.read)
            .field("read_fail", &self.read_fail)
            .field("cache", &self.cache)
            .finish()
    }
}
