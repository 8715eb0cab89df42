use serde_json::Value as Json;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

static NULL: Json = Json::Null;

/// Externally supplied, read-only state shared by every instance of a tree,
/// typically the current viewer or session.
///
/// Clones share the same document; [`ptr_eq`](Context::ptr_eq) tells whether
/// two instances were given the same context.
#[derive(Clone)]
pub struct Context(Arc<Json>);

impl Context {
    /// Wrap a JSON document.
    pub fn new(document: Json) -> Self {
        Self(Arc::new(document))
    }

    /// The member stored under `key`, or `Json::Null` when absent.
    pub fn get(&self, key: &str) -> &Json {
        self.0.get(key).unwrap_or(&NULL)
    }

    /// Whether both handles share the same document.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Json::Object(Default::default()))
    }
}

impl Deref for Context {
    type Target = Json;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Json> for Context {
    fn from(document: Json) -> Self {
        Self::new(document)
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Context").field(&self.0).finish()
    }
}
