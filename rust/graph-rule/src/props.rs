use crate::model::Instance;
use crate::{Model, ModelError, PropFn, Value};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

/// Derived properties of one instance.
///
/// Each property is computed from the instance the first time it is read and
/// memoized for the lifetime of the container. Containers are never shared
/// between instances.
#[derive(Clone)]
pub struct Props {
    inner: Arc<PropsState>,
}

struct PropsState {
    owner: Weak<Instance>,
    model: String,
    table: Arc<IndexMap<String, PropFn>>,
    values: Mutex<HashMap<String, Value>>,
}

impl Props {
    pub(crate) fn new(
        owner: Weak<Instance>,
        model: &str,
        table: Arc<IndexMap<String, PropFn>>,
    ) -> Self {
        Self {
            inner: Arc::new(PropsState {
                owner,
                model: model.to_string(),
                table,
                values: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The value of `name`; [`Value::Undefined`] if no such property exists.
    pub fn get(&self, name: &str) -> Result<Value, ModelError> {
        if let Some(value) = self.inner.values.lock().get(name) {
            return Ok(value.clone());
        }
        let Some(prop) = self.inner.table.get(name) else {
            return Ok(Value::Undefined);
        };

        let owner = self
            .inner
            .owner
            .upgrade()
            .map(Model::from_instance)
            .ok_or_else(|| ModelError::Destroyed {
                model: self.inner.model.clone(),
                field: format!("$props.{name}"),
            })?;

        // The property may read other properties, so it runs unlocked. If a
        // reentrant read got there first, its value wins.
        let value = prop(&owner)?;
        Ok(self
            .inner
            .values
            .lock()
            .entry(name.to_string())
            .or_insert(value)
            .clone())
    }

    /// Names of every property, evaluated or not.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.table.keys().map(String::as_str)
    }

    /// Whether `name` has been computed already.
    pub fn is_evaluated(&self, name: &str) -> bool {
        self.inner.values.lock().contains_key(name)
    }
}

impl Debug for Props {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Props")
            .field("model", &self.inner.model)
            .field("names", &self.inner.table.keys().collect::<Vec<_>>())
            .finish()
    }
}
