use crate::{Context, Data, ModelError, ModelType, Props, Record, TypeRef, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

/// An instance of a [`ModelType`] wrapping one raw record.
///
/// Instances form a tree: children are created lazily when a child field is
/// read and keep a weak link to their parent and to the root of the tree. The
/// [`Context`] given to the root is shared by every descendant.
///
/// `Model` is a handle; clones refer to the same instance and compare equal.
///
/// - [`get`](Model::get) reads a field through its compiled pipeline
/// - [`call`](Model::call) invokes a method field
/// - [`overwrite`](Model::overwrite) replaces a field's value until the cache
///   is cleared
/// - [`destroy`](Model::destroy) releases the instance's state; every later
///   field access fails with [`ModelError::Destroyed`]
#[derive(Clone)]
pub struct Model {
    inner: Arc<Instance>,
}

pub(crate) struct Instance {
    ty: ModelType,
    state: RwLock<Option<State>>,
}

struct State {
    data: Record,
    context: Context,
    parent: Option<Weak<Instance>>,
    /// `None` on the root itself.
    root: Option<Weak<Instance>>,
    cache: HashMap<String, Slot>,
    props: Option<Props>,
    next_slot: u64,
}

/// A cached field value. The id tells a pending entry apart from whatever
/// replaced it by the time it settles.
struct Slot {
    value: Value,
    id: u64,
}

impl Model {
    pub(crate) fn new(
        ty: ModelType,
        data: Record,
        context: Context,
        parent: Option<Weak<Instance>>,
        root: Option<Weak<Instance>>,
    ) -> Self {
        Self {
            inner: Arc::new(Instance {
                ty,
                state: RwLock::new(Some(State {
                    data,
                    context,
                    parent,
                    root,
                    cache: HashMap::new(),
                    props: None,
                    next_slot: 0,
                })),
            }),
        }
    }

    pub(crate) fn from_instance(inner: Arc<Instance>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<Instance> {
        Arc::downgrade(&self.inner)
    }

    /// Read `field`.
    ///
    /// Fields without a rule are [`Value::Undefined`]. Method fields yield a
    /// [`Value::Method`] bound to this instance.
    pub fn get(&self, field: &str) -> Result<Value, ModelError> {
        self.ensure_alive(field)?;
        match self.inner.ty.field(field) {
            Some(accessor) => accessor.read(self),
            None => Ok(Value::Undefined),
        }
    }

    /// Invoke the method field `field` with `args`.
    ///
    /// Every call runs the raw method again; results are never cached.
    pub fn call<I, A>(&self, field: &str, args: I) -> Result<Value, ModelError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Data>,
    {
        self.ensure_alive(field)?;
        match self.inner.ty.field(field) {
            Some(accessor) => accessor.call(self, args.into_iter().map(Into::into).collect()),
            None => Err(ModelError::NotCallable {
                model: self.type_name().to_string(),
                field: field.to_string(),
            }),
        }
    }

    /// Assign `value` to `field`. Reads return it until the field's cache is
    /// cleared, after which the field is computed from raw data again.
    pub fn overwrite(&self, field: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        self.remember(field, value.into()).map(|_| ())
    }

    /// Forget the cached value of `field`.
    pub fn clear_cache(&self, field: &str) {
        if let Some(state) = self.inner.state.write().as_mut() {
            if state.cache.remove(field).is_some() {
                tracing::trace!(model = %self.type_name(), %field, "cleared cached field");
            }
        }
    }

    /// Forget every cached value.
    pub fn clear_all_caches(&self) {
        if let Some(state) = self.inner.state.write().as_mut() {
            tracing::trace!(
                model = %self.type_name(),
                count = state.cache.len(),
                "cleared all cached fields"
            );
            state.cache.clear();
        }
    }

    /// The raw record, exactly as it was given.
    pub fn data(&self) -> Result<Record, ModelError> {
        self.record("$data")
    }

    /// The raw value of `field`, bypassing every rule.
    pub fn raw(&self, field: &str) -> Result<Option<Data>, ModelError> {
        Ok(self.record(field)?.get(field))
    }

    /// The context shared by the whole tree.
    pub fn context(&self) -> Result<Context, ModelError> {
        self.with_state("$context", |state| state.context.clone())
    }

    /// The instance whose field produced this one. `None` for the root, a
    /// destroyed instance, or a parent that no longer exists.
    pub fn parent(&self) -> Option<Model> {
        let guard = self.inner.state.read();
        let parent = guard.as_ref()?.parent.as_ref()?.upgrade()?;
        Some(Model::from_instance(parent))
    }

    /// The root of the tree. The root is its own root.
    pub fn root(&self) -> Option<Model> {
        let guard = self.inner.state.read();
        match &guard.as_ref()?.root {
            None => Some(self.clone()),
            Some(root) => root.upgrade().map(Model::from_instance),
        }
    }

    /// The derived properties of this instance, created on first use.
    pub fn props(&self) -> Result<Props, ModelError> {
        let mut guard = self.inner.state.write();
        let state = guard.as_mut().ok_or_else(|| self.destroyed("$props"))?;
        let props = state.props.get_or_insert_with(|| {
            Props::new(
                self.downgrade(),
                self.inner.ty.name(),
                self.inner.ty.props_table().clone(),
            )
        });
        Ok(props.clone())
    }

    /// Shorthand for reading the derived property `name`.
    pub fn prop(&self, name: &str) -> Result<Value, ModelError> {
        self.props()?.get(name)
    }

    /// The nearest ancestor, excluding this instance, that is an instance of
    /// `ty` or of a model extending it.
    pub fn parent_of_type(&self, ty: impl Into<TypeRef>) -> Result<Option<Model>, ModelError> {
        let ty = self.inner.ty.lookup(ty)?;
        let mut current = self.parent();
        while let Some(ancestor) = current {
            if ancestor.model_type().is_a(&ty) {
                return Ok(Some(ancestor));
            }
            current = ancestor.parent();
        }
        Ok(None)
    }

    /// Whether this instance's model mixes in `interface`.
    pub fn implements(&self, interface: impl Into<TypeRef>) -> Result<bool, ModelError> {
        let interface = self.inner.ty.lookup(interface)?;
        Ok(self.inner.ty.implements(&interface))
    }

    /// Whether this instance's model is `ty` or extends it.
    pub fn is_a(&self, ty: impl Into<TypeRef>) -> Result<bool, ModelError> {
        let ty = self.inner.ty.lookup(ty)?;
        Ok(self.inner.ty.is_a(&ty))
    }

    /// The instance's model.
    pub fn model_type(&self) -> &ModelType {
        &self.inner.ty
    }

    /// The instance's model name.
    pub fn type_name(&self) -> &str {
        self.inner.ty.name()
    }

    /// Wrap `data` into a child of this instance. `null` yields `None`.
    pub fn create_child(
        &self,
        ty: impl Into<TypeRef>,
        data: impl Into<Data>,
    ) -> Result<Option<Model>, ModelError> {
        let ty = self.inner.ty.lookup(ty)?;
        match data.into() {
            Data::Null => Ok(None),
            Data::Record(record) => {
                let (context, root) = self.with_state("$children", |state| {
                    let root = state.root.clone().unwrap_or_else(|| self.downgrade());
                    (state.context.clone(), root)
                })?;
                Ok(Some(Model::new(
                    ty,
                    record,
                    context,
                    Some(self.downgrade()),
                    Some(root),
                )))
            }
            _ => Err(ModelError::UnexpectedData {
                model: ty.name().to_string(),
                expected: "a record or null",
            }),
        }
    }

    /// Wrap every record of `data` into a child of this instance. `null`
    /// yields `None`, as do `null` items.
    pub fn create_children(
        &self,
        ty: impl Into<TypeRef>,
        data: impl Into<Data>,
    ) -> Result<Option<Vec<Option<Model>>>, ModelError> {
        let ty = self.inner.ty.lookup(ty)?;
        match data.into() {
            Data::Null => Ok(None),
            Data::List(items) => items
                .into_iter()
                .map(|item| self.create_child(&ty, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            _ => Err(ModelError::UnexpectedData {
                model: ty.name().to_string(),
                expected: "a list or null",
            }),
        }
    }

    /// Release the raw data, the tree links, the context and every cached
    /// value.
    pub fn destroy(&self) {
        let state = self.inner.state.write().take();
        if state.is_some() {
            tracing::debug!(model = %self.type_name(), "destroyed instance");
        }
    }

    /// Whether [`destroy`](Model::destroy) was called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.read().is_none()
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn record(&self, field: &str) -> Result<Record, ModelError> {
        self.with_state(field, |state| state.data.clone())
    }

    pub(crate) fn cached(&self, field: &str) -> Result<Option<Value>, ModelError> {
        self.with_state(field, |state| {
            state.cache.get(field).map(|slot| slot.value.clone())
        })
    }

    /// Store `value` as the cached value of `field` and return what should be
    /// handed to the reader.
    ///
    /// A pending value is wrapped so that, once it settles, the entry is
    /// replaced by the settled value, or evicted if it failed.
    pub(crate) fn remember(&self, field: &str, value: Value) -> Result<Value, ModelError> {
        let mut guard = self.inner.state.write();
        let state = guard.as_mut().ok_or_else(|| self.destroyed(field))?;
        state.next_slot += 1;
        let id = state.next_slot;

        let value = match value {
            Value::Pending(pending) => {
                let owner = self.downgrade();
                let name = field.to_string();
                Value::pending(async move {
                    let result = pending.await;
                    if let Some(owner) = owner.upgrade() {
                        Model::from_instance(owner).settle(&name, id, &result);
                    }
                    result
                })
            }
            value => value,
        };

        tracing::trace!(model = %self.type_name(), %field, "cached field");
        state.cache.insert(
            field.to_string(),
            Slot {
                value: value.clone(),
                id,
            },
        );
        Ok(value)
    }

    fn settle(&self, field: &str, id: u64, result: &Result<Value, ModelError>) {
        let mut guard = self.inner.state.write();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if state.cache.get(field).is_none_or(|slot| slot.id != id) {
            return;
        }
        match result {
            Ok(value) => {
                tracing::trace!(model = %self.type_name(), %field, "settled cached field");
                state.cache.insert(
                    field.to_string(),
                    Slot {
                        value: value.clone(),
                        id,
                    },
                );
            }
            Err(_) => {
                tracing::trace!(model = %self.type_name(), %field, "evicted failed field");
                state.cache.remove(field);
            }
        }
    }

    fn with_state<T>(&self, field: &str, f: impl FnOnce(&State) -> T) -> Result<T, ModelError> {
        let guard = self.inner.state.read();
        let state = guard.as_ref().ok_or_else(|| self.destroyed(field))?;
        Ok(f(state))
    }

    fn ensure_alive(&self, field: &str) -> Result<(), ModelError> {
        self.with_state(field, |_| ())
    }

    fn destroyed(&self, field: &str) -> ModelError {
        ModelError::Destroyed {
            model: self.type_name().to_string(),
            field: field.to_string(),
        }
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Model {}

impl Debug for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct(self.type_name());
        match self.inner.state.try_read().as_deref() {
            Some(Some(state)) => debug.field("data", &state.data),
            Some(None) => debug.field("destroyed", &true),
            None => debug.field("data", &"<locked>"),
        };
        debug.finish()
    }
}
