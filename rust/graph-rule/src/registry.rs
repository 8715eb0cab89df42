use crate::{Config, ModelError, ModelType, TypeRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// A name → definition table for models, together with the rule defaults
/// applied to models defined through it.
///
/// Cloning a `Registry` yields another handle to the same table. Most
/// programs use the process-wide [`Registry::global`]; tests typically create
/// their own so that they can run in isolation.
///
/// Names are unique for the lifetime of the table: defining a model under a
/// name that is already taken fails with [`ModelError::DuplicateModel`],
/// including when two definitions race for the same name. Only
/// [`reset_all`](Registry::reset_all) frees names for reuse.
#[derive(Clone)]
pub struct Registry {
    state: Arc<RegistryState>,
}

/// A handle that does not keep the registry alive. Definitions hold one so
/// that a registry and the models registered in it do not own each other.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryState>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<Registry> {
        self.0.upgrade().map(|state| Registry { state })
    }
}

/// Identifies one registry between two resets. Anything resolved by name
/// stays valid only while the epoch it was resolved in is current.
#[derive(Clone)]
pub(crate) struct Epoch {
    registry: WeakRegistry,
    generation: u64,
}

impl Epoch {
    pub(crate) fn is_current(&self, registry: &Registry) -> bool {
        Weak::as_ptr(&self.registry.0) == Arc::as_ptr(&registry.state)
            && self.generation == registry.state.generation.load(Ordering::Acquire)
    }
}

struct RegistryState {
    models: RwLock<HashMap<String, ModelType>>,
    config: RwLock<Config>,
    generation: AtomicU64,
}

impl Registry {
    /// An empty registry configured with [`Config::builtin`].
    pub fn new() -> Self {
        Self {
            state: Arc::new(RegistryState {
                models: RwLock::new(HashMap::new()),
                config: RwLock::new(Config::builtin()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.state))
    }

    pub(crate) fn epoch(&self) -> Epoch {
        Epoch {
            registry: self.downgrade(),
            generation: self.state.generation.load(Ordering::Acquire),
        }
    }

    pub(crate) fn register(&self, ty: ModelType) -> Result<(), ModelError> {
        let mut models = self.state.models.write();
        if models.contains_key(ty.name()) {
            return Err(ModelError::DuplicateModel {
                name: ty.name().to_string(),
            });
        }
        tracing::debug!(model = %ty.name(), "registered model");
        models.insert(ty.name().to_string(), ty);
        Ok(())
    }

    /// Resolve a model reference. Definitions are returned as they are;
    /// names must be registered.
    pub fn lookup(&self, reference: impl Into<TypeRef>) -> Result<ModelType, ModelError> {
        match reference.into() {
            TypeRef::Type(ty) => Ok(ty),
            TypeRef::Name(name) => self
                .get(&name)
                .ok_or(ModelError::UnknownModel { name }),
        }
    }

    /// The model registered under `name`.
    pub fn get(&self, name: &str) -> Option<ModelType> {
        self.state.models.read().get(name).cloned()
    }

    /// Whether a model is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.state.models.read().contains_key(name)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget every registered model so that names can be defined again.
    ///
    /// Definitions and instances that are still held elsewhere keep working,
    /// but they are no longer reachable by name, and type names they refer to
    /// are looked up again on their next read.
    pub fn reset_all(&self) {
        let mut models = self.state.models.write();
        tracing::debug!(count = models.len(), "resetting model registry");
        models.clear();
        self.state.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Update the rule defaults. Only the members set in `config` change.
    ///
    /// Defaults are applied when a model is defined, so models defined
    /// earlier keep the defaults they were compiled with.
    pub fn configure(&self, config: Config) {
        tracing::debug!(?config, "updating rule defaults");
        self.state.config.write().merge(config);
    }

    /// The current rule defaults.
    pub fn config(&self) -> Config {
        self.state.config.read().clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.names())
            .finish()
    }
}

/// Update the rule defaults of the process-wide registry.
pub fn configure(config: Config) {
    Registry::global().configure(config)
}

/// Forget every model registered in the process-wide registry.
pub fn reset_all() {
    Registry::global().reset_all()
}

/// Resolve a model reference through the process-wide registry.
pub fn lookup(reference: impl Into<TypeRef>) -> Result<ModelType, ModelError> {
    Registry::global().lookup(reference)
}
