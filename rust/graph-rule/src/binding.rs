use crate::definition::Definition;
use crate::registry::Epoch;
use crate::{ModelError, ModelType};
use parking_lot::RwLock;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Weak};

/// A reference to a model, either by name or by definition.
///
/// Names are resolved through a [`Registry`](crate::Registry) when they are
/// used, which lets models refer to each other regardless of the order they
/// are defined in.
#[derive(Clone)]
pub enum TypeRef {
    /// A model referred to by its registered name.
    Name(String),
    /// A model referred to directly.
    Type(ModelType),
}

impl TypeRef {
    /// The name of the referenced model.
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Name(name) => name,
            TypeRef::Type(ty) => ty.name(),
        }
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Name(name)
    }
}

impl From<ModelType> for TypeRef {
    fn from(ty: ModelType) -> Self {
        TypeRef::Type(ty)
    }
}

impl From<&ModelType> for TypeRef {
    fn from(ty: &ModelType) -> Self {
        TypeRef::Type(ty.clone())
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Debug for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Name(name) => write!(f, "Name({name:?})"),
            TypeRef::Type(ty) => write!(f, "Type({:?})", ty.name()),
        }
    }
}

/// A late-bound [`TypeRef`].
///
/// A successful resolution is remembered together with the registry epoch it
/// was made in, so later uses skip the registry until that registry is reset
/// or the binding is resolved on behalf of a model from another registry.
/// Inherited fields share their binding with the base model, which may live
/// in a different registry. The cell only holds a weak reference: definitions
/// refer to each other through their fields, and a strong one would keep
/// mutually recursive models alive after a registry reset. Failed
/// resolutions are not remembered.
pub(crate) struct Binding {
    reference: TypeRef,
    resolved: RwLock<Option<Resolved>>,
}

struct Resolved {
    epoch: Epoch,
    definition: Weak<Definition>,
}

impl Binding {
    pub(crate) fn new(reference: TypeRef) -> Self {
        Self {
            reference,
            resolved: RwLock::new(None),
        }
    }

    pub(crate) fn reference(&self) -> &TypeRef {
        &self.reference
    }

    /// Resolve through the registry `owner` was defined in.
    pub(crate) fn resolve(&self, owner: &ModelType) -> Result<ModelType, ModelError> {
        let name = match &self.reference {
            TypeRef::Type(ty) => return Ok(ty.clone()),
            TypeRef::Name(name) => name,
        };

        let Some(registry) = owner.registry() else {
            return Err(ModelError::UnknownModel { name: name.clone() });
        };

        let remembered = self
            .resolved
            .read()
            .as_ref()
            .filter(|resolved| resolved.epoch.is_current(&registry))
            .and_then(|resolved| resolved.definition.upgrade());
        if let Some(definition) = remembered {
            return Ok(ModelType::from_definition(definition));
        }

        // Taken before the lookup so that a reset racing with it leaves a
        // stale entry behind rather than a current one.
        let epoch = registry.epoch();
        let ty = registry.lookup(name.as_str())?;
        tracing::trace!(model = %name, "resolved late-bound model type");
        *self.resolved.write() = Some(Resolved {
            epoch,
            definition: Arc::downgrade(ty.definition()),
        });
        Ok(ty)
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Binding").field(&self.reference).finish()
    }
}
