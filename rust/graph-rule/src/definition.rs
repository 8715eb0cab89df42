use crate::pipeline::Field;
use crate::registry::WeakRegistry;
use crate::{
    Config, Context, Data, Model, ModelError, Record, Registry, Rule, RuleSpec, TypeRef, Value,
};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A derived property: a pure function of the owning instance.
pub type PropFn = Arc<dyn Fn(&Model) -> Result<Value, ModelError> + Send + Sync>;

/// The immutable, compiled form of a model.
///
/// Field and prop tables are flattened at definition time: entries contributed
/// by the base model and by interfaces are copied in, so a lookup never walks
/// the inheritance chain.
pub(crate) struct Definition {
    name: String,
    base: Option<ModelType>,
    interfaces: Vec<ModelType>,
    fields: IndexMap<String, Arc<Field>>,
    props: Arc<IndexMap<String, PropFn>>,
    default_rule: Config,
    registry: WeakRegistry,
}

/// A defined model.
///
/// Cloning yields another handle to the same definition; equality is
/// identity.
#[derive(Clone)]
pub struct ModelType(Arc<Definition>);

impl ModelType {
    pub(crate) fn from_definition(definition: Arc<Definition>) -> Self {
        Self(definition)
    }

    pub(crate) fn definition(&self) -> &Arc<Definition> {
        &self.0
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The model this one extends.
    pub fn base(&self) -> Option<&ModelType> {
        self.0.base.as_ref()
    }

    /// The interfaces mixed into this model, in declaration order.
    pub fn interfaces(&self) -> &[ModelType] {
        &self.0.interfaces
    }

    /// The compiled rules of every field, own fields first, then inherited
    /// ones in composition order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.0
            .fields
            .iter()
            .map(|(name, field)| (name.as_str(), field.rule()))
    }

    /// The compiled rule of `field`.
    pub fn rule(&self, field: &str) -> Option<&Rule> {
        self.field(field).map(|field| field.rule())
    }

    pub(crate) fn field(&self, name: &str) -> Option<&Arc<Field>> {
        self.0.fields.get(name)
    }

    /// Names of the derived properties available on instances.
    pub fn prop_names(&self) -> impl Iterator<Item = &str> {
        self.0.props.keys().map(String::as_str)
    }

    pub(crate) fn props_table(&self) -> &Arc<IndexMap<String, PropFn>> {
        &self.0.props
    }

    /// The registry the model was defined in, while it is alive.
    pub fn registry(&self) -> Option<Registry> {
        self.0.registry.upgrade()
    }

    /// Resolve `reference` through the registry this model was defined in.
    pub fn lookup(&self, reference: impl Into<TypeRef>) -> Result<ModelType, ModelError> {
        match reference.into() {
            TypeRef::Type(ty) => Ok(ty),
            TypeRef::Name(name) => match self.registry() {
                Some(registry) => registry.lookup(name),
                None => Err(ModelError::UnknownModel { name }),
            },
        }
    }

    /// Create a root instance wrapping `data`, which must be a record.
    pub fn create(&self, data: impl Into<Data>, context: Context) -> Result<Model, ModelError> {
        match data.into() {
            Data::Record(record) => Ok(self.instantiate(record, context)),
            _ => Err(ModelError::UnexpectedData {
                model: self.name().to_string(),
                expected: "a record",
            }),
        }
    }

    /// Create a root instance wrapping `record`.
    pub fn instantiate(&self, record: Record, context: Context) -> Model {
        Model::new(self.clone(), record, context, None, None)
    }

    /// Whether this model is `other` or extends it.
    pub fn is_a(&self, other: &ModelType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.ptr_eq(other) {
                return true;
            }
            current = ty.base();
        }
        false
    }

    /// Whether `interface` was mixed into this model. Interfaces are compared
    /// by identity.
    pub fn implements(&self, interface: &ModelType) -> bool {
        self.0
            .interfaces
            .iter()
            .any(|candidate| candidate.ptr_eq(interface))
    }

    /// Whether both handles refer to the same definition.
    pub fn ptr_eq(&self, other: &ModelType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ModelType {}

impl Debug for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.0.name)
            .field("base", &self.0.base.as_ref().map(ModelType::name))
            .field(
                "interfaces",
                &self.0.interfaces.iter().map(ModelType::name).collect::<Vec<_>>(),
            )
            .field("fields", &self.0.fields.keys().collect::<Vec<_>>())
            .field("props", &self.0.props.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Declares a model.
///
/// ```rust
/// use graph_rule::{Config, ModelBuilder, ModelError, Registry, Value};
///
/// # fn main() -> Result<(), ModelError> {
/// let registry = Registry::new();
///
/// let user = ModelBuilder::new("User")
///     .rule("id", true)
///     .rule("email", false)
///     .prop("is_admin", |user| Ok(user.raw("role")?.is_some_and(|role| role.as_str() == Some("admin"))))
///     .define(&registry)?;
///
/// let admin = ModelBuilder::new("Admin")
///     .base(&user)
///     .rule("email", true)
///     .default_rule(Config::new().cache(false))
///     .define(&registry)?;
///
/// assert!(admin.is_a(&user));
/// assert!(admin.rule("id").is_some());
/// # Ok(())
/// # }
/// ```
pub struct ModelBuilder {
    name: String,
    base: Option<ModelType>,
    interfaces: Vec<ModelType>,
    rules: IndexMap<String, RuleSpec>,
    props: IndexMap<String, PropFn>,
    default_rule: Config,
}

impl ModelBuilder {
    /// Start declaring a model named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            rules: IndexMap::new(),
            props: IndexMap::new(),
            default_rule: Config::new(),
        }
    }

    /// Extend `base`: its fields, props and unset default rule members are
    /// inherited unless declared here.
    pub fn base(mut self, base: &ModelType) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Mix in `interface`. Earlier interfaces win over later ones; the base
    /// wins over all of them.
    pub fn interface(mut self, interface: &ModelType) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Declare the rule of `field`. Declaring a field twice keeps the last
    /// rule.
    pub fn rule(mut self, field: impl Into<String>, rule: impl Into<RuleSpec>) -> Self {
        self.rules.insert(field.into(), rule.into());
        self
    }

    /// Declare rules from a JSON object mapping field names to declarations.
    pub fn rules_json(mut self, declarations: &Json) -> Result<Self, ModelError> {
        for (field, rule) in RuleSpec::from_json_table(declarations)? {
            self.rules.insert(field, rule);
        }
        Ok(self)
    }

    /// Declare a derived property, evaluated at most once per instance.
    pub fn prop<F, V>(mut self, name: impl Into<String>, prop: F) -> Self
    where
        F: Fn(&Model) -> Result<V, ModelError> + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.props.insert(
            name.into(),
            Arc::new(move |model: &Model| prop(model).map(Into::into)),
        );
        self
    }

    /// Defaults for the rules of this model, layered over the registry's
    /// configuration.
    pub fn default_rule(mut self, config: Config) -> Self {
        self.default_rule = config;
        self
    }

    /// Compile the declaration and register it under its name.
    pub fn define(self, registry: &Registry) -> Result<ModelType, ModelError> {
        if registry.contains(&self.name) {
            return Err(ModelError::DuplicateModel { name: self.name });
        }

        let default_rule = match &self.base {
            Some(base) => self.default_rule.or(&base.0.default_rule),
            None => self.default_rule,
        };
        let defaults = default_rule.clone().or(&registry.config());

        let mut fields = IndexMap::with_capacity(self.rules.len());
        for (name, spec) in self.rules {
            let rule = spec.compile(&name, &defaults)?;
            fields.insert(name.clone(), Arc::new(Field::new(name, rule)));
        }

        let mut props = self.props;
        for ancestor in self.base.iter().chain(&self.interfaces) {
            for (name, field) in &ancestor.0.fields {
                fields
                    .entry(name.clone())
                    .or_insert_with(|| Arc::clone(field));
            }
            for (name, prop) in ancestor.0.props.iter() {
                props.entry(name.clone()).or_insert_with(|| Arc::clone(prop));
            }
        }

        let ty = ModelType(Arc::new(Definition {
            name: self.name,
            base: self.base,
            interfaces: self.interfaces,
            fields,
            props: Arc::new(props),
            default_rule,
            registry: registry.downgrade(),
        }));
        registry.register(ty.clone())?;

        Ok(ty)
    }
}

impl Debug for ModelBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(ModelType::name))
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("default_rule", &self.default_rule)
            .finish()
    }
}
