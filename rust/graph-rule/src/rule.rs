use crate::binding::Binding;
use crate::config::{PreReadFn, ReadFailFn, ReadFn, read_fn};
use crate::{Config, Gate, IntoVerdict, Model, ModelError, TypeRef, Value, Verdict};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Per-item filter for list fields.
pub type ListItemFn =
    Arc<dyn Fn(&Model, &ListItem<'_>) -> Result<Verdict, ModelError> + Send + Sync>;

/// Where a list item being filtered sits.
#[derive(Debug)]
pub struct ListItem<'a> {
    /// The instance that owns the list field.
    pub owner: &'a Model,
    /// The list field's name.
    pub field: &'a str,
    /// Position of the item in the materialized list.
    pub index: usize,
    /// The complete materialized list, before filtering.
    pub list: &'a [Value],
}

/// A structured field rule declaration.
///
/// Unset members are filled from the model's default rule, then from the
/// registry's configuration.
///
/// ```rust
/// use graph_rule::{FieldRule, ModelError};
///
/// let children = FieldRule::new()
///     .child("[Child]")
///     .read_list_item(|child, _| Ok::<_, ModelError>(child.raw("visible")?.is_some_and(|v| v.is_truthy())));
///
/// let secret = FieldRule::new()
///     .read(false)
///     .read_fail_with(|_, _, _| Err(ModelError::message("Access denied")));
/// ```
#[derive(Clone, Default)]
pub struct FieldRule {
    child: Option<TypeRef>,
    list: Option<bool>,
    gates: Config,
    method: bool,
    read_list_item: Option<ListItemFn>,
}

impl FieldRule {
    /// A rule that takes everything from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize the raw value into an instance of `ty`. A name of the form
    /// `[Name]` declares a list of instances.
    pub fn child(mut self, ty: impl Into<TypeRef>) -> Self {
        self.child = Some(ty.into());
        self
    }

    /// Whether the raw value is a list of child records.
    pub fn list(mut self, list: bool) -> Self {
        self.list = Some(list);
        self
    }

    /// Constant pre-read decision.
    pub fn pre_read(mut self, allowed: bool) -> Self {
        self.gates = self.gates.pre_read(allowed);
        self
    }

    /// Pre-read predicate, evaluated before the raw value is touched.
    pub fn pre_read_when<F, R>(mut self, predicate: F) -> Self
    where
        F: Fn(&Model, &str) -> R + Send + Sync + 'static,
        R: IntoVerdict,
    {
        self.gates = self.gates.pre_read_when(predicate);
        self
    }

    /// Constant read decision.
    pub fn read(mut self, allowed: bool) -> Self {
        self.gates = self.gates.read(allowed);
        self
    }

    /// Read predicate, evaluated with the resolved value.
    pub fn read_when<F, R>(mut self, predicate: F) -> Self
    where
        F: Fn(&Model, &str, &Value) -> R + Send + Sync + 'static,
        R: IntoVerdict,
    {
        self.gates = self.gates.read_when(predicate);
        self
    }

    /// Denied reads return `value`.
    pub fn read_fail(mut self, value: impl Into<Value>) -> Self {
        self.gates = self.gates.read_fail(value);
        self
    }

    /// Denied reads return `error` as data.
    pub fn read_fail_error(mut self, error: ModelError) -> Self {
        self.gates = self.gates.read_fail_error(error);
        self
    }

    /// Denied reads are answered by `handler`.
    pub fn read_fail_with<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Model, &str, &Value) -> Result<Value, ModelError> + Send + Sync + 'static,
    {
        self.gates = self.gates.read_fail_with(handler);
        self
    }

    /// Whether the resolved value is cached on the instance.
    pub fn cache(mut self, cache: bool) -> Self {
        self.gates = self.gates.cache(cache);
        self
    }

    /// The field is a callable rather than a property.
    pub fn method(mut self) -> Self {
        self.method = true;
        self
    }

    /// Keep only the list items for which `predicate` holds.
    pub fn read_list_item<F, R>(mut self, predicate: F) -> Self
    where
        F: Fn(&Model, &ListItem<'_>) -> R + Send + Sync + 'static,
        R: IntoVerdict,
    {
        self.read_list_item = Some(Arc::new(move |item: &Model, at: &ListItem<'_>| {
            predicate(item, at).into_verdict()
        }));
        self
    }

    pub(crate) fn set_child(&mut self, ty: Option<TypeRef>) {
        self.child = ty;
    }

    pub(crate) fn set_list(&mut self, list: Option<bool>) {
        self.list = list;
    }

    pub(crate) fn set_method(&mut self, method: bool) {
        self.method = method;
    }

    pub(crate) fn gates_mut(&mut self) -> &mut Config {
        &mut self.gates
    }
}

/// Any of the ways a field rule can be declared.
///
/// - `true` / `false`: readable or denied, everything else from defaults.
/// - a type name such as `"Child"` or `"[Child]"`: a child rule with defaults.
/// - [`RuleSpec::read`]: a read predicate with defaults.
/// - a [`FieldRule`]: a structured declaration.
#[derive(Clone)]
pub enum RuleSpec {
    /// Constant read decision.
    Flag(bool),
    /// Child type shorthand.
    Type(TypeRef),
    /// Read predicate shorthand.
    Read(ReadFn),
    /// Structured declaration.
    Rule(FieldRule),
}

impl RuleSpec {
    /// A rule consisting only of a read predicate.
    pub fn read<F, R>(predicate: F) -> Self
    where
        F: Fn(&Model, &str, &Value) -> R + Send + Sync + 'static,
        R: IntoVerdict,
    {
        RuleSpec::Read(read_fn(predicate))
    }

    /// Normalize the declaration into a compiled [`Rule`].
    ///
    /// `defaults` must already contain the model's default rule layered over
    /// the registry configuration.
    pub(crate) fn compile(self, field: &str, defaults: &Config) -> Result<Rule, ModelError> {
        let rule = match self {
            RuleSpec::Flag(allowed) => FieldRule::new().read(allowed),
            RuleSpec::Type(ty) => FieldRule::new().child(ty),
            RuleSpec::Read(predicate) => {
                let mut rule = FieldRule::new();
                rule.gates.read = Some(Gate::When(predicate));
                rule
            }
            RuleSpec::Rule(rule) => rule,
        };

        let gates = rule.gates.or(defaults);

        let child = match rule.child {
            Some(reference) => Some(ChildType::compile(field, reference, rule.list)?),
            None if rule.list == Some(true) => {
                return Err(ModelError::invalid_rule(
                    field,
                    "`list` requires a child type",
                ));
            }
            None => None,
        };

        if rule.read_list_item.is_some() && !child.as_ref().is_some_and(|child| child.list) {
            return Err(ModelError::invalid_rule(
                field,
                "`read_list_item` requires a list child type",
            ));
        }

        Ok(Rule {
            child,
            pre_read: gates.pre_read.unwrap_or(Gate::Allow),
            read: gates.read.unwrap_or(Gate::Allow),
            read_fail: gates
                .read_fail
                .unwrap_or(crate::ReadFail::Value(Value::null()))
                .into_handler(),
            cache: gates.cache.unwrap_or(true),
            method: rule.method,
            read_list_item: rule.read_list_item,
        })
    }
}

impl From<bool> for RuleSpec {
    fn from(allowed: bool) -> Self {
        RuleSpec::Flag(allowed)
    }
}

impl From<&str> for RuleSpec {
    fn from(ty: &str) -> Self {
        RuleSpec::Type(ty.into())
    }
}

impl From<String> for RuleSpec {
    fn from(ty: String) -> Self {
        RuleSpec::Type(ty.into())
    }
}

impl From<FieldRule> for RuleSpec {
    fn from(rule: FieldRule) -> Self {
        RuleSpec::Rule(rule)
    }
}

/// The child model a field materializes into.
pub(crate) struct ChildType {
    pub(crate) binding: Binding,
    pub(crate) list: bool,
}

impl ChildType {
    fn compile(field: &str, reference: TypeRef, list: Option<bool>) -> Result<Self, ModelError> {
        let (reference, bracketed) = match reference {
            TypeRef::Name(name) => {
                let (name, bracketed) = parse_type_name(field, &name)?;
                (TypeRef::Name(name), bracketed)
            }
            reference => (reference, false),
        };

        if bracketed && list == Some(false) {
            return Err(ModelError::invalid_rule(
                field,
                "a bracketed type cannot be combined with `list: false`",
            ));
        }

        Ok(Self {
            binding: Binding::new(reference),
            list: bracketed || list.unwrap_or(false),
        })
    }
}

/// Split `"[Name]"` into `("Name", true)` and `"Name"` into `("Name", false)`.
fn parse_type_name(field: &str, raw: &str) -> Result<(String, bool), ModelError> {
    let raw = raw.trim();
    let (name, bracketed) = match (raw.strip_prefix('['), raw.ends_with(']')) {
        (Some(inner), true) => (&inner[..inner.len() - 1], true),
        (None, false) => (raw, false),
        _ => {
            return Err(ModelError::invalid_rule(
                field,
                format!("unbalanced brackets in type '{raw}'"),
            ));
        }
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ModelError::invalid_rule(field, "empty type name"));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == '[' || c == ']')
    {
        return Err(ModelError::invalid_rule(
            field,
            format!("malformed type name '{name}'"),
        ));
    }

    Ok((name.to_string(), bracketed))
}

/// A compiled field rule.
///
/// Every member is resolved: gates are concrete, `read_fail` is always a
/// handler and child types are parsed. Exposed read-only so that a schema
/// layer can inspect models.
pub struct Rule {
    pub(crate) child: Option<ChildType>,
    pub(crate) pre_read: Gate<PreReadFn>,
    pub(crate) read: Gate<ReadFn>,
    pub(crate) read_fail: ReadFailFn,
    pub(crate) cache: bool,
    pub(crate) method: bool,
    pub(crate) read_list_item: Option<ListItemFn>,
}

impl Rule {
    /// The child model the field materializes into, if any.
    pub fn child_type(&self) -> Option<&TypeRef> {
        self.child.as_ref().map(|child| child.binding.reference())
    }

    /// Whether the field holds a list of child instances.
    pub fn is_list(&self) -> bool {
        self.child.as_ref().is_some_and(|child| child.list)
    }

    /// Whether the field is callable.
    pub fn is_method(&self) -> bool {
        self.method
    }

    /// Whether resolved values are cached.
    pub fn caches(&self) -> bool {
        self.cache
    }

    /// The pre-read gate.
    pub fn pre_read(&self) -> &Gate<PreReadFn> {
        &self.pre_read
    }

    /// The read gate.
    pub fn read(&self) -> &Gate<ReadFn> {
        &self.read
    }
}

impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("child", &self.child_type())
            .field("list", &self.is_list())
            .field("pre_read", &self.pre_read)
            .field("read", &self.read)
            .field("cache", &self.cache)
            .field("method", &self.method)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(spec: impl Into<RuleSpec>) -> Result<Rule, ModelError> {
        spec.into().compile("field", &Config::builtin())
    }

    #[test]
    fn it_parses_bracketed_types_as_lists() -> anyhow::Result<()> {
        let rule = compile("[Child]")?;
        assert_eq!(rule.child_type().map(TypeRef::name), Some("Child"));
        assert!(rule.is_list());

        let rule = compile("Child")?;
        assert_eq!(rule.child_type().map(TypeRef::name), Some("Child"));
        assert!(!rule.is_list());

        let rule = compile(FieldRule::new().child("Child").list(true))?;
        assert!(rule.is_list());
        Ok(())
    }

    #[test]
    fn it_rejects_malformed_types() {
        for ty in ["[Child", "Child]", "[]", "", "Two Words"] {
            let result = compile(ty);
            assert!(
                matches!(result, Err(ModelError::InvalidRule { .. })),
                "{ty:?} should be rejected"
            );
        }
    }

    #[test]
    fn it_rejects_contradictory_list_declarations() {
        let result = compile(FieldRule::new().child("[Child]").list(false));
        assert!(matches!(result, Err(ModelError::InvalidRule { .. })));

        let result = compile(FieldRule::new().list(true));
        assert!(matches!(result, Err(ModelError::InvalidRule { .. })));

        let result = compile(FieldRule::new().child("Child").read_list_item(|_, _| true));
        assert!(matches!(result, Err(ModelError::InvalidRule { .. })));
    }

    #[test]
    fn it_coerces_shorthands_over_defaults() -> anyhow::Result<()> {
        let defaults = Config::builtin().cache(false).pre_read(false);

        let rule = RuleSpec::from(false).compile("field", &defaults)?;
        assert!(matches!(rule.read, Gate::Deny));
        assert!(matches!(rule.pre_read, Gate::Deny));
        assert!(!rule.caches());

        let rule = RuleSpec::read(|_, _, _| true).compile("field", &defaults)?;
        assert!(matches!(rule.read, Gate::When(_)));

        let rule = RuleSpec::from(FieldRule::new().cache(true)).compile("field", &defaults)?;
        assert!(rule.caches());
        assert!(matches!(rule.read, Gate::Allow));
        Ok(())
    }
}
