//! Per-field accessors.
//!
//! Every field of a model compiles into a [`Field`]: the field's [`Rule`]
//! plus an ordered list of stages derived from it. Reading a field runs
//!
//! ```text
//! pre-read gate → raw read → materialize → filter → access check → cache
//! ```
//!
//! where each stage is present only when the rule calls for it. A stage that
//! receives a pending value defers itself until the value settles, so the
//! order above holds for synchronous and asynchronous values alike.

use crate::rule::ListItemFn;
use crate::{BoundMethod, Data, Gate, ListItem, Model, ModelError, Rule, Value, Verdict};
use futures_util::future::BoxFuture;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[derive(Clone)]
enum Stage {
    /// Wrap raw records into child instances.
    Materialize,
    /// Drop list items rejected by the per-item predicate.
    Filter(ListItemFn),
    /// Apply the read gate to the resolved value.
    Check,
    /// Store the final value on the instance.
    Cache,
}

impl Debug for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Materialize => f.write_str("Materialize"),
            Stage::Filter(_) => f.write_str("Filter"),
            Stage::Check => f.write_str("Check"),
            Stage::Cache => f.write_str("Cache"),
        }
    }
}

/// A compiled field accessor.
pub(crate) struct Field {
    name: String,
    rule: Rule,
    stages: Vec<Stage>,
}

impl Field {
    pub(crate) fn new(name: impl Into<String>, rule: Rule) -> Self {
        let mut stages = Vec::new();
        if rule.child.is_some() {
            stages.push(Stage::Materialize);
            if let Some(predicate) = &rule.read_list_item {
                stages.push(Stage::Filter(predicate.clone()));
            }
        }
        if !matches!(rule.read, Gate::Allow) {
            stages.push(Stage::Check);
        }
        if rule.cache && !rule.method {
            stages.push(Stage::Cache);
        }

        Self {
            name: name.into(),
            rule,
            stages,
        }
    }

    pub(crate) fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Read the field as a property.
    pub(crate) fn read(self: &Arc<Self>, model: &Model) -> Result<Value, ModelError> {
        if self.rule.method {
            return Ok(Value::Method(BoundMethod::new(model.clone(), &self.name)));
        }

        // Overwritten values live in the cache even when the rule does not cache.
        if let Some(value) = model.cached(&self.name)? {
            tracing::trace!(model = %model.type_name(), field = %self.name, "cache hit");
            return Ok(value);
        }

        let field = Arc::clone(self);
        self.gate(model, move |model| {
            let raw = field.raw(model)?;
            field.apply(model, raw)
        })
    }

    /// Invoke the field as a method.
    pub(crate) fn call(self: &Arc<Self>, model: &Model, args: Vec<Data>) -> Result<Value, ModelError> {
        if !self.rule.method {
            return Err(self.not_callable(model));
        }

        let field = Arc::clone(self);
        self.gate(model, move |model| {
            let record = model.record(&field.name)?;
            let Some(Data::Method(method)) = record.get(&field.name) else {
                return Err(field.not_callable(model));
            };
            let value = Value::from_data(method.call(&record, &args)?);
            field.apply(model, value)
        })
    }

    /// Run `proceed` if the pre-read gate permits, otherwise answer with
    /// `read_fail` without touching raw data.
    fn gate<P>(self: &Arc<Self>, model: &Model, proceed: P) -> Result<Value, ModelError>
    where
        P: FnOnce(&Model) -> Result<Value, ModelError> + Send + 'static,
    {
        let verdict = match &self.rule.pre_read {
            Gate::Allow => return proceed(model),
            Gate::Deny => Verdict::Deny,
            Gate::When(predicate) => predicate(model, &self.name)?,
        };

        match verdict {
            Verdict::Allow => proceed(model),
            Verdict::Deny => self.fail(model, &Value::Undefined),
            Verdict::Pending(decision) => {
                let field = Arc::clone(self);
                let model = model.clone();
                Ok(Value::pending(async move {
                    if decision.await? {
                        proceed(&model)
                    } else {
                        field.fail(&model, &Value::Undefined)
                    }
                }))
            }
        }
    }

    fn raw(&self, model: &Model) -> Result<Value, ModelError> {
        let record = model.record(&self.name)?;
        Ok(match record.get(&self.name) {
            None => Value::Undefined,
            Some(Data::Getter(getter)) => Value::from_data(getter.get(&record)?),
            Some(data) => Value::from_data(data),
        })
    }

    fn apply(self: &Arc<Self>, model: &Model, mut value: Value) -> Result<Value, ModelError> {
        for (index, stage) in self.stages.iter().enumerate() {
            value = match stage {
                Stage::Cache => model.remember(&self.name, value)?,
                _ => {
                    let field = Arc::clone(self);
                    let model = model.clone();
                    value.then(move |value| field.stage(index, &model, value))?
                }
            };
        }
        Ok(value)
    }

    fn stage(&self, index: usize, model: &Model, value: Value) -> Result<Value, ModelError> {
        match self.stages.get(index) {
            Some(Stage::Materialize) => self.materialize(model, value),
            Some(Stage::Filter(predicate)) => self.filter(model, value, predicate),
            Some(Stage::Check) => self.check(model, value),
            Some(Stage::Cache) | None => Ok(value),
        }
    }

    fn materialize(&self, model: &Model, value: Value) -> Result<Value, ModelError> {
        let Some(child) = &self.rule.child else {
            return Ok(value);
        };

        let data = match value {
            Value::Data(data) => data,
            value => return Ok(value),
        };
        if data.is_null() {
            return Ok(Value::Data(data));
        }

        let ty = child.binding.resolve(model.model_type())?;
        tracing::trace!(
            model = %model.type_name(),
            field = %self.name,
            child = %ty.name(),
            "materializing child"
        );

        if child.list {
            let children = model.create_children(&ty, data)?;
            Ok(children.map_or_else(Value::null, |children| {
                Value::List(
                    children
                        .into_iter()
                        .map(|child| child.map_or_else(Value::null, Value::Model))
                        .collect(),
                )
            }))
        } else {
            let child = model.create_child(&ty, data)?;
            Ok(child.map_or_else(Value::null, Value::Model))
        }
    }

    fn filter(
        &self,
        model: &Model,
        value: Value,
        predicate: &ListItemFn,
    ) -> Result<Value, ModelError> {
        let Value::List(items) = value else {
            return Ok(value);
        };

        let mut decisions = Vec::with_capacity(items.len());
        let mut waiting = false;
        for (index, item) in items.iter().enumerate() {
            let Value::Model(child) = item else {
                decisions.push(Decision::Keep(true));
                continue;
            };
            let at = ListItem {
                owner: model,
                field: &self.name,
                index,
                list: &items,
            };
            decisions.push(match predicate(child, &at)? {
                Verdict::Allow => Decision::Keep(true),
                Verdict::Deny => Decision::Keep(false),
                Verdict::Pending(decision) => {
                    waiting = true;
                    Decision::Wait(decision)
                }
            });
        }

        if !waiting {
            let kept = items
                .into_iter()
                .zip(decisions)
                .filter_map(|(item, decision)| match decision {
                    Decision::Keep(true) => Some(item),
                    _ => None,
                })
                .collect();
            return Ok(Value::List(kept));
        }

        Ok(Value::pending(async move {
            let mut kept = Vec::with_capacity(items.len());
            for (item, decision) in items.into_iter().zip(decisions) {
                let keep = match decision {
                    Decision::Keep(keep) => keep,
                    Decision::Wait(decision) => decision.await?,
                };
                if keep {
                    kept.push(item);
                }
            }
            Ok(Value::List(kept))
        }))
    }

    fn check(&self, model: &Model, value: Value) -> Result<Value, ModelError> {
        let verdict = match &self.rule.read {
            Gate::Allow => return Ok(value),
            Gate::Deny => Verdict::Deny,
            Gate::When(predicate) => predicate(model, &self.name, &value)?,
        };

        match verdict {
            Verdict::Allow => Ok(value),
            Verdict::Deny => self.fail(model, &value),
            Verdict::Pending(decision) => {
                let handler = self.rule.read_fail.clone();
                let name = self.name.clone();
                let model = model.clone();
                Ok(Value::pending(async move {
                    if decision.await? {
                        Ok(value)
                    } else {
                        handler(&model, &name, &value)
                    }
                }))
            }
        }
    }

    fn fail(&self, model: &Model, value: &Value) -> Result<Value, ModelError> {
        (self.rule.read_fail)(model, &self.name, value)
    }

    fn not_callable(&self, model: &Model) -> ModelError {
        ModelError::NotCallable {
            model: model.type_name().to_string(),
            field: self.name.clone(),
        }
    }
}

impl Debug for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("stages", &self.stages)
            .finish()
    }
}

enum Decision {
    Keep(bool),
    Wait(BoxFuture<'static, Result<bool, ModelError>>),
}
