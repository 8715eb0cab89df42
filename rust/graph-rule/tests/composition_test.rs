//! Inheritance from a base model and interface composition.

use graph_rule::{Config, Context, Model, ModelBuilder, ModelType, Registry, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn it_extends_a_base_model() -> anyhow::Result<()> {
    let registry = Registry::new();

    let base = ModelBuilder::new("Base")
        .prop("prop1", |_| Ok(1))
        .prop("prop2", |_| Ok(2))
        .rule("field1", true)
        .rule("field2", false)
        .define(&registry)?;

    let class = ModelBuilder::new("Class")
        .base(&base)
        .prop("prop2", |_| Ok(3))
        .prop("prop3", |_| Ok(4))
        .rule("field2", true)
        .rule("field3", true)
        .define(&registry)?;

    let instance = class.create(
        json!({"field1": 1, "field2": 2, "field3": 3}),
        Context::default(),
    )?;

    assert!(instance.is_a(&class)?);
    assert!(instance.is_a("Base")?);
    assert_eq!(instance.type_name(), "Class");

    assert_eq!(instance.get("field1")?, Value::from(1));
    assert_eq!(instance.get("field2")?, Value::from(2), "own rule wins");
    assert_eq!(instance.get("field3")?, Value::from(3));

    assert_eq!(instance.prop("prop1")?, Value::from(1));
    assert_eq!(instance.prop("prop2")?, Value::from(3), "own prop wins");
    assert_eq!(instance.prop("prop3")?, Value::from(4));

    let base_instance = base.create(json!({"field2": 2}), Context::default())?;
    assert!(!base_instance.is_a(&class)?);
    assert!(base_instance.get("field2")?.is_null());
    Ok(())
}

#[test]
fn it_mixes_in_interfaces() -> anyhow::Result<()> {
    let registry = Registry::new();

    let node = ModelBuilder::new("Node")
        .prop("prop1", |_| Ok(1))
        .prop("prop2", |_| Ok(2))
        .rule("id", true)
        .define(&registry)?;

    let named = ModelBuilder::new("Named")
        .prop("prop1", |_| Ok(10))
        .rule("id", false)
        .rule("name", false)
        .define(&registry)?;

    let user = ModelBuilder::new("User")
        .interface(&node)
        .interface(&named)
        .prop("prop2", |_| Ok(3))
        .prop("prop3", |_| Ok(4))
        .rule("name", true)
        .define(&registry)?;

    let instance = user.create(json!({"id": 1, "name": "hi"}), Context::default())?;

    assert_eq!(instance.get("id")?, Value::from(1), "earlier interfaces win");
    assert_eq!(instance.get("name")?, Value::from("hi"));

    assert!(instance.implements(&node)?);
    assert!(instance.implements("Named")?);
    assert!(!instance.is_a(&node)?);

    assert_eq!(instance.prop("prop1")?, Value::from(1));
    assert_eq!(instance.prop("prop2")?, Value::from(3));
    assert_eq!(instance.prop("prop3")?, Value::from(4));

    let other = ModelBuilder::new("Node2")
        .rule("id", true)
        .define(&registry)?;
    assert!(!instance.implements(&other)?, "interfaces match by identity");
    Ok(())
}

#[test]
fn it_keeps_the_defaults_each_field_was_compiled_with() -> anyhow::Result<()> {
    let registry = Registry::new();

    let base = ModelBuilder::new("Base")
        .default_rule(Config::new().read(false))
        .rule("inherited", graph_rule::FieldRule::new())
        .define(&registry)?;

    let derived = ModelBuilder::new("Derived")
        .base(&base)
        .default_rule(Config::new().read(true))
        .rule("own", graph_rule::FieldRule::new())
        .define(&registry)?;

    let instance = derived.create(json!({"inherited": 1, "own": 2}), Context::default())?;
    assert!(instance.get("inherited")?.is_null());
    assert_eq!(instance.get("own")?, Value::from(2));
    Ok(())
}

struct Split {
    _registries: (Registry, Registry),
    base: ModelType,
    derived: ModelType,
}

/// A base model in one registry extended by a model in another, each
/// registry defining its own `Child`.
fn split() -> anyhow::Result<Split> {
    let first = Registry::new();
    let second = Registry::new();

    ModelBuilder::new("Child").rule("id", true).define(&first)?;
    ModelBuilder::new("Child").rule("id", false).define(&second)?;

    let base = ModelBuilder::new("Base")
        .rule("child", "Child")
        .define(&first)?;
    let derived = ModelBuilder::new("Derived")
        .base(&base)
        .define(&second)?;

    Ok(Split {
        _registries: (first, second),
        base,
        derived,
    })
}

fn child_of(ty: &ModelType) -> anyhow::Result<Model> {
    let instance = ty.create(json!({"child": {"id": 1}}), Context::default())?;
    Ok(instance
        .get("child")?
        .into_model()
        .expect("child is materialized"))
}

#[test]
fn it_resolves_inherited_type_names_in_the_reading_registry() -> anyhow::Result<()> {
    let base_first = split()?;
    assert_eq!(child_of(&base_first.base)?.get("id")?, Value::from(1));
    assert!(child_of(&base_first.derived)?.get("id")?.is_null());
    assert_eq!(child_of(&base_first.base)?.get("id")?, Value::from(1));

    let derived_first = split()?;
    assert!(child_of(&derived_first.derived)?.get("id")?.is_null());
    assert_eq!(child_of(&derived_first.base)?.get("id")?, Value::from(1));
    assert!(child_of(&derived_first.derived)?.get("id")?.is_null());
    Ok(())
}
