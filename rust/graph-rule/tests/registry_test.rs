//! Model registration, lookup, reset and configuration.

use graph_rule::{
    Config, Context, FieldRule, ModelBuilder, ModelError, Registry, TypeRef, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn it_rejects_duplicate_names() -> anyhow::Result<()> {
    let registry = Registry::new();
    ModelBuilder::new("Model").define(&registry)?;

    let result = ModelBuilder::new("Model").define(&registry);
    assert_eq!(
        result.map(|ty| ty.name().to_string()).map_err(|error| error.to_string()),
        Err("Model 'Model' is already defined".to_string())
    );
    Ok(())
}

#[test]
fn it_lets_one_of_two_racing_definitions_win() -> anyhow::Result<()> {
    let registry = Registry::new();

    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| ModelBuilder::new("Racer").define(&registry)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("definition thread panicked"))
            .collect::<Vec<_>>()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|error| matches!(error, ModelError::DuplicateModel { .. }))
    );
    Ok(())
}

#[test]
fn it_looks_models_up_by_name_or_reference() -> anyhow::Result<()> {
    let registry = Registry::new();
    let model = ModelBuilder::new("Model").define(&registry)?;

    assert_eq!(registry.lookup("Model")?, model);
    assert_eq!(registry.lookup(&model)?, model);
    assert!(registry.contains("Model"));
    assert_eq!(registry.get("Other"), None);

    assert!(matches!(
        registry.lookup(TypeRef::from("Other")),
        Err(ModelError::UnknownModel { name }) if name == "Other"
    ));
    Ok(())
}

#[test]
fn it_frees_names_on_reset() -> anyhow::Result<()> {
    let registry = Registry::new();
    let first = ModelBuilder::new("Model")
        .rule("a", true)
        .define(&registry)?;
    ModelBuilder::new("Other").define(&registry)?;
    assert_eq!(registry.names(), vec!["Model".to_string(), "Other".to_string()]);

    registry.reset_all();
    assert!(registry.names().is_empty());

    let second = ModelBuilder::new("Model")
        .rule("a", false)
        .define(&registry)?;
    assert_ne!(first, second);

    let instance = first.create(json!({"a": 1}), Context::default())?;
    assert_eq!(instance.get("a")?, Value::from(1), "earlier definitions keep working");
    Ok(())
}

#[test]
fn it_resolves_type_names_again_after_reset() -> anyhow::Result<()> {
    let registry = Registry::new();
    let first_child = ModelBuilder::new("Child")
        .rule("id", true)
        .define(&registry)?;
    let parent = ModelBuilder::new("Parent")
        .rule("child", "Child")
        .define(&registry)?;

    let before = parent.create(json!({"child": {"id": 1}}), Context::default())?;
    let child = before.get("child")?.into_model().expect("child is materialized");
    assert_eq!(child.model_type(), &first_child);

    registry.reset_all();
    let second_child = ModelBuilder::new("Child")
        .rule("id", false)
        .define(&registry)?;

    let after = parent.create(json!({"child": {"id": 1}}), Context::default())?;
    let child = after.get("child")?.into_model().expect("child is materialized");
    assert_eq!(child.model_type(), &second_child);
    assert!(child.get("id")?.is_null());
    Ok(())
}

#[test]
fn it_merges_configuration_members() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.configure(Config::new().read(false));
    registry.configure(Config::new().read_fail("denied"));

    let model = ModelBuilder::new("Model")
        .rule("a", FieldRule::new())
        .define(&registry)?;
    let instance = model.create(json!({"a": 1}), Context::default())?;
    assert_eq!(instance.get("a")?, Value::from("denied"));

    registry.configure(Config::new().read(true));
    let later = ModelBuilder::new("Later")
        .rule("a", FieldRule::new())
        .define(&registry)?;
    let instance = later.create(json!({"a": 1}), Context::default())?;
    assert_eq!(instance.get("a")?, Value::from(1));

    let instance = model.create(json!({"a": 1}), Context::default())?;
    assert_eq!(
        instance.get("a")?,
        Value::from("denied"),
        "defaults apply at definition time"
    );
    Ok(())
}

#[test]
fn it_defines_models_from_json_rules() -> anyhow::Result<()> {
    let registry = Registry::new();
    ModelBuilder::new("User")
        .rules_json(&json!({"id": true, "email": {"read": false, "readFail": "hidden"}}))?
        .define(&registry)?;
    let team = ModelBuilder::new("Team")
        .rules_json(&json!({
            "name": true,
            "members": "[User]",
            "owner": {"type": "User", "cache": false},
        }))?
        .define(&registry)?;

    let rule = team.rule("members").expect("members is declared");
    assert!(rule.is_list());
    assert_eq!(rule.child_type().map(TypeRef::name), Some("User"));
    assert!(!team.rule("owner").expect("owner is declared").caches());

    let instance = team.create(
        json!({
            "name": "core",
            "members": [{"id": 1, "email": "a@example.com"}],
            "owner": {"id": 2},
        }),
        Context::default(),
    )?;

    let members = instance.get("members")?;
    let member = members
        .as_list()
        .and_then(|members| members.first())
        .and_then(Value::as_model)
        .expect("members are materialized");
    assert_eq!(member.get("id")?, Value::from(1));
    assert_eq!(member.get("email")?, Value::from("hidden"));

    let first = instance.get("owner")?;
    let second = instance.get("owner")?;
    assert_ne!(first, second, "uncached children are rebuilt");

    let result = ModelBuilder::new("Broken").rules_json(&json!({"id": 1}));
    assert!(matches!(result, Err(ModelError::InvalidRule { field, .. }) if field == "id"));
    Ok(())
}

#[test]
fn it_uses_the_process_wide_registry() -> anyhow::Result<()> {
    let name = "GlobalRegistryModel";
    let model = ModelBuilder::new(name)
        .rule("a", true)
        .define(Registry::global())?;

    assert_eq!(graph_rule::lookup(name)?, model);

    let instance = model.create(json!({"a": 1}), Context::default())?;
    assert_eq!(instance.get("a")?, Value::from(1));

    let result = ModelBuilder::new(name).define(Registry::global());
    assert!(matches!(result, Err(ModelError::DuplicateModel { .. })));
    Ok(())
}
