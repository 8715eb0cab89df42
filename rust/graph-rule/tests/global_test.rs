//! The process-wide registry and its free-standing entry points.

use graph_rule::{Config, Context, FieldRule, ModelBuilder, ModelError, Registry, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn it_configures_and_resets_the_process_wide_registry() -> anyhow::Result<()> {
    graph_rule::configure(Config::new().read(false).read_fail("hidden"));

    let model = ModelBuilder::new("Configured")
        .rule("a", FieldRule::new())
        .rule("b", true)
        .define(Registry::global())?;
    let instance = model.create(json!({"a": 1, "b": 2}), Context::default())?;
    assert_eq!(instance.get("a")?, Value::from("hidden"));
    assert_eq!(instance.get("b")?, Value::from(2));

    graph_rule::reset_all();
    assert!(matches!(
        graph_rule::lookup("Configured"),
        Err(ModelError::UnknownModel { .. })
    ));

    let again = ModelBuilder::new("Configured")
        .rule("a", FieldRule::new())
        .define(Registry::global())?;
    assert_ne!(again, model);
    assert_eq!(instance.get("a")?, Value::from("hidden"));
    Ok(())
}
