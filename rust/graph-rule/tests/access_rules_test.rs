//! Field access rules: constant and predicate gates, `read_fail` handling,
//! caching and pre-read gating.

use graph_rule::{
    Config, Context, Data, FieldRule, ModelBuilder, ModelError, Record, Registry, RuleSpec, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn registry() -> Registry {
    let registry = Registry::new();
    registry.configure(Config::new().read(true).read_fail(Value::null()));
    registry
}

#[test]
fn it_leaves_fields_without_rules_undefined() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model").define(&registry)?;

    let instance = model.create(json!({"a": 1, "b": 2}), Context::default())?;
    assert_eq!(instance.get("a")?, Value::Undefined);
    assert_eq!(instance.get("b")?, Value::Undefined);
    Ok(())
}

#[test]
fn it_applies_basic_access_rules() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model")
        .rule("a", true)
        .rule("b", false)
        .rule("c", RuleSpec::read(|_, _, _| true))
        .rule("d", RuleSpec::read(|_, _, _| false))
        .rule("e", FieldRule::new())
        .rule("f", FieldRule::new().read(false))
        .rule(
            "g",
            FieldRule::new()
                .read(false)
                .read_fail_error(ModelError::message("denied")),
        )
        .rule(
            "h",
            FieldRule::new()
                .read(false)
                .read_fail_with(|_, _, _| Err(ModelError::message("denied"))),
        )
        .rule(
            "i",
            RuleSpec::read(|model, _, _| {
                model
                    .raw("i")
                    .map(|raw| raw.is_some_and(|raw| raw.is_truthy()))
            }),
        )
        .define(&registry)?;

    let instance = model.create(
        json!({"a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "f": 6, "g": 7, "h": 8, "i": 1}),
        Context::default(),
    )?;

    assert_eq!(instance.get("a")?, Value::from(1));
    assert!(instance.get("b")?.is_null());
    assert_eq!(instance.get("c")?, Value::from(3));
    assert!(instance.get("d")?.is_null());
    assert_eq!(instance.get("e")?, Value::from(5));
    assert!(instance.get("f")?.is_null());

    let g = instance.get("g")?;
    assert_eq!(g.as_failure().map(ToString::to_string), Some("denied".into()));

    assert!(matches!(instance.get("h"), Err(ModelError::Message(message)) if message == "denied"));

    assert_eq!(instance.get("i")?, Value::from(1));

    instance.data()?.set("i", 0);
    assert_eq!(instance.get("i")?, Value::from(1), "served from cache");

    instance.clear_cache("i");
    assert!(instance.get("i")?.is_null(), "recomputed from raw data");

    instance.overwrite("i", 2)?;
    assert_eq!(instance.get("i")?, Value::from(2));
    Ok(())
}

#[test]
fn it_runs_read_predicates_once_when_cached() -> anyhow::Result<()> {
    let registry = registry();
    let cached = Arc::new(AtomicUsize::new(0));
    let uncached = Arc::new(AtomicUsize::new(0));

    let model = {
        let cached = cached.clone();
        let uncached = uncached.clone();
        ModelBuilder::new("Model")
            .rule(
                "a",
                FieldRule::new()
                    .read_when(move |_, _, _| {
                        cached.fetch_add(1, Ordering::SeqCst);
                        true
                    })
                    .cache(true),
            )
            .rule(
                "b",
                FieldRule::new()
                    .read_when(move |_, _, _| {
                        uncached.fetch_add(1, Ordering::SeqCst);
                        true
                    })
                    .cache(false),
            )
            .define(&registry)?
    };

    let instance = model.create(json!({"a": 1, "b": 1}), Context::default())?;

    assert_eq!(instance.get("a")?, Value::from(1));
    assert_eq!(instance.get("a")?, Value::from(1));
    assert_eq!(cached.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        assert_eq!(instance.get("b")?, Value::from(1));
    }
    assert_eq!(uncached.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn it_never_touches_raw_data_when_pre_read_is_denied() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model")
        .rule("a", FieldRule::new().pre_read(false).cache(false))
        .rule("get_b", FieldRule::new().pre_read(false).method())
        .define(&registry)?;

    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    let data = {
        let a = a.clone();
        let b = b.clone();
        Record::new()
            .with(
                "a",
                Data::getter(move |_| Ok((a.fetch_add(1, Ordering::SeqCst) as i64 + 1).into())),
            )
            .with(
                "get_b",
                Data::method(move |_, _| Ok((b.fetch_add(1, Ordering::SeqCst) as i64 + 1).into())),
            )
    };
    let instance = model.instantiate(data, Context::default());

    assert!(instance.get("a")?.is_null());
    assert!(instance.get("a")?.is_null());
    assert_eq!(a.load(Ordering::SeqCst), 0);

    assert!(instance.call("get_b", Vec::<Data>::new())?.is_null());
    assert!(instance.call("get_b", Vec::<Data>::new())?.is_null());
    assert_eq!(b.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn it_evaluates_getters_through_the_pipeline() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model")
        .rule("total", FieldRule::new().cache(false))
        .define(&registry)?;

    let data = Record::new().with("base", 40).with(
        "total",
        Data::getter(|record| {
            let base = record.get("base").and_then(|base| base.as_i64()).unwrap_or_default();
            Ok((base + 2).into())
        }),
    );
    let instance = model.instantiate(data, Context::default());

    assert_eq!(instance.get("total")?, Value::from(42));
    instance.data()?.set("base", 0);
    assert_eq!(instance.get("total")?, Value::from(2));
    Ok(())
}

#[test]
fn it_calls_methods_with_arguments() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model")
        .rule("get_a", FieldRule::new().read(true).method())
        .define(&registry)?;

    let data = Record::new().with("a", 3).with(
        "get_a",
        Data::method(|record, args| {
            let a = record.get("a").and_then(|a| a.as_i64()).unwrap_or_default();
            let add = args.first().and_then(Data::as_i64).unwrap_or_default();
            Ok((a + add).into())
        }),
    );
    let instance = model.instantiate(data, Context::default());

    assert_eq!(instance.call("get_a", [2])?, Value::from(5));
    assert_eq!(instance.get("a")?, Value::Undefined);

    let method = instance.get("get_a")?;
    let method = method.as_method().expect("method fields read as bound methods");
    assert_eq!(method.field(), "get_a");
    assert_eq!(method.call([4])?, Value::from(7));
    Ok(())
}

#[test]
fn it_refuses_to_call_non_methods() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model")
        .rule("a", true)
        .rule("b", FieldRule::new().method())
        .define(&registry)?;

    let instance = model.create(json!({"a": 1, "b": 2}), Context::default())?;

    for field in ["a", "b", "missing"] {
        let result = instance.call(field, Vec::<Data>::new());
        assert!(
            matches!(&result, Err(ModelError::NotCallable { field: name, .. }) if name == field),
            "{field} should not be callable"
        );
    }
    Ok(())
}

#[test]
fn it_guards_the_readme_model() -> anyhow::Result<()> {
    let registry = registry();
    let model = ModelBuilder::new("Model")
        .rule("public", true)
        .rule(
            "secret",
            FieldRule::new()
                .read(false)
                .read_fail_with(|_, _, _| Err(ModelError::message("Access denied"))),
        )
        .rule(
            "conditional",
            FieldRule::new()
                .read_when(|model, _, _| {
                    let value = model.raw("conditional")?.and_then(|value| value.as_i64());
                    Ok::<_, ModelError>(value.is_some_and(|value| value <= 3))
                })
                .read_fail_with(|model, _, _| {
                    let value = model.raw("conditional")?.unwrap_or_default();
                    Err(ModelError::message(format!(
                        "{} > 3",
                        value.as_i64().unwrap_or_default()
                    )))
                }),
        )
        .define(&registry)?;

    let secured = model.create(
        json!({"public": "public data", "secret": "something secret", "conditional": 5}),
        Context::default(),
    )?;

    assert_eq!(secured.get("public")?, Value::from("public data"));
    assert_eq!(
        secured.get("secret").map_err(|error| error.to_string()),
        Err("Access denied".to_string())
    );
    assert_eq!(
        secured.get("conditional").map_err(|error| error.to_string()),
        Err("5 > 3".to_string())
    );

    let secured = model.create(json!({"conditional": 1}), Context::default())?;
    assert_eq!(secured.get("conditional")?, Value::from(1));
    Ok(())
}

#[test]
fn it_caches_denials_only_after_the_access_check() -> anyhow::Result<()> {
    let registry = registry();
    let failures = Arc::new(AtomicUsize::new(0));
    let allowed = Arc::new(AtomicUsize::new(0));

    let model = {
        let failures = failures.clone();
        let allowed = allowed.clone();
        ModelBuilder::new("Model")
            .rule(
                "checked",
                FieldRule::new().read(false).read_fail_with(move |_, _, _| {
                    failures.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::null())
                }),
            )
            .rule(
                "gated",
                FieldRule::new().pre_read_when(move |_, _| allowed.load(Ordering::SeqCst) > 0),
            )
            .define(&registry)?
    };

    let instance = model.create(json!({"checked": 1, "gated": 2}), Context::default())?;

    assert!(instance.get("checked")?.is_null());
    assert!(instance.get("checked")?.is_null());
    assert_eq!(failures.load(Ordering::SeqCst), 1, "access-check denials are cached");

    assert!(instance.get("gated")?.is_null());
    allowed.store(1, Ordering::SeqCst);
    assert_eq!(instance.get("gated")?, Value::from(2), "pre-read denials are not cached");
    Ok(())
}
