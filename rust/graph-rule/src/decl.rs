//! Declarative rules in JSON.
//!
//! Rules whose gates are constants can be written as data, e.g. when they are
//! shipped alongside a schema:
//!
//! ```json
//! {
//!   "id": true,
//!   "password": false,
//!   "owner": "User",
//!   "friends": { "type": "[User]", "cache": false },
//!   "email": { "read": false, "readFail": null }
//! }
//! ```

use crate::{FieldRule, ModelError, RuleSpec, Value};
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RuleOptions {
    #[serde(rename = "type")]
    ty: Option<String>,
    list: Option<bool>,
    pre_read: Option<bool>,
    read: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    read_fail: Option<Json>,
    cache: Option<bool>,
    #[serde(default)]
    method: bool,
}

/// Distinguishes an explicit `null` from a missing member.
fn present<'de, D>(deserializer: D) -> Result<Option<Json>, D::Error>
where
    D: Deserializer<'de>,
{
    Json::deserialize(deserializer).map(Some)
}

impl RuleSpec {
    /// Read a rule declared as JSON: `true`, `false`, a type name, or an
    /// object with any of `type`, `list`, `preRead`, `read`, `readFail`,
    /// `cache` and `method`.
    pub fn from_json(field: &str, declaration: &Json) -> Result<RuleSpec, ModelError> {
        match declaration {
            Json::Bool(allowed) => Ok(RuleSpec::Flag(*allowed)),
            Json::String(ty) => Ok(RuleSpec::from(ty.as_str())),
            Json::Object(_) => {
                let options = RuleOptions::deserialize(declaration)
                    .map_err(|error| ModelError::invalid_rule(field, error.to_string()))?;
                Ok(RuleSpec::Rule(options.into_rule()))
            }
            other => Err(ModelError::invalid_rule(
                field,
                format!(
                    "expected a boolean, a type name or an object, found {}",
                    kind(other)
                ),
            )),
        }
    }

    /// Read a JSON object mapping field names to rule declarations.
    pub fn from_json_table(declarations: &Json) -> Result<Vec<(String, RuleSpec)>, ModelError> {
        let Json::Object(table) = declarations else {
            return Err(ModelError::invalid_rule(
                "*",
                format!("expected an object of rules, found {}", kind(declarations)),
            ));
        };

        table
            .iter()
            .map(|(field, declaration)| {
                Ok((field.clone(), RuleSpec::from_json(field, declaration)?))
            })
            .collect()
    }
}

impl RuleOptions {
    fn into_rule(self) -> FieldRule {
        let mut rule = FieldRule::new();
        rule.set_child(self.ty.map(Into::into));
        rule.set_list(self.list);
        rule.set_method(self.method);

        let gates = rule.gates_mut();
        if let Some(pre_read) = self.pre_read {
            gates.pre_read = Some(pre_read.into());
        }
        if let Some(read) = self.read {
            gates.read = Some(read.into());
        }
        if let Some(read_fail) = self.read_fail {
            gates.read_fail = Some(crate::ReadFail::Value(Value::from(read_fail)));
        }
        gates.cache = self.cache;

        rule
    }
}

fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
