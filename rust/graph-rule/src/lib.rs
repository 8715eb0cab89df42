#![warn(missing_docs)]

//! Lazy, cached object-graph models with per-field read authorization.
//!
//! A [`ModelType`] wraps raw nested data (for example an API payload) in
//! instances whose fields are computed on first access, permission checked,
//! cached and materialized into child instances. Every field is governed by a
//! [`Rule`] compiled from a declaration:
//!
//! ```rust
//! use graph_rule::{Context, FieldRule, ModelBuilder, ModelError, Registry, Value};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), ModelError> {
//! let registry = Registry::new();
//!
//! ModelBuilder::new("Child")
//!     .rule("id", true)
//!     .define(&registry)?;
//!
//! let parent = ModelBuilder::new("Parent")
//!     .rule("name", true)
//!     .rule("secret", false)
//!     .rule("children", "[Child]")
//!     .rule(
//!         "score",
//!         FieldRule::new()
//!             .read_when(|_, _, value| value.as_i64().is_some_and(|score| score <= 3))
//!             .read_fail_with(|model, _, _| {
//!                 let score = model.raw("score")?.and_then(|score| score.as_i64());
//!                 Err(ModelError::message(format!("{} > 3", score.unwrap_or_default())))
//!             }),
//!     )
//!     .define(&registry)?;
//!
//! let instance = parent.create(
//!     json!({"name": "root", "secret": "x", "score": 5, "children": [{"id": 1}, {"id": 2}]}),
//!     Context::default(),
//! )?;
//!
//! assert_eq!(instance.get("name")?, Value::from("root"));
//! assert!(instance.get("secret")?.is_null());
//! assert_eq!(instance.get("score").unwrap_err().to_string(), "5 > 3");
//!
//! let children = instance.get("children")?;
//! let children = children.as_list().unwrap_or_default();
//! assert_eq!(children.len(), 2);
//! assert_eq!(children[0].as_model().and_then(|child| child.parent()), Some(instance.clone()));
//! # Ok(())
//! # }
//! ```
//!
//! Reading a field runs a fixed pipeline: a pre-read gate decides whether the
//! raw value may be touched at all, then the raw value is materialized into
//! child instances, passed through the access check and finally cached. Any
//! stage may produce a [`Pending`] value, in which case the remaining stages
//! are applied once it settles.

mod binding;
mod config;
mod context;
mod data;
mod decl;
mod definition;
mod error;
mod model;
mod pipeline;
mod props;
mod registry;
mod rule;
mod value;
mod verdict;

pub use binding::TypeRef;
pub use config::{Config, Gate, PreReadFn, ReadFail, ReadFailFn, ReadFn};
pub use context::*;
pub use data::*;
pub use definition::*;
pub use error::*;
pub use model::*;
pub use props::*;
pub use registry::*;
pub use rule::{FieldRule, ListItem, ListItemFn, Rule, RuleSpec};
pub use value::*;
pub use verdict::*;
