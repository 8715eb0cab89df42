use std::error::Error;
use std::sync::Arc;

/// Errors raised while defining models or reading their fields.
///
/// The enum is `Clone` so that failures can flow through shared
/// [`Pending`](crate::Pending) values and reach every consumer of the same
/// field. Errors produced by user supplied functions (read predicates, props,
/// methods, `read_fail` handlers) are passed through unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// A model with the same name is already registered.
    #[error("Model '{name}' is already defined")]
    DuplicateModel {
        /// The conflicting model name.
        name: String,
    },

    /// A type name could not be found in the registry at the time of use.
    #[error("Model '{name}' is not defined")]
    UnknownModel {
        /// The name that failed to resolve.
        name: String,
    },

    /// A field rule declaration has an unsupported shape.
    #[error("Invalid rule for field '{field}': {reason}")]
    InvalidRule {
        /// The field the rule was declared for.
        field: String,
        /// Why the declaration was rejected.
        reason: String,
    },

    /// A field was accessed on an instance that has been destroyed.
    #[error("Cannot read '{field}' of a destroyed '{model}' instance")]
    Destroyed {
        /// Name of the instance's model.
        model: String,
        /// The field that was accessed.
        field: String,
    },

    /// A field was called but is not a method, or its raw value is not
    /// callable.
    #[error("Field '{field}' of '{model}' is not callable")]
    NotCallable {
        /// Name of the instance's model.
        model: String,
        /// The field that was called.
        field: String,
    },

    /// Raw data could not be wrapped into a model instance.
    #[error("Cannot build a '{model}' instance: expected {expected}")]
    UnexpectedData {
        /// Name of the model that was being materialized.
        model: String,
        /// A description of the data shape that was expected.
        expected: &'static str,
    },

    /// A failure raised with a plain message.
    #[error("{0}")]
    Message(String),

    /// Any other failure raised by user supplied code.
    #[error(transparent)]
    Custom(Arc<dyn Error + Send + Sync>),
}

impl ModelError {
    /// A failure carrying only a message, displayed verbatim.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error raised by user supplied code.
    pub fn custom<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(error))
    }

    pub(crate) fn invalid_rule(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_displays_messages_verbatim() {
        assert_eq!(ModelError::message("5 > 3").to_string(), "5 > 3");
    }

    #[test]
    fn it_displays_custom_errors_transparently() {
        let error = ModelError::custom(std::io::Error::other("disk on fire"));
        assert_eq!(error.to_string(), "disk on fire");
    }

    #[test]
    fn it_names_the_offending_field() {
        let error = ModelError::invalid_rule("children", "unbalanced brackets");
        assert_eq!(
            error.to_string(),
            "Invalid rule for field 'children': unbalanced brackets"
        );
    }
}
