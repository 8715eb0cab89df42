use crate::{ModelError, Value};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt::{Debug, Formatter};
use std::future::Future;

/// The outcome of a read predicate.
pub enum Verdict {
    /// Reading is permitted.
    Allow,
    /// Reading is denied; the field's `read_fail` handler decides the result.
    Deny,
    /// The decision is not available yet. The field read becomes pending and
    /// continues once the decision settles.
    Pending(BoxFuture<'static, Result<bool, ModelError>>),
}

impl Verdict {
    /// A decision that settles once `future` completes.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<bool, ModelError>> + Send + 'static,
    {
        Verdict::Pending(future.boxed())
    }
}

impl From<bool> for Verdict {
    fn from(allowed: bool) -> Self {
        if allowed {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

impl Debug for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allow => f.write_str("Allow"),
            Verdict::Deny => f.write_str("Deny"),
            Verdict::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Anything a read predicate may return.
///
/// Predicates may answer with a plain `bool`, with a [`Value`] (judged by
/// truthiness), with a [`Verdict`] when the decision is asynchronous, or with
/// a `Result` of any of these when the decision itself can fail.
pub trait IntoVerdict {
    /// Convert into a decision.
    fn into_verdict(self) -> Result<Verdict, ModelError>;
}

impl IntoVerdict for bool {
    fn into_verdict(self) -> Result<Verdict, ModelError> {
        Ok(self.into())
    }
}

impl IntoVerdict for Verdict {
    fn into_verdict(self) -> Result<Verdict, ModelError> {
        Ok(self)
    }
}

impl IntoVerdict for Value {
    fn into_verdict(self) -> Result<Verdict, ModelError> {
        match self {
            Value::Pending(pending) => Ok(Verdict::pending(async move {
                Ok(pending.await?.is_truthy())
            })),
            value => Ok(value.is_truthy().into()),
        }
    }
}

impl<T: IntoVerdict> IntoVerdict for Result<T, ModelError> {
    fn into_verdict(self) -> Result<Verdict, ModelError> {
        self?.into_verdict()
    }
}
