use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A value that may not be available yet.
///
/// `Deferred<T, E>` wraps a fallible future so that it can be cloned, handed
/// to any number of consumers and polled by each of them independently. The
/// wrapped future is driven at most once; every clone observes the same
/// `Result<T, E>` once it settles.
///
/// Composition is uniform: [`map`](Deferred::map) and
/// [`and_then`](Deferred::and_then) produce new deferred values that apply
/// their function after the source settles, so a chain of transformations can
/// be assembled without knowing whether the input is already available.
///
/// ```rust
/// # use graph_rule_common::Deferred;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let answer: Deferred<u32, String> = Deferred::new(async { Ok(40) });
/// let answer = answer.map(|value| value + 2);
///
/// assert_eq!(answer.clone().await, Ok(42));
/// assert_eq!(answer.peek(), Some(&Ok(42)));
/// # }
/// ```
pub struct Deferred<T, E> {
    inner: Shared<BoxFuture<'static, Result<T, E>>>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wrap a future that will eventually produce a `Result<T, E>`.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// A deferred value that is settled from the start.
    pub fn ready(result: Result<T, E>) -> Self {
        Self::new(futures_util::future::ready(result))
    }

    /// Apply `f` to the successful output once it is available.
    pub fn map<U, F>(self, f: F) -> Deferred<U, E>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Deferred::new(async move { self.await.map(f) })
    }

    /// Apply a fallible `f` to the successful output once it is available.
    pub fn and_then<U, F>(self, f: F) -> Deferred<U, E>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        Deferred::new(async move { self.await.and_then(f) })
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Returns the settled output, or `None` while the value is still pending.
    ///
    /// A deferred value only settles when one of its clones is polled; peeking
    /// never drives the underlying future.
    pub fn peek(&self) -> Option<&Result<T, E>> {
        self.inner.peek()
    }

    /// Whether the value has settled.
    pub fn is_ready(&self) -> bool {
        self.peek().is_some()
    }

    /// Whether both handles refer to the same underlying computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl<T, E> Clone for Deferred<T, E>
where
    T: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Future for Deferred<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T, E> Debug for Deferred<T, E>
where
    T: Clone + Debug,
    E: Clone + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.peek() {
            Some(result) => f.debug_tuple("Deferred").field(result).finish(),
            None => f.write_str("Deferred(<pending>)"),
        }
    }
}
