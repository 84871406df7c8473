//! Middleware chain execution
//!
//! A chain is an ordered list of middleware ending in a handler. Each
//! middleware receives the request [`Context`] and a [`Next`] continuation:
//!
//! - calling `next.run(ctx).await` runs everything downstream and hands back
//!   its response, so code after the call runs once the inner chain is done
//!   (onion order);
//! - returning a response without calling `next` short-circuits the chain;
//! - returning `Err` propagates through every enclosing `next.run(..)` call.
//!
//! Every middleware must resolve to `Result<Response>`, so a chain cannot
//! stall without producing either a response or an error.

use crate::context::Context;
use crate::error::Result;
use crate::handler::BoxedHandler;
use crate::response::Response;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Trait for middleware that wraps the rest of the chain
///
/// Implemented for every `Fn(Context, Next) -> impl Future<Output = Result<Response>>`.
///
/// # Example
///
/// ```rust,ignore
/// async fn require_auth(ctx: Context, next: Next) -> Result<Response> {
///     if ctx.header("authorization").is_none() {
///         return Ok(ctx.text_with_status("Unauthorized", StatusCode::UNAUTHORIZED));
///     }
///     next.run(ctx).await
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Handle the request, calling `next` to continue the chain
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, Result<Response>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, Result<Response>> {
        Box::pin(self(ctx, next))
    }
}

/// Type-erased middleware
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Erase a middleware's concrete type, e.g. for route-specific lists
pub fn into_boxed_middleware<M: Middleware>(middleware: M) -> BoxedMiddleware {
    Arc::new(middleware)
}

/// Continuation handed to each middleware.
///
/// Holds the shared chain, a cursor into it and the terminal handler. It is
/// consumed by [`run`](Next::run), so it can be invoked at most once.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    handler: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, handler: BoxedHandler) -> Self {
        Self {
            chain,
            index: 0,
            handler,
        }
    }

    /// Run the rest of the chain
    pub async fn run(self, ctx: Context) -> Result<Response> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                    handler: self.handler,
                };
                middleware.call(ctx, next).await
            }
            None => self.handler.call(ctx).await,
        }
    }

    /// Number of middleware still to run before the handler
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("len", &self.chain.len())
            .finish()
    }
}

/// An ordered list of middleware
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<BoxedMiddleware>,
}

impl MiddlewareStack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware to the end of the stack.
    ///
    /// Middleware run in the order they are added (outermost first).
    pub fn push(&mut self, middleware: BoxedMiddleware) {
        self.layers.push(middleware);
    }

    /// Append every middleware from an iterator, preserving order
    pub fn extend(&mut self, middleware: impl IntoIterator<Item = BoxedMiddleware>) {
        self.layers.extend(middleware);
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Execute the stack, terminating in `handler`
    pub async fn execute(self, ctx: Context, handler: BoxedHandler) -> Result<Response> {
        Next::new(self.layers.into(), handler).run(ctx).await
    }
}

impl FromIterator<BoxedMiddleware> for MiddlewareStack {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}
