//! Handler trait and utilities

use crate::context::Context;
use crate::error::Result;
use crate::response::Response;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Trait representing an async request handler
///
/// Implemented for every `Fn(Context) -> impl Future<Output = Result<Response>>`,
/// so plain async functions and closures can be registered directly:
///
/// ```rust,ignore
/// async fn hello(ctx: Context) -> Result<Response> {
///     Ok(ctx.text("Hello, World!"))
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Call the handler with the request context
    fn call(&self, ctx: Context) -> BoxFuture<'static, Result<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<'static, Result<Response>> {
        Box::pin(self(ctx))
    }
}

/// Type-erased handler stored in the route table
pub type BoxedHandler = Arc<dyn Handler>;

/// Erase a handler's concrete type
pub fn into_boxed_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}
