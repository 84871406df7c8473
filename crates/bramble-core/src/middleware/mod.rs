//! Middleware for Bramble
//!
//! Middleware wrap the route handler in onion order. Global middleware are
//! added with `.middleware()` / `.middleware_at()` on [`App`](crate::App) and
//! always run before a route's own middleware.
//!
//! # Example
//!
//! ```rust,ignore
//! use bramble::prelude::*;
//!
//! App::new()
//!     .middleware(TracingMiddleware::new())
//!     .middleware_at("/api/*", |ctx: Context, next: Next| async move {
//!         if ctx.header("authorization").is_none() {
//!             return Ok(ctx.text_with_status("Unauthorized", StatusCode::UNAUTHORIZED));
//!         }
//!         next.run(ctx).await
//!     })
//!     .get("/api/users", list_users)
//!     .run("127.0.0.1:8080")
//!     .await
//! ```

mod chain;
mod tracing_layer;

pub use chain::{into_boxed_middleware, BoxedMiddleware, Middleware, MiddlewareStack, Next};
pub use tracing_layer::TracingMiddleware;
