//! # Bramble Core
//!
//! Routing, middleware and request context for Bramble.
//!
//! This crate is not meant to be used directly. Use `bramble` instead.

mod app;
pub mod config;
mod context;
pub mod cookie;
mod dispatcher;
mod error;
pub mod form;
mod handler;
pub mod logging;
pub mod middleware;
mod response;
pub mod route_table;
mod server;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;

// Public API
pub use app::App;
pub use config::{ConfigError, Environment, ServerConfig, DEFAULT_BODY_LIMIT};
pub use context::{Blob, Context, ContextValue};
pub use crate::cookie::{CookieOptions, SameSite};
pub use dispatcher::{DispatchService, Dispatcher, GlobalMiddleware};
pub use error::{BoxError, Error, Result, RouteError};
pub use form::{FormData, FormFile, FormValue};
pub use handler::{into_boxed_handler, BoxedHandler, Handler};
pub use middleware::{
    into_boxed_middleware, BoxedMiddleware, Middleware, MiddlewareStack, Next, TracingMiddleware,
};
pub use response::{not_found, Response};
pub use route_table::{Route, RouteMatch, RouteTable};
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};

// Re-exported so handlers can name status codes and methods without a
// direct `http` dependency.
pub use http::{HeaderMap, Method, StatusCode};
