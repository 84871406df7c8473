//! Request dispatch
//!
//! The [`Dispatcher`] is the single per-request entry point. For each
//! request it:
//!
//! 1. looks up `(method, path)` in the route table;
//! 2. on a miss, calls the not-found handler directly (outside any
//!    middleware) or answers with the default `404 Not Found`;
//! 3. on a hit, builds the [`Context`] with the matched parameters and the
//!    registered pattern;
//! 4. selects the global middleware whose prefix applies to the path;
//! 5. runs those, then the route's own middleware, then the handler.
//!
//! Errors from middleware or handlers are returned unchanged.

use crate::context::Context;
use crate::error::{BoxError, Error, Result};
use crate::handler::BoxedHandler;
use crate::middleware::{BoxedMiddleware, MiddlewareStack};
use crate::response::{self, Response};
use crate::route_table::{RouteMatch, RouteTable};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tracing::debug;

/// A global middleware together with the path prefix it applies to
#[derive(Clone)]
pub struct GlobalMiddleware {
    prefix: String,
    middleware: BoxedMiddleware,
}

impl GlobalMiddleware {
    pub fn new(prefix: impl Into<String>, middleware: BoxedMiddleware) -> Self {
        Self {
            prefix: prefix.into(),
            middleware,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether this middleware runs for `path`
    pub fn applies_to(&self, path: &str) -> bool {
        prefix_matches(&self.prefix, path)
    }
}

impl std::fmt::Debug for GlobalMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalMiddleware")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Prefix rule for global middleware.
///
/// `*` matches every path, `P/*` matches paths starting with `P/`, any other
/// prefix must equal the path.
pub(crate) fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "*" {
        return true;
    }
    match prefix.strip_suffix('*') {
        Some(base) if base.ends_with('/') => path.starts_with(base),
        _ => prefix == path,
    }
}

/// Immutable routing state produced by [`App::build`](crate::App::build)
pub struct Dispatcher {
    routes: RouteTable,
    global: Vec<GlobalMiddleware>,
    not_found: Option<BoxedHandler>,
    body_limit: Option<usize>,
}

impl Dispatcher {
    pub(crate) fn new(
        routes: RouteTable,
        global: Vec<GlobalMiddleware>,
        not_found: Option<BoxedHandler>,
        body_limit: Option<usize>,
    ) -> Self {
        Self {
            routes,
            global,
            not_found,
            body_limit,
        }
    }

    /// Dispatch one request
    pub async fn handle<B>(&self, request: http::Request<B>) -> Result<Response>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let path = request.uri().path().to_string();

        let Some(RouteMatch { route, params }) = self.routes.find(request.method(), &path) else {
            debug!(method = %request.method(), path = %path, "No route matched");
            return match &self.not_found {
                Some(handler) => {
                    let ctx = Context::from_request(request, HashMap::new(), "", self.body_limit);
                    handler.call(ctx).await
                }
                None => Ok(response::not_found()),
            };
        };

        let ctx = Context::from_request(request, params, route.pattern(), self.body_limit);
        let chain: MiddlewareStack = self
            .global
            .iter()
            .filter(|global| global.applies_to(&path))
            .map(|global| global.middleware.clone())
            .chain(route.middleware.iter().cloned())
            .collect();

        chain.execute(ctx, route.handler.clone()).await
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn global_middleware(&self) -> &[GlobalMiddleware] {
        &self.global
    }

    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }

    /// Wrap the dispatcher in a [`tower_service::Service`]
    pub fn into_service(self) -> DispatchService {
        DispatchService {
            dispatcher: Arc::new(self),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("global", &self.global)
            .field("not_found", &self.not_found.is_some())
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

/// `tower_service::Service` adapter around a shared [`Dispatcher`]
#[derive(Clone, Debug)]
pub struct DispatchService {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl<B> tower_service::Service<http::Request<B>> for DispatchService
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Response>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        Box::pin(async move { dispatcher.handle(request).await })
    }
}
