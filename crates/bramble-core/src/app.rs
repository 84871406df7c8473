//! Bramble application builder

use crate::config::{ConfigError, ServerConfig};
use crate::dispatcher::{Dispatcher, GlobalMiddleware};
use crate::error::BoxError;
use crate::handler::{into_boxed_handler, BoxedHandler, Handler};
use crate::logging::init_tracing;
use crate::middleware::{into_boxed_middleware, BoxedMiddleware, Middleware};
use crate::route_table::RouteTable;
use crate::server::Server;
use http::Method;
use std::future::Future;
use tracing::debug;

/// Main application builder for Bramble
///
/// Routes and middleware are registered up front; [`build`](App::build)
/// freezes them into a [`Dispatcher`].
///
/// # Example
///
/// ```rust,ignore
/// use bramble::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), BoxError> {
///     App::new()
///         .middleware(TracingMiddleware::new())
///         .get("/", hello)
///         .get("/users/:id", get_user)
///         .run("127.0.0.1:8080")
///         .await
/// }
/// ```
pub struct App {
    routes: RouteTable,
    global: Vec<GlobalMiddleware>,
    not_found: Option<BoxedHandler>,
    body_limit: Option<usize>,
    config: ServerConfig,
}

impl App {
    /// Create a new application with the default [`ServerConfig`].
    ///
    /// Installs the tracing subscriber unless one is already set.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Create an application from an explicit configuration
    pub fn from_config(config: ServerConfig) -> Self {
        init_tracing(&config.log_filter);

        Self {
            routes: RouteTable::new(),
            global: Vec::new(),
            not_found: None,
            body_limit: Some(config.body_limit),
            config,
        }
    }

    /// Create an application configured from `BRAMBLE_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::from_config(ServerConfig::from_env()?))
    }

    /// Replace the server configuration.
    ///
    /// Also resets the body limit to the configured value.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.body_limit = Some(config.body_limit);
        self.config = config;
        self
    }

    /// Set the request body limit in bytes
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    /// Read request bodies without a size limit
    pub fn no_body_limit(mut self) -> Self {
        self.body_limit = None;
        self
    }

    /// Register a route.
    ///
    /// # Panics
    ///
    /// Panics with a readable report when the pattern conflicts with an
    /// existing route or is malformed.
    pub fn route<H: Handler>(self, method: Method, pattern: &str, handler: H) -> Self {
        self.route_with(method, pattern, Vec::new(), handler)
    }

    /// Register a route with its own middleware, run after the global ones
    pub fn route_with<H: Handler>(
        mut self,
        method: Method,
        pattern: &str,
        middleware: Vec<BoxedMiddleware>,
        handler: H,
    ) -> Self {
        if let Err(err) = self.routes.register(
            method,
            pattern,
            middleware,
            into_boxed_handler(handler),
        ) {
            panic!("{}", err.report());
        }
        self
    }

    pub fn get<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.route(Method::DELETE, pattern, handler)
    }

    /// Add a global middleware that runs for every path
    pub fn middleware<M: Middleware>(self, middleware: M) -> Self {
        self.middleware_at("*", middleware)
    }

    /// Add a global middleware scoped to a path prefix.
    ///
    /// `*` matches every path, `/api/*` matches paths under `/api/`, anything
    /// else must equal the request path.
    pub fn middleware_at<M: Middleware>(mut self, prefix: &str, middleware: M) -> Self {
        self.global
            .push(GlobalMiddleware::new(prefix, into_boxed_middleware(middleware)));
        self
    }

    /// Handler for requests that match no route; runs without middleware
    pub fn not_found<H: Handler>(mut self, handler: H) -> Self {
        self.not_found = Some(into_boxed_handler(handler));
        self
    }

    /// Freeze the routes and middleware into a dispatcher
    pub fn build(self) -> Dispatcher {
        for route in self.routes.routes() {
            debug!(
                method = %route.method(),
                pattern = route.pattern(),
                middleware = route.middleware_len(),
                "Registered route"
            );
        }
        for global in &self.global {
            debug!(prefix = global.prefix(), "Registered global middleware");
        }

        Dispatcher::new(self.routes, self.global, self.not_found, self.body_limit)
    }

    /// Run the server on `addr`
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// App::new()
    ///     .get("/", hello)
    ///     .run("127.0.0.1:8080")
    ///     .await
    /// ```
    pub async fn run(self, addr: &str) -> Result<(), BoxError> {
        self.run_with_shutdown(addr, std::future::pending()).await
    }

    /// Run the server on `addr` until `shutdown` resolves
    pub async fn run_with_shutdown<F>(self, addr: &str, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        Server::new(self.build())
            .run_with_shutdown(addr, shutdown)
            .await
    }

    /// Run the server on the configured `host:port`
    pub async fn serve(self) -> Result<(), BoxError> {
        let addr = self.config.socket_addr()?.to_string();
        self.run(&addr).await
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
