//! Route table built on a radix tree (matchit)
//!
//! Routes are registered per HTTP method using path patterns:
//!
//! - `/users` - Static path
//! - `/users/:id` - Named parameter
//! - `/files/*/download` - Unnamed wildcard segment
//! - `/static/*` - Trailing wildcard, matches the rest of the path
//!
//! The matcher only understands named captures, so every `*` is rewritten to
//! a synthetic name (`wildcard1`, `wildcard2`, ...) before insertion. Those
//! captures never reach the handler's parameter map, and the original pattern
//! is kept for [`Context::route_pathname`](crate::Context::route_pathname).
//!
//! Match precedence (static over named over wildcard) is the matcher's own.

use crate::error::RouteError;
use crate::handler::BoxedHandler;
use crate::middleware::BoxedMiddleware;
use http::Method;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::sync::Arc;

/// Prefix of the synthetic capture names given to `*` segments
const WILDCARD_PREFIX: &str = "wildcard";

/// A registered route
pub struct Route {
    method: Method,
    pattern: String,
    converted: String,
    pub(crate) handler: BoxedHandler,
    pub(crate) middleware: Vec<BoxedMiddleware>,
}

impl Route {
    /// HTTP method this route answers
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The pattern as registered, with `*` intact
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The pattern handed to the matcher
    pub fn converted_pattern(&self) -> &str {
        &self.converted
    }

    /// Number of route-specific middleware
    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("converted", &self.converted)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Result of a successful lookup
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    /// Named captures, wildcard captures excluded
    pub params: HashMap<String, String>,
}

/// Maps `(method, path)` to a route and its captured parameters
#[derive(Default)]
pub struct RouteTable {
    routers: HashMap<Method, MatchitRouter<Arc<Route>>>,
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// Fails only when the matcher rejects the converted pattern, e.g. on a
    /// conflicting or malformed wildcard.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: Vec<BoxedMiddleware>,
        handler: BoxedHandler,
    ) -> Result<(), RouteError> {
        let converted = convert_wildcards(pattern);
        let route = Arc::new(Route {
            method: method.clone(),
            pattern: pattern.to_string(),
            converted: converted.clone(),
            handler,
            middleware,
        });

        self.routers
            .entry(method.clone())
            .or_insert_with(MatchitRouter::new)
            .insert(converted.clone(), route.clone())
            .map_err(|e| RouteError {
                method,
                pattern: pattern.to_string(),
                converted,
                details: e.to_string(),
            })?;

        self.routes.push(route);
        Ok(())
    }

    /// Look up the route for a concrete request path
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let matched = self.routers.get(method)?.at(path).ok()?;

        let params = matched
            .params
            .iter()
            .filter(|(name, _)| !is_wildcard_name(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Some(RouteMatch {
            route: matched.value.clone(),
            params,
        })
    }

    /// Registered routes in registration order
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Rewrite each `*` segment to a numbered capture.
///
/// A trailing `*` becomes a catch-all, any other becomes a single-segment
/// capture.
pub(crate) fn convert_wildcards(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split('/').collect();
    let last = segments.len() - 1;
    let mut count = 0;

    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if *segment != "*" {
                return segment.to_string();
            }
            count += 1;
            if i == last {
                format!("*{}{}", WILDCARD_PREFIX, count)
            } else {
                format!(":{}{}", WILDCARD_PREFIX, count)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a capture name follows the synthetic wildcard convention
pub(crate) fn is_wildcard_name(name: &str) -> bool {
    name.strip_prefix(WILDCARD_PREFIX)
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}
