//! Request tracing middleware
//!
//! Logs method, path, matched route, status code and duration for each request.

use super::chain::{Middleware, Next};
use crate::context::Context;
use crate::error::Result;
use crate::response::Response;
use futures_util::future::BoxFuture;
use std::time::Instant;
use tracing::{info_span, Instrument, Level};

/// Middleware that wraps every request in an `http_request` span
///
/// The span carries:
/// - HTTP method
/// - Request path
/// - Matched route pattern (empty when none matched)
/// - Response status code
/// - Request duration
/// - `error = true` for 4xx/5xx responses and for errors escaping the chain
///
/// # Example
///
/// ```rust,ignore
/// use bramble_core::middleware::TracingMiddleware;
///
/// App::new()
///     .middleware(TracingMiddleware::new())
///     .get("/", handler)
/// ```
#[derive(Debug, Clone)]
pub struct TracingMiddleware {
    level: Level,
}

impl TracingMiddleware {
    /// Create a new TracingMiddleware logging completions at INFO
    pub fn new() -> Self {
        Self { level: Level::INFO }
    }

    /// Log successful completions at a specific level
    pub fn with_level(level: Level) -> Self {
        Self { level }
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for TracingMiddleware {
    fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, Result<Response>> {
        let level = self.level;
        let method = ctx.method().to_string();
        let path = ctx.pathname().to_string();
        let route = ctx.route_pathname().to_string();

        Box::pin(async move {
            let start = Instant::now();
            let span = info_span!(
                "http_request",
                method = %method,
                path = %path,
                route = %route,
                status = tracing::field::Empty,
                duration_ms = tracing::field::Empty,
                error = tracing::field::Empty,
            );

            let result = next.run(ctx).instrument(span.clone()).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            span.record("duration_ms", duration_ms);

            let _enter = span.enter();
            match &result {
                Ok(response) => {
                    let status = response.status();
                    span.record("status", status.as_u16());

                    if status.is_client_error() || status.is_server_error() {
                        span.record("error", true);
                        tracing::warn!(
                            method = %method,
                            path = %path,
                            status = status.as_u16(),
                            duration_ms,
                            "Request failed"
                        );
                    } else {
                        log_completed(level, &method, &path, status.as_u16(), duration_ms);
                    }
                }
                Err(err) => {
                    span.record("error", true);
                    tracing::error!(
                        method = %method,
                        path = %path,
                        duration_ms,
                        error = %err,
                        "Request errored"
                    );
                }
            }

            result
        })
    }
}

fn log_completed(level: Level, method: &str, path: &str, status: u16, duration_ms: u64) {
    match level {
        Level::TRACE => tracing::trace!(method, path, status, duration_ms, "Request completed"),
        Level::DEBUG => tracing::debug!(method, path, status, duration_ms, "Request completed"),
        Level::INFO => tracing::info!(method, path, status, duration_ms, "Request completed"),
        Level::WARN => tracing::warn!(method, path, status, duration_ms, "Request completed"),
        Level::ERROR => tracing::error!(method, path, status, duration_ms, "Request completed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::handler::into_boxed_handler;
    use crate::middleware::MiddlewareStack;
    use http::StatusCode;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    /// A test subscriber that captures span fields for verification
    #[derive(Clone, Default)]
    struct SpanFieldCapture {
        spans: Arc<Mutex<Vec<CapturedSpan>>>,
    }

    #[derive(Debug, Clone)]
    struct CapturedSpan {
        name: String,
        fields: HashMap<String, String>,
    }

    impl SpanFieldCapture {
        fn http_span(&self) -> Option<CapturedSpan> {
            self.spans
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.name == "http_request")
                .cloned()
        }
    }

    impl<S> tracing_subscriber::Layer<S> for SpanFieldCapture
    where
        S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
    {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut fields = HashMap::new();
            attrs.record(&mut FieldVisitor { fields: &mut fields });
            self.spans.lock().unwrap().push(CapturedSpan {
                name: attrs.metadata().name().to_string(),
                fields,
            });
        }

        fn on_record(
            &self,
            _id: &tracing::span::Id,
            values: &tracing::span::Record<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if let Some(last) = self.spans.lock().unwrap().last_mut() {
                values.record(&mut FieldVisitor { fields: &mut last.fields });
            }
        }
    }

    struct FieldVisitor<'a> {
        fields: &'a mut HashMap<String, String>,
    }

    impl<'a> tracing::field::Visit for FieldVisitor<'a> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.fields.insert(field.name().to_string(), format!("{:?}", value));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.fields.insert(field.name().to_string(), value.to_string());
        }

        fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
            self.fields.insert(field.name().to_string(), value.to_string());
        }

        fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn traced_stack() -> MiddlewareStack {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(TracingMiddleware::new()));
        stack
    }

    #[test]
    fn test_tracing_middleware_levels() {
        assert_eq!(TracingMiddleware::new().level, Level::INFO);
        assert_eq!(TracingMiddleware::with_level(Level::DEBUG).level, Level::DEBUG);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_tracing_span_completeness(
            path in "/[a-z]{1,10}(/[a-z]{1,10})?",
            status_code in 200u16..600u16,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: std::result::Result<(), TestCaseError> = rt.block_on(async {
                let capture = SpanFieldCapture::default();
                let subscriber = tracing_subscriber::registry().with(capture.clone());
                let _guard = tracing::subscriber::set_default(subscriber);

                let status = StatusCode::from_u16(status_code).unwrap();
                let handler = into_boxed_handler(move |ctx: Context| async move {
                    Ok(ctx.text_with_status("test", status))
                });

                let ctx = Context::for_test(http::Method::POST, &path);
                let response = traced_stack().execute(ctx, handler).await.unwrap();
                prop_assert_eq!(response.status(), status);

                let span = capture.http_span();
                prop_assert!(span.is_some(), "Should have created an http_request span");
                let span = span.unwrap();

                prop_assert_eq!(span.fields.get("method").map(String::as_str), Some("POST"));
                prop_assert_eq!(span.fields.get("path").map(String::as_str), Some(path.as_str()));
                prop_assert_eq!(
                    span.fields.get("status").and_then(|s| s.parse::<u16>().ok()),
                    Some(status_code)
                );
                prop_assert!(span.fields.contains_key("duration_ms"));
                if status.is_client_error() || status.is_server_error() {
                    prop_assert_eq!(span.fields.get("error").map(String::as_str), Some("true"));
                }
                Ok(())
            });
            result?;
        }
    }

    #[tokio::test]
    async fn errors_are_recorded_and_passed_through() {
        let capture = SpanFieldCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let handler = into_boxed_handler(|_ctx: Context| async move {
            Err(Error::handler("exploded"))
        });

        let err = traced_stack()
            .execute(Context::for_test(http::Method::GET, "/boom"), handler)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "exploded");
        let span = capture.http_span().unwrap();
        assert_eq!(span.fields.get("error").map(String::as_str), Some("true"));
        assert!(!span.fields.contains_key("status"));
    }
}
