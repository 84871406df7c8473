//! TestClient for integration testing without network binding
//!
//! Requests go through the same [`Dispatcher`] the server uses, so routing,
//! middleware, the not-found fallback and body limits all apply.
//!
//! # Example
//!
//! ```rust,ignore
//! use bramble::prelude::*;
//!
//! async fn hello(ctx: Context) -> Result<Response> {
//!     Ok(ctx.text("Hello, World!"))
//! }
//!
//! #[tokio::test]
//! async fn test_hello() {
//!     let client = TestClient::new(App::new().get("/", hello));
//!
//!     let response = client.get("/").await;
//!     response.assert_status(StatusCode::OK);
//!     assert_eq!(response.text(), "Hello, World!");
//! }
//! ```

use crate::app::App;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::response::{self, Response};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::{de::DeserializeOwned, Serialize};

/// Test client driving a [`Dispatcher`] in-process
pub struct TestClient {
    dispatcher: Dispatcher,
}

impl TestClient {
    /// Build the app and wrap its dispatcher
    pub fn new(app: App) -> Self {
        Self::from_dispatcher(app.build())
    }

    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// Send a POST request with JSON body
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> TestResponse {
        self.request(TestRequest::post(path).json(body)).await
    }

    /// Send a request, answering errors that escape dispatch with a plain
    /// 500 as the server does
    pub async fn request(&self, req: TestRequest) -> TestResponse {
        match self.try_request(req).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "Dispatch returned an error");
                TestResponse::from_response(response::internal_error()).await
            }
        }
    }

    /// Send a request and return dispatch errors to the caller
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let err = client.try_request(TestRequest::get("/boom")).await.unwrap_err();
    /// ```
    pub async fn try_request(&self, req: TestRequest) -> Result<TestResponse> {
        let mut builder = http::Request::builder().method(req.method).uri(req.path);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(req.headers);
        }
        let request = builder.body(Full::new(req.body.unwrap_or_default()))?;

        let response = self.dispatcher.handle(request).await?;
        Ok(TestResponse::from_response(response).await)
    }
}

/// Test request builder
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl TestRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a header, replacing earlier values; invalid names or values are ignored
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (
            key.parse::<header::HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Add a `name=value` pair to the `Cookie` header
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        let pair = format!("{}={}", name, value);
        let cookie = match self.headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}; {}", existing, pair),
            None => pair,
        };
        if let Ok(cookie) = HeaderValue::from_str(&cookie) {
            self.headers.insert(header::COOKIE, cookie);
        }
        self
    }

    /// Set the request body as JSON, with `Content-Type: application/json`
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        if let Ok(bytes) = serde_json::to_vec(body) {
            self.body = Some(Bytes::from(bytes));
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        self
    }

    /// Set the request body as a urlencoded form
    pub fn form<T: Serialize>(mut self, body: &T) -> Self {
        if let Ok(encoded) = serde_urlencoded::to_string(body) {
            self.body = Some(Bytes::from(encoded));
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }
        self
    }

    /// Set the request body as raw bytes
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(self, content_type: &str) -> Self {
        self.header("content-type", content_type)
    }
}

/// Test response with assertion helpers
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();

        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is visible ASCII
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Every value of a repeated header such as `Set-Cookie`
    pub fn header_all(&self, key: &str) -> Vec<&str> {
        self.headers
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as a string, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Assert the status code
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status<S: Into<StatusCode>>(&self, expected: S) -> &Self {
        let expected = expected.into();
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert a header value
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, key: &str, expected: &str) -> &Self {
        let actual = self.header(key).unwrap_or("");
        assert_eq!(
            actual, expected,
            "Expected header '{}' to be '{}', got '{}'",
            key, expected, actual
        );
        self
    }

    /// Assert that a header is absent
    pub fn assert_no_header(&self, key: &str) -> &Self {
        assert!(
            self.headers.get(key).is_none(),
            "Expected no '{}' header, got {:?}",
            key,
            self.headers.get(key)
        );
        self
    }

    /// Assert the body equals `expected` once parsed as JSON
    ///
    /// # Panics
    ///
    /// Panics if the body can't be parsed as JSON or doesn't match.
    pub fn assert_json<T: DeserializeOwned + PartialEq + std::fmt::Debug>(
        &self,
        expected: &T,
    ) -> &Self {
        let actual: T = self
            .json()
            .unwrap_or_else(|err| panic!("Failed to parse response body as JSON: {}", err));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    pub fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = self.text();
        assert!(
            body.contains(expected),
            "Expected body to contain '{}', got '{}'",
            expected,
            body
        );
        self
    }
}
