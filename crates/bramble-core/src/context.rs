//! Per-request context
//!
//! A [`Context`] is created by the dispatcher for every incoming request and
//! handed (as a cheap clone) to each middleware and to the handler. It gives
//! a read-only view of the request, lazily reads and caches the body, carries
//! a per-request key/value store and builds responses.
//!
//! ```rust,ignore
//! async fn create_user(ctx: Context) -> Result<Response> {
//!     let user: NewUser = ctx.body_json().await?;
//!     ctx.set_header("X-Request-Source", "api")?;
//!     ctx.json_with_status(&user, StatusCode::CREATED)
//! }
//! ```

use crate::cookie::{parse_cookie_header, serialize_cookie, CookieOptions};
use crate::error::{BoxError, Error, Result};
use crate::form::{parse_form, FormData};
use crate::response::{self, Response, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Type-erased request body stream
pub(crate) type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Value held in the context store
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Raw body bytes together with the request's declared content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub content_type: Option<String>,
}

impl Blob {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Default)]
struct QueryParams {
    first: HashMap<String, String>,
    all: HashMap<String, Vec<String>>,
}

impl QueryParams {
    fn parse(query: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = query
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();

        let mut params = Self::default();
        for (key, value) in pairs {
            params
                .first
                .entry(key.clone())
                .or_insert_with(|| value.clone());
            params.all.entry(key).or_default().push(value);
        }
        params
    }
}

/// Progress of the one-shot body read.
///
/// Frames are buffered as they arrive, so a read that is dropped halfway
/// resumes where it stopped. The final outcome, success or failure, is kept.
enum BodyState {
    Reading {
        body: RequestBody,
        buffered: BytesMut,
        limit: Option<usize>,
    },
    Done(std::result::Result<Bytes, BodyFailure>),
}

/// Replayable copy of a failed body read
#[derive(Clone)]
enum BodyFailure {
    TooLarge { limit: usize },
    Stream(Arc<dyn std::error::Error + Send + Sync>),
}

impl From<BodyFailure> for Error {
    fn from(failure: BodyFailure) -> Self {
        match failure {
            BodyFailure::TooLarge { limit } => Error::PayloadTooLarge { limit },
            BodyFailure::Stream(err) => Error::Body(err),
        }
    }
}

struct Inner {
    parts: Parts,
    params: HashMap<String, String>,
    route_pattern: String,
    query: QueryParams,
    cookies: HashMap<String, String>,
    href: String,
    body: tokio::sync::Mutex<BodyState>,
    pending_headers: Mutex<HeaderMap>,
    store: Mutex<HashMap<String, ContextValue>>,
}

/// Request context shared by the middleware chain and the handler
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Build the context for one request.
    ///
    /// Query, cookies and `href` are derived here, once.
    pub(crate) fn from_request<B>(
        request: http::Request<B>,
        params: HashMap<String, String>,
        route_pattern: &str,
        body_limit: Option<usize>,
    ) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<u64>().ok());
        let body = match body_limit {
            Some(limit) if declared.is_some_and(|len| len > limit as u64) => {
                BodyState::Done(Err(BodyFailure::TooLarge { limit }))
            }
            Some(limit) => BodyState::Reading {
                body: Limited::new(body, limit).boxed_unsync(),
                buffered: BytesMut::new(),
                limit: Some(limit),
            },
            None => BodyState::Reading {
                body: body.map_err(Into::into).boxed_unsync(),
                buffered: BytesMut::new(),
                limit: None,
            },
        };

        let query = QueryParams::parse(parts.uri.query());
        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .fold(HashMap::new(), |mut cookies, value| {
                for (name, value) in parse_cookie_header(value) {
                    cookies.entry(name).or_insert(value);
                }
                cookies
            });
        let href = build_href(&parts.uri, &parts.headers);

        Self {
            inner: Arc::new(Inner {
                parts,
                params,
                route_pattern: route_pattern.to_string(),
                query,
                cookies,
                href,
                body: tokio::sync::Mutex::new(body),
                pending_headers: Mutex::new(HeaderMap::new()),
                store: Mutex::new(HashMap::new()),
            }),
        }
    }

    // --- request line -------------------------------------------------

    pub fn method(&self) -> &Method {
        &self.inner.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.parts.uri
    }

    /// Full request URL, e.g. `http://example.com/users?page=2`
    pub fn href(&self) -> &str {
        &self.inner.href
    }

    /// Path component of the request URL
    pub fn pathname(&self) -> &str {
        self.inner.parts.uri.path()
    }

    /// The registered pattern that matched, `*` segments intact.
    ///
    /// Empty when no route matched (inside a not-found handler).
    pub fn route_pathname(&self) -> &str {
        &self.inner.route_pattern
    }

    // --- params, query, headers, cookies --------------------------------

    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.inner.params
    }

    /// First value of a query parameter
    pub fn query(&self, name: &str) -> Option<&str> {
        self.inner.query.first.get(name).map(String::as_str)
    }

    /// Every query parameter, first value per key
    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.inner.query.first
    }

    /// All values of a repeated query parameter in URL order.
    ///
    /// `None` when the key does not occur; never `Some` of an empty slice.
    pub fn queries(&self, name: &str) -> Option<&[String]> {
        self.inner.query.all.get(name).map(Vec::as_slice)
    }

    /// Case-insensitive header lookup; non-visible-ASCII values read as absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.parts.headers
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.inner.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.inner.cookies
    }

    // --- body -----------------------------------------------------------

    /// Raw body bytes.
    ///
    /// The stream is read on the first call and its outcome cached; every
    /// body accessor decodes from that cache. A failed read fails the same
    /// way on every later call.
    pub async fn body_bytes(&self) -> Result<Bytes> {
        let mut state = self.inner.body.lock().await;
        loop {
            let outcome = match &mut *state {
                BodyState::Done(outcome) => return outcome.clone().map_err(Error::from),
                BodyState::Reading {
                    body,
                    buffered,
                    limit,
                } => match body.frame().await {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            buffered.extend_from_slice(&data);
                        }
                        continue;
                    }
                    None => Ok(std::mem::take(buffered).freeze()),
                    Some(Err(err)) => Err(match *limit {
                        Some(limit) if err.is::<LengthLimitError>() => {
                            BodyFailure::TooLarge { limit }
                        }
                        _ => BodyFailure::Stream(Arc::from(err)),
                    }),
                },
            };
            *state = BodyState::Done(outcome);
        }
    }

    pub async fn body_text(&self) -> Result<String> {
        let bytes = self.body_bytes().await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    pub async fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.body_bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Decode a urlencoded or multipart form
    pub async fn body_form(&self) -> Result<FormData> {
        let bytes = self.body_bytes().await?;
        parse_form(self.header(header::CONTENT_TYPE.as_str()), &bytes)
    }

    pub async fn body_blob(&self) -> Result<Blob> {
        Ok(Blob {
            data: self.body_bytes().await?,
            content_type: self
                .header(header::CONTENT_TYPE.as_str())
                .map(str::to_string),
        })
    }

    // --- store ----------------------------------------------------------

    /// Store a value for the rest of this request, replacing any previous one
    pub fn set_context<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
    }

    /// Read a typed value from the store.
    ///
    /// Returns `Ok(None)` for unset keys and [`Error::ContextType`] when the
    /// key holds a value of another type.
    pub fn get_context<T: Any + Clone + Send + Sync>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get_context_raw(key) else {
            return Ok(None);
        };
        value
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::ContextType {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Read the untyped value stored under `key`
    pub fn get_context_raw(&self, key: &str) -> Option<ContextValue> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    // --- staged headers -----------------------------------------------------

    /// Stage a response header; the last value set for a name wins
    pub fn set_header(&self, key: &str, value: impl fmt::Display) -> Result<()> {
        let invalid = || Error::InvalidHeader {
            name: key.to_string(),
        };
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(&value.to_string()).map_err(|_| invalid())?;

        self.pending_headers().insert(name, value);
        Ok(())
    }

    /// Stage a `Set-Cookie` header; each call adds another cookie
    pub fn set_cookie(&self, key: &str, value: &str, options: &CookieOptions) -> Result<()> {
        let cookie = serialize_cookie(key, value, options);
        let value = HeaderValue::from_str(&cookie).map_err(|_| Error::InvalidHeader {
            name: header::SET_COOKIE.to_string(),
        })?;

        self.pending_headers().append(header::SET_COOKIE, value);
        Ok(())
    }

    fn pending_headers(&self) -> std::sync::MutexGuard<'_, HeaderMap> {
        self.inner
            .pending_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // --- response builders ----------------------------------------------------

    fn respond(&self, status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response {
        let mut response = response::build(status, content_type, body);
        response::merge_headers(&mut response, &self.pending_headers());
        response
    }

    /// `200 OK` with a `text/plain` body
    pub fn text(&self, content: impl Into<String>) -> Response {
        self.text_with_status(content, StatusCode::OK)
    }

    pub fn text_with_status(&self, content: impl Into<String>, status: StatusCode) -> Response {
        self.respond(status, Some(TEXT_PLAIN), Bytes::from(content.into()))
    }

    /// `200 OK` with `data` serialized as JSON
    pub fn json<T: Serialize + ?Sized>(&self, data: &T) -> Result<Response> {
        self.json_with_status(data, StatusCode::OK)
    }

    pub fn json_with_status<T: Serialize + ?Sized>(
        &self,
        data: &T,
        status: StatusCode,
    ) -> Result<Response> {
        let body = serde_json::to_vec(data)?;
        Ok(self.respond(status, Some(APPLICATION_JSON), Bytes::from(body)))
    }

    /// `200 OK` with a `text/html` body
    pub fn html(&self, content: impl Into<String>) -> Response {
        self.html_with_status(content, StatusCode::OK)
    }

    pub fn html_with_status(&self, content: impl Into<String>, status: StatusCode) -> Response {
        self.respond(status, Some(TEXT_HTML), Bytes::from(content.into()))
    }

    /// `204 No Content` with no body and no `Content-Type`
    pub fn null(&self) -> Response {
        self.null_with_status(StatusCode::NO_CONTENT)
    }

    pub fn null_with_status(&self, status: StatusCode) -> Response {
        self.respond(status, None, Bytes::new())
    }

    /// `302 Found` pointing at `location`
    pub fn redirect(&self, location: &str) -> Result<Response> {
        self.redirect_with_status(location, StatusCode::FOUND)
    }

    pub fn redirect_with_status(&self, location: &str, status: StatusCode) -> Result<Response> {
        let location = HeaderValue::from_str(location).map_err(|_| Error::InvalidHeader {
            name: header::LOCATION.to_string(),
        })?;
        let mut response = response::build(status, None, Bytes::new());
        response.headers_mut().insert(header::LOCATION, location);
        response::merge_headers(&mut response, &self.pending_headers());
        Ok(response)
    }
}

#[cfg(test)]
impl Context {
    /// Context for `GET /` with no body
    pub(crate) fn empty() -> Self {
        Self::for_test(Method::GET, "/")
    }

    pub(crate) fn for_test(method: Method, uri: &str) -> Self {
        let request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(http_body_util::Empty::<Bytes>::new())
            .unwrap();
        Self::from_request(request, HashMap::new(), "", None)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.method())
            .field("href", &self.inner.href)
            .field("route", &self.inner.route_pattern)
            .field("params", &self.inner.params)
            .finish_non_exhaustive()
    }
}

/// Rebuild the full URL: absolute request URIs are kept, otherwise the
/// `Host` header (or `localhost`) supplies the authority.
fn build_href(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    format!("http://{}{}", host, path_and_query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::SameSite;
    use futures_util::StreamExt;
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};
    use serde::Deserialize;
    use std::time::Duration;

    fn context(request: http::Request<Full<Bytes>>) -> Context {
        Context::from_request(request, HashMap::new(), "", None)
    }

    fn post(uri: &str, content_type: &str, body: &'static [u8]) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        a: i32,
    }

    #[tokio::test]
    async fn body_accessors_share_one_read() {
        let ctx = context(post("/x", "application/json", br#"{"a":1}"#));

        assert_eq!(ctx.body_text().await.unwrap(), r#"{"a":1}"#);
        assert_eq!(ctx.body_json::<Payload>().await.unwrap(), Payload { a: 1 });
        assert_eq!(ctx.body_bytes().await.unwrap().len(), 7);
        assert_eq!(ctx.body_text().await.unwrap(), r#"{"a":1}"#);

        let blob = ctx.body_blob().await.unwrap();
        assert_eq!(blob.size(), 7);
        assert_eq!(blob.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn clones_share_the_body_cache() {
        let ctx = context(post("/x", "text/plain", b"hello"));
        let clone = ctx.clone();

        assert_eq!(ctx.body_text().await.unwrap(), "hello");
        assert_eq!(clone.body_text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn decode_failure_keeps_cached_bytes() {
        let ctx = context(post("/x", "application/json", b"not json"));

        let err = ctx.body_json::<Payload>().await.unwrap_err();
        assert!(err.is_body_decode());
        assert_eq!(ctx.body_text().await.unwrap(), "not json");
    }

    #[tokio::test]
    async fn body_form_decodes_urlencoded() {
        let ctx = context(post(
            "/x",
            "application/x-www-form-urlencoded",
            b"name=Ada&lang=rust",
        ));

        let form = ctx.body_form().await.unwrap();
        assert_eq!(form.text("name"), Some("Ada"));
        assert_eq!(form.text("lang"), Some("rust"));
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_rejected() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_LENGTH, "64")
            .body(Full::new(Bytes::from_static(&[0u8; 64])))
            .unwrap();
        let ctx = Context::from_request(request, HashMap::new(), "", Some(16));

        let err = ctx.body_bytes().await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn streamed_body_over_limit_is_rejected() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(Full::new(Bytes::from_static(&[0u8; 64])))
            .unwrap();
        let ctx = Context::from_request(request, HashMap::new(), "", Some(16));

        let err = ctx.body_bytes().await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 16 }));
        assert!(matches!(
            ctx.body_text().await.unwrap_err(),
            Error::PayloadTooLarge { limit: 16 }
        ));
    }

    fn streamed<S>(stream: S) -> Context
    where
        S: futures_util::Stream<Item = std::result::Result<Frame<Bytes>, std::io::Error>>
            + Send
            + 'static,
    {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(StreamBody::new(stream))
            .unwrap();
        Context::from_request(request, HashMap::new(), "", Some(1024))
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_read_resumes_on_next_call() {
        let ctx = streamed(futures_util::stream::iter([Ok::<_, std::io::Error>(Frame::data(
            Bytes::from("hel"),
        ))]).chain(
            futures_util::stream::once(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Frame::data(Bytes::from("lo")))
            }),
        ));

        let early = tokio::time::timeout(Duration::from_millis(5), ctx.body_bytes()).await;
        assert!(early.is_err());

        assert_eq!(ctx.body_text().await.unwrap(), "hello");
        assert_eq!(ctx.body_bytes().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn stream_failure_is_replayed() {
        let ctx = streamed(futures_util::stream::iter([
            Ok(Frame::data(Bytes::from("partial"))),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away")),
        ]));

        let first = ctx.body_bytes().await.unwrap_err();
        let second = ctx.body_json::<serde_json::Value>().await.unwrap_err();

        assert!(matches!(first, Error::Body(_)));
        assert!(matches!(second, Error::Body(_)));
        assert_eq!(first.to_string(), second.to_string());
        assert!(first.to_string().contains("peer went away"));
    }

    #[test]
    fn body_readers_are_send() {
        fn assert_send<T: Send>(_: T) {}

        let ctx = Context::empty();
        assert_send(ctx.body_bytes());
        assert_send(ctx.body_text());
        assert_send(ctx.body_json::<serde_json::Value>());
        assert_send(ctx.body_form());
        assert_send(ctx.body_blob());
    }

    #[tokio::test]
    async fn body_within_limit_is_read() {
        let request = post("/x", "text/plain", b"small");
        let ctx = Context::from_request(request, HashMap::new(), "", Some(16));
        assert_eq!(ctx.body_text().await.unwrap(), "small");
    }

    #[test]
    fn duplicate_query_keys() {
        let ctx = Context::for_test(Method::GET, "/search?tag=A&tag=B&tag=C&page=2");

        assert_eq!(ctx.query("tag"), Some("A"));
        assert_eq!(
            ctx.queries("tag"),
            Some(&["A".to_string(), "B".to_string(), "C".to_string()][..])
        );
        assert_eq!(ctx.query("page"), Some("2"));
        assert_eq!(ctx.query_map().len(), 2);
        assert_eq!(ctx.queries("missing"), None);
    }

    #[test]
    fn query_values_are_percent_decoded() {
        let ctx = Context::for_test(Method::GET, "/search?q=hello%20world&name=a+b");
        assert_eq!(ctx.query("q"), Some("hello world"));
        assert_eq!(ctx.query("name"), Some("a b"));
    }

    #[test]
    fn url_parts() {
        let request = http::Request::builder()
            .uri("/users/42?tab=posts")
            .header(header::HOST, "example.com")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let ctx = Context::from_request(request, HashMap::new(), "/users/:id", None);

        assert_eq!(ctx.href(), "http://example.com/users/42?tab=posts");
        assert_eq!(ctx.pathname(), "/users/42");
        assert_eq!(ctx.route_pathname(), "/users/:id");
        assert_eq!(ctx.method(), Method::GET);
    }

    #[test]
    fn absolute_uri_is_kept_as_href() {
        let ctx = Context::for_test(Method::GET, "https://api.example.com/v1/items?x=1");
        assert_eq!(ctx.href(), "https://api.example.com/v1/items?x=1");
        assert_eq!(ctx.pathname(), "/v1/items");
    }

    #[test]
    fn params_and_headers() {
        let request = http::Request::builder()
            .uri("/users/7")
            .header("X-Request-Id", "abc")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        let ctx = Context::from_request(request, params, "/users/:id", None);

        assert_eq!(ctx.param("id"), Some("7"));
        assert_eq!(ctx.param("missing"), None);
        assert_eq!(ctx.header("x-request-id"), Some("abc"));
        assert_eq!(ctx.header("X-REQUEST-ID"), Some("abc"));
        assert_eq!(ctx.headers().len(), 1);
    }

    #[test]
    fn cookies_are_parsed_first_wins() {
        let request = http::Request::builder()
            .uri("/")
            .header(header::COOKIE, "session=abc; theme=dark; session=later")
            .header(header::COOKIE, "lang=en")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let ctx = context(request);

        assert_eq!(ctx.cookie("session"), Some("abc"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.cookie("lang"), Some("en"));
        assert_eq!(ctx.cookies().len(), 3);
    }

    #[test]
    fn store_is_typed_and_overwrites() {
        let ctx = Context::empty();

        assert_eq!(ctx.get_context::<u32>("user_id").unwrap(), None);

        ctx.set_context("user_id", 7u32);
        ctx.set_context("user_id", 8u32);
        assert_eq!(ctx.get_context::<u32>("user_id").unwrap(), Some(8));

        let err = ctx.get_context::<String>("user_id").unwrap_err();
        assert!(matches!(err, Error::ContextType { ref key, .. } if key == "user_id"));

        let raw = ctx.get_context_raw("user_id").unwrap();
        assert_eq!(raw.downcast_ref::<u32>(), Some(&8));
    }

    #[test]
    fn store_is_shared_between_clones() {
        let ctx = Context::empty();
        ctx.clone().set_context("role", "admin".to_string());
        assert_eq!(
            ctx.get_context::<String>("role").unwrap().as_deref(),
            Some("admin")
        );
    }

    #[test]
    fn builders_set_status_and_content_type() {
        let ctx = Context::empty();

        let response = ctx.text("hi");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

        let response = ctx.json_with_status(&serde_json::json!({"ok": true}), StatusCode::CREATED).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let response = ctx.html("<p>hi</p>");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let response = ctx.null();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());

        let response = ctx.redirect("/login").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn json_body_is_serialized() {
        let ctx = Context::empty();
        let response = ctx.json(&serde_json::json!({"a": 1})).unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"a":1}"#);
    }

    #[test]
    fn staged_headers_are_merged_last_write_wins() {
        let ctx = Context::empty();
        ctx.set_header("X-Version", 1).unwrap();
        ctx.set_header("x-version", 2).unwrap();
        ctx.set_header("Content-Type", "text/plain; charset=utf-8").unwrap();

        let response = ctx.text("hi");
        assert_eq!(response.headers()["x-version"], "2");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn invalid_header_is_rejected() {
        let ctx = Context::empty();
        let err = ctx.set_header("bad header", "v").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { ref name } if name == "bad header"));

        let err = ctx.set_header("X-Ok", "line\nbreak").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { .. }));
    }

    #[test]
    fn cookies_are_appended() {
        let ctx = Context::empty();
        let options = CookieOptions::new()
            .max_age(3600)
            .domain("example.com")
            .path("/")
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Strict);
        ctx.set_cookie("session", "abc123", &options).unwrap();
        ctx.set_cookie("theme", "dark", &CookieOptions::new()).unwrap();

        let response = ctx.redirect("/home").unwrap();
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(
            cookies,
            vec![
                "session=abc123; Max-Age=3600; Domain=example.com; Path=/; Secure; HttpOnly; SameSite=Strict",
                "theme=dark",
            ]
        );
        assert_eq!(response.headers()[header::LOCATION], "/home");
    }
}
