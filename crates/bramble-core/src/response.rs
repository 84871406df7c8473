//! Response types for Bramble
//!
//! Handlers and middleware produce a plain [`Response`]. Most of them are
//! built through the helpers on [`Context`](crate::Context), which merge in
//! headers and cookies staged earlier in the chain.
//!
//! | Helper | Default status | Content-Type |
//! |--------|----------------|--------------|
//! | `text` | 200 | `text/plain` |
//! | `json` | 200 | `application/json` |
//! | `html` | 200 | `text/html` |
//! | `null` | 204 | - |
//! | `redirect` | 302 | - (sets `Location`) |

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;

/// HTTP Response type
pub type Response = http::Response<Full<Bytes>>;

pub(crate) const TEXT_PLAIN: &str = "text/plain";
pub(crate) const APPLICATION_JSON: &str = "application/json";
pub(crate) const TEXT_HTML: &str = "text/html";

/// Build a response with an optional `Content-Type`
pub(crate) fn build(status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

/// Merge staged headers into a response.
///
/// A staged header replaces whatever the builder set under the same name;
/// repeated staged values (e.g. `Set-Cookie`) are all kept.
pub(crate) fn merge_headers(response: &mut Response, staged: &HeaderMap) {
    let headers = response.headers_mut();
    for name in staged.keys() {
        headers.remove(name);
    }
    for (name, value) in staged {
        headers.append(name, value.clone());
    }
}

/// The fixed response used when no route matches and no not-found handler is set
pub fn not_found() -> Response {
    build(
        StatusCode::NOT_FOUND,
        Some(TEXT_PLAIN),
        Bytes::from_static(b"Not Found"),
    )
}

/// Plain-text 500 used by the server boundary for errors escaping dispatch
pub(crate) fn internal_error() -> Response {
    build(
        StatusCode::INTERNAL_SERVER_ERROR,
        Some(TEXT_PLAIN),
        Bytes::from_static(b"Internal Server Error"),
    )
}
