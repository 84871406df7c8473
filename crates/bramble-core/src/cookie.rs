//! Cookie parsing and `Set-Cookie` serialization

use ::cookie::Cookie;
use std::collections::HashMap;
use std::time::SystemTime;

pub use ::cookie::SameSite;

/// Attributes for a cookie staged with [`Context::set_cookie`](crate::Context::set_cookie)
///
/// Attributes are written in a fixed order: `Max-Age` (or `Expires` when no
/// max age is given), `Domain`, `Path`, `Secure`, `HttpOnly`, `SameSite`.
///
/// # Example
///
/// ```rust,ignore
/// let options = CookieOptions::new()
///     .max_age(3600)
///     .path("/")
///     .http_only(true)
///     .same_site(SameSite::Lax);
/// ctx.set_cookie("session", "abc123", &options)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub expires: Option<SystemTime>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime in seconds; takes precedence over [`expires`](Self::expires)
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Build a `Set-Cookie` header value
pub fn serialize_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", name, value);

    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    } else if let Some(expires) = options.expires {
        cookie.push_str("; Expires=");
        cookie.push_str(&httpdate::fmt_http_date(expires));
    }
    if let Some(domain) = &options.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if let Some(path) = &options.path {
        cookie.push_str("; Path=");
        cookie.push_str(path);
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if let Some(same_site) = options.same_site {
        cookie.push_str(&format!("; SameSite={}", same_site));
    }

    cookie
}

/// Parse a `Cookie` request header.
///
/// Names and values are trimmed. Pairs without `=` or with an empty name are
/// dropped, empty values are kept and the first occurrence of a repeated name
/// wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for cookie in Cookie::split_parse(header).filter_map(|cookie| cookie.ok()) {
        cookies
            .entry(cookie.name().to_string())
            .or_insert_with(|| cookie.value().to_string());
    }

    cookies
}
