//! Error types for Bramble
//!
//! The dispatch core never turns an [`Error`] into a response by itself:
//! errors raised by body decoders, middleware or handlers travel back to the
//! caller of [`Dispatcher::handle`](crate::Dispatcher::handle). The server
//! adapter is the boundary that logs them and answers with a 500.

use http::{Method, StatusCode};
use std::sync::Arc;
use thiserror::Error;

/// Boxed error type used to carry user errors through the chain
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for Bramble operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error raised while handling a single request
#[derive(Debug, Error)]
pub enum Error {
    /// The cached body is not valid JSON for the requested type
    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// The cached body is not valid UTF-8
    #[error("Body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The cached body is not a valid urlencoded form
    #[error("Invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    /// The cached body is not a valid multipart form
    #[error("Invalid multipart body: {0}")]
    Multipart(String),

    /// `body_form` was called on a body that is neither urlencoded nor multipart
    #[error("Unsupported form content type `{0}`")]
    FormContentType(String),

    /// Reading the request body stream failed.
    ///
    /// Shared so a repeated read reports the same failure.
    #[error("Failed to read request body: {0}")]
    Body(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The request body is larger than the configured limit
    #[error("Request body exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// A staged response header has an invalid name or value
    #[error("Invalid response header `{name}`")]
    InvalidHeader {
        /// Header name as given by the caller
        name: String,
    },

    /// The context store holds a value of another type under this key
    #[error("Context value `{key}` is not a `{expected}`")]
    ContextType {
        /// Store key
        key: String,
        /// Requested type name
        expected: &'static str,
    },

    /// Building an HTTP message failed
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Error raised by user middleware or a handler
    #[error(transparent)]
    Handler(BoxError),
}

impl Error {
    /// Wrap an arbitrary error raised by user code
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Create a multipart parse error
    pub fn multipart(message: impl Into<String>) -> Self {
        Self::Multipart(message.into())
    }

    /// Status an outer error boundary should answer with
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json(_) | Self::Utf8(_) | Self::Form(_) | Self::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::FormContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error came from decoding the request body
    pub fn is_body_decode(&self) -> bool {
        matches!(
            self,
            Self::Json(_) | Self::Utf8(_) | Self::Form(_) | Self::Multipart(_)
        )
    }
}

/// Error returned when the route matcher rejects a pattern at registration
#[derive(Debug, Clone, Error)]
#[error("cannot register {method} {pattern}: {details}")]
pub struct RouteError {
    /// HTTP method of the rejected route
    pub method: Method,
    /// The pattern as written by the user (with `*` intact)
    pub pattern: String,
    /// The pattern handed to the matcher
    pub converted: String,
    /// Detailed error message from the underlying matcher
    pub details: String,
}

impl RouteError {
    /// Multi-line report used when aborting startup
    pub fn report(&self) -> String {
        format!(
            "\n  Route registration failed\n\n    → Method:  {}\n    → Pattern: {}\n    → Matcher: {}\n\n  Details: {}\n\n  \
             Patterns sharing a prefix must use the same parameter names, and a\n  \
             trailing `*` cannot coexist with another route on the same prefix.\n",
            self.method, self.pattern, self.converted, self.details
        )
    }
}
