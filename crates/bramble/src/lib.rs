//! # Bramble
//!
//! A minimal HTTP routing framework for Rust.
//!
//! Bramble registers method + path routes against async handlers, runs each
//! request through an onion-ordered middleware chain and hands every handler
//! a [`Context`] with params, query, cookies, a cached body and response
//! builders.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bramble::prelude::*;
//!
//! async fn hello(ctx: Context) -> Result<Response> {
//!     Ok(ctx.text("Hello, World!"))
//! }
//!
//! async fn get_user(ctx: Context) -> Result<Response> {
//!     let id = ctx.param("id").unwrap_or_default();
//!     ctx.json(&serde_json::json!({ "id": id }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), BoxError> {
//!     App::new()
//!         .middleware(TracingMiddleware::new())
//!         .get("/", hello)
//!         .get("/users/:id", get_user)
//!         .get("/static/*", serve_static)
//!         .run("127.0.0.1:8080")
//!         .await
//! }
//! ```
//!
//! ## Route patterns
//!
//! - `/users/:id` captures a named segment, read with `ctx.param("id")`
//! - `/files/*/download` matches any single segment without capturing it
//! - `/static/*` matches everything below `/static/`
//!
//! ## Features
//!
//! - `test-utils` - in-process [`TestClient`] for driving an app without a socket

// Re-export core functionality
pub use bramble_core::*;

/// Prelude module - import everything you need with `use bramble::prelude::*`
pub mod prelude {
    pub use bramble_core::{
        into_boxed_middleware,
        // App builder
        App,
        Blob,
        BoxError,
        BoxedMiddleware,
        // Request context
        Context,
        CookieOptions,
        // Error handling
        Error,
        FormData,
        FormValue,
        Method,
        // Middleware
        Middleware,
        Next,
        Response,
        Result,
        SameSite,
        ServerConfig,
        StatusCode,
        TracingMiddleware,
    };

    #[cfg(feature = "test-utils")]
    pub use bramble_core::{TestClient, TestRequest, TestResponse};

    // Re-export commonly used external types
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, trace, warn};
}
