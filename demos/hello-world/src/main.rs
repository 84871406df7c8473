//! Hello World demo for Bramble
//!
//! Run with: cargo run -p hello-world
//!
//! Then try:
//!   curl http://127.0.0.1:8080/
//!   curl http://127.0.0.1:8080/users/42?fields=name&fields=email
//!   curl -X POST -H "Authorization: Bearer token123" -d '{"name":"Ada"}' http://127.0.0.1:8080/api/users
//!   curl -H "Authorization: Bearer token123" http://127.0.0.1:8080/api/me
//!   curl -i http://127.0.0.1:8080/login

use bramble::prelude::*;
use std::time::Instant;

#[derive(Serialize)]
struct UserResponse {
    id: String,
    name: String,
    fields: Vec<String>,
}

#[derive(Deserialize, Serialize)]
struct CreateUser {
    name: String,
}

#[derive(Clone)]
struct CurrentUser {
    token: String,
}

async fn hello(ctx: Context) -> Result<Response> {
    Ok(ctx.text("Hello, World!"))
}

async fn get_user(ctx: Context) -> Result<Response> {
    let id = ctx.param("id").unwrap_or_default().to_string();
    ctx.json(&UserResponse {
        name: format!("User {}", id),
        fields: ctx.queries("fields").map(<[String]>::to_vec).unwrap_or_default(),
        id,
    })
}

async fn create_user(ctx: Context) -> Result<Response> {
    let user: CreateUser = ctx.body_json().await?;
    info!(name = %user.name, "Creating user");
    ctx.json_with_status(&user, StatusCode::CREATED)
}

async fn me(ctx: Context) -> Result<Response> {
    let user = ctx.get_context::<CurrentUser>("user")?;
    ctx.json(&serde_json::json!({ "token": user.map(|u| u.token) }))
}

async fn download(ctx: Context) -> Result<Response> {
    Ok(ctx.text(format!("downloading {}", ctx.pathname())))
}

async fn login(ctx: Context) -> Result<Response> {
    let options = CookieOptions::new()
        .path("/")
        .max_age(3600)
        .http_only(true)
        .same_site(SameSite::Lax);
    ctx.set_cookie("session", "abc123", &options)?;
    ctx.redirect("/")
}

/// Adds `X-Response-Time` to every response
async fn timing(ctx: Context, next: Next) -> Result<Response> {
    let started = Instant::now();
    let mut response = next.run(ctx).await?;
    let elapsed = format!("{}us", started.elapsed().as_micros());
    if let Ok(value) = elapsed.parse() {
        response.headers_mut().insert("x-response-time", value);
    }
    Ok(response)
}

/// Rejects `/api/*` requests without a bearer token
async fn auth(ctx: Context, next: Next) -> Result<Response> {
    let token = ctx
        .header("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    match token {
        Some(token) => {
            ctx.set_context("user", CurrentUser { token });
            next.run(ctx).await
        }
        None => Ok(ctx.text_with_status("Unauthorized", StatusCode::UNAUTHORIZED)),
    }
}

async fn not_found(ctx: Context) -> Result<Response> {
    ctx.json_with_status(
        &serde_json::json!({ "error": "not found", "path": ctx.pathname() }),
        StatusCode::NOT_FOUND,
    )
}

#[tokio::main]
async fn main() -> std::result::Result<(), BoxError> {
    let app = App::from_env()?
        .middleware(TracingMiddleware::new())
        .middleware(timing)
        .middleware_at("/api/*", auth)
        .get("/", hello)
        .get("/users/:id", get_user)
        .get("/files/*/download", download)
        .get("/login", login)
        .post("/api/users", create_user)
        .get("/api/me", me)
        .not_found(not_found);

    info!(addr = %app.server_config().addr(), "Starting hello-world");
    app.serve().await
}
