//! Dispatch benchmarks
//!
//! Measures route lookup and middleware chain overhead through a built
//! dispatcher, without a socket.

use bramble::prelude::*;
use bramble::Dispatcher;
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http_body_util::Full;

fn request(method: Method, uri: &str, body: &'static str) -> http::Request<Full<Bytes>> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

async fn ok(ctx: Context) -> Result<Response> {
    Ok(ctx.text("ok"))
}

async fn echo(ctx: Context) -> Result<Response> {
    let value: serde_json::Value = ctx.body_json().await?;
    ctx.json(&value)
}

fn app_with_layers(layers: usize) -> Dispatcher {
    let mut app = App::new();
    for _ in 0..layers {
        app = app.middleware(|ctx: Context, next: Next| next.run(ctx));
    }
    app.get("/users/:id", ok).build()
}

/// Benchmark chain depth
fn bench_middleware_depth(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("middleware_depth");

    for layers in [0usize, 1, 3, 5, 10, 20] {
        let dispatcher = app_with_layers(layers);
        group.bench_with_input(BenchmarkId::new("layers", layers), &layers, |b, _| {
            b.to_async(&runtime).iter(|| async {
                dispatcher
                    .handle(request(Method::GET, black_box("/users/42"), ""))
                    .await
                    .unwrap()
            })
        });
    }

    group.finish();
}

/// Benchmark route lookup across pattern shapes
fn bench_routing(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("routing");

    let dispatcher = App::new()
        .get("/", ok)
        .get("/users/:id", ok)
        .get("/users/:id/posts/:post", ok)
        .get("/files/*/download", ok)
        .get("/static/*", ok)
        .build();

    for path in [
        "/",
        "/users/42",
        "/users/42/posts/7",
        "/files/abc/download",
        "/static/css/site.css",
        "/missing",
    ] {
        group.bench_with_input(BenchmarkId::new("path", path), &path, |b, &path| {
            b.to_async(&runtime).iter(|| async {
                dispatcher
                    .handle(request(Method::GET, black_box(path), ""))
                    .await
                    .unwrap()
            })
        });
    }

    group.finish();
}

/// Benchmark body decoding through the context cache
fn bench_json_body(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dispatcher = App::new().post("/echo", echo).build();

    c.bench_function("json_echo", |b| {
        b.to_async(&runtime).iter(|| async {
            dispatcher
                .handle(request(
                    Method::POST,
                    "/echo",
                    r#"{"name":"Ada","tags":["a","b","c"],"age":36}"#,
                ))
                .await
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_middleware_depth, bench_routing, bench_json_body);
criterion_main!(benches);
