//! HTTP server implementation

use crate::dispatcher::Dispatcher;
use crate::error::BoxError;
use crate::response::{self, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Serves a [`Dispatcher`] over HTTP/1.1
pub(crate) struct Server {
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Bind `addr` and serve until `shutdown` resolves
    pub async fn run_with_shutdown<F>(self, addr: &str, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running to completion.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        info!("Bramble server listening on http://{}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => self.spawn_connection(stream, remote_addr),
                    Err(err) => {
                        let backoff = accept_backoff(&err);
                        warn!(backoff_ms = backoff.as_millis() as u64, "Accept failed: {}", err);
                        tokio::time::sleep(backoff).await;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, remote_addr: SocketAddr) {
        let io = TokioIo::new(stream);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: hyper::Request<Incoming>| {
                let dispatcher = dispatcher.clone();
                async move { Ok::<_, Infallible>(handle_request(&dispatcher, req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!(remote_addr = %remote_addr, "Connection error: {}", err);
            }
        });
    }
}

/// Pause before the next `accept` after a failed one.
///
/// Errors tied to a single peer are skipped at once. Anything else, such as
/// running out of file descriptors, waits so the loop does not spin.
fn accept_backoff(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}

/// Dispatch one request; errors escaping the chain become a plain 500
async fn handle_request(dispatcher: &Dispatcher, req: hyper::Request<Incoming>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    match dispatcher.handle(req).await {
        Ok(response) => {
            debug!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
            response
        }
        Err(err) => {
            error!(
                method = %method,
                path = %path,
                suggested_status = err.status().as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                error = %err,
                "Unhandled error while dispatching request"
            );
            response::internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::{Error, Result};
    use crate::App;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn hello(ctx: Context) -> Result<Response> {
        Ok(ctx.text("hello"))
    }

    async fn boom(_ctx: Context) -> Result<Response> {
        Err(Error::handler("database offline"))
    }

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn serves_requests_and_maps_errors_to_500() {
        let dispatcher = App::new().get("/hello", hello).get("/boom", boom).build();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(Server::new(dispatcher).serve(listener, async move {
            let _ = stopped.await;
        }));

        let ok = raw_get(addr, "/hello").await;
        assert!(ok.starts_with("HTTP/1.1 200 OK"), "{}", ok);
        assert!(ok.ends_with("hello"));

        let failed = raw_get(addr, "/boom").await;
        assert!(failed.starts_with("HTTP/1.1 500"), "{}", failed);
        assert!(failed.ends_with("Internal Server Error"));

        let missing = raw_get(addr, "/missing").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{}", missing);
        assert!(missing.ends_with("Not Found"));

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn accept_errors_back_off_instead_of_stopping() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        let exhausted = io::Error::from_raw_os_error(24); // EMFILE

        assert_eq!(accept_backoff(&reset), Duration::ZERO);
        assert_eq!(accept_backoff(&aborted), Duration::ZERO);
        assert_eq!(accept_backoff(&exhausted), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let dispatcher = App::new().build();
        let result = Server::new(dispatcher)
            .run_with_shutdown("not-an-address", std::future::ready(()))
            .await;
        assert!(result.is_err());
    }
}
