//! HTTP server hosting guarded routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::response::{self, HttpResponse};
use crate::router::{Context, RouteMatch, RouterHandle};

/// Maximum request body size in bytes (1 MB).
const MAX_BODY_SIZE: usize = 1_048_576;

/// Maximum number of concurrent connections.
const MAX_CONNECTIONS: usize = 128;

/// Timeout for reading request headers (slowloris protection).
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

struct State {
    config: Arc<Config>,
    router: Arc<RouterHandle>,
}

/// Handle to a running server instance.
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<crate::Result<()>>,
}

impl Server {
    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shut down the accept loop and wait for it to finish.
    pub async fn shutdown(self) -> crate::Result<()> {
        let _ = self.shutdown_tx.send(());
        joined(self.task.await)
    }
}

/// Flatten the accept task's outcome; a panicked task is an error.
fn joined(result: std::result::Result<crate::Result<()>, tokio::task::JoinError>) -> crate::Result<()> {
    result.map_err(|e| crate::Error::Internal(format!("Accept loop failed: {e}")))?
}

fn add_standard_headers(response: &mut HttpResponse) {
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<State>,
) -> Result<HttpResponse, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let declared = parts
        .headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|cl| cl.to_str().ok())
        .and_then(|cl| cl.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_SIZE) {
        let mut response = response::error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
        add_standard_headers(&mut response);
        return Ok(response);
    }

    let body = match BodyExt::collect(Limited::new(body, MAX_BODY_SIZE)).await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            let mut response = response::error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
            add_standard_headers(&mut response);
            return Ok(response);
        }
    };

    let path = parts.uri.path().to_string();
    let mut response = match state.router.match_route(&parts.method, &path) {
        RouteMatch::Matched { handler, params } => {
            let ctx = Context {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                params,
                body,
                config: Arc::clone(&state.config),
            };

            match handler(ctx).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            }
        }
        RouteMatch::MethodNotAllowed => {
            response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        RouteMatch::NotFound => response::error(StatusCode::NOT_FOUND, "Not found"),
    };

    add_standard_headers(&mut response);
    Ok(response)
}

/// Bind, start accepting connections, and return a handle.
pub async fn start(config: Config, router: Arc<RouterHandle>) -> crate::Result<Server> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let state = Arc::new(State {
        config: Arc::new(config),
        router,
    });

    info!("Server listening on http://{}", addr);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // Transient (e.g. EMFILE); keep accepting
                            error!("Failed to accept connection: {e}");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);

                    let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                        warn!("Connection limit reached, rejecting {}", remote_addr);
                        drop(io);
                        continue;
                    };

                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

                        let mut builder = auto::Builder::new(TokioExecutor::new());
                        builder
                            .http1()
                            .timer(TokioTimer::new())
                            .header_read_timeout(HEADER_READ_TIMEOUT);

                        if let Err(e) = builder.serve_connection(io, service).await {
                            error!("Error serving connection from {}: {}", remote_addr, e);
                        }

                        drop(permit);
                    });
                }
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        Ok::<(), crate::Error>(())
    });

    Ok(Server {
        addr,
        shutdown_tx,
        task,
    })
}

/// Run the HTTP server until the accept loop exits.
pub async fn run(config: Config, router: Arc<RouterHandle>) -> crate::Result<()> {
    let server = start(config, router).await?;
    joined(server.task.await)
}
