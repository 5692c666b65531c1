//! HTTP hosting endpoint
//!
//! Hosts a [`Dispatcher`] outside the serverless platform, using hyper for
//! HTTP/1.1. The endpoint mimics the platform's invoke primitive closely
//! enough for the HTTP client transport and local testing.
//!
//! # Routes
//!
//! - `POST /invoke`: dispatch the body; the response body is the output
//!   payload. The invocation's request id comes from `X-Request-Id` or is
//!   generated, and `X-Deadline-Ms` sets its deadline. A dispatcher fault is
//!   answered with `X-Function-Error` set and a JSON fault body. With
//!   `X-Log-Type: Tail` the response carries a base64 `X-Log-Result`.
//! - `GET /ping`: keep-alive acknowledgement
//!
//! When the server hosts a named function, both routes answer 404 to a
//! request whose `X-Function-Name` names another one. Requests without the
//! header are accepted.
//!
//! # Example
//!
//! ```no_run
//! use lrpc_server::http_server::HttpServer;
//! use lrpc_server::{Dispatcher, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = HttpServer::new(Dispatcher::new(Registry::new()));
//!     server.run("127.0.0.1:8080".parse().unwrap()).await.unwrap();
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

use lrpc_common::transport::http::{
    HttpEnvelope, DEADLINE_HEADER, FUNCTION_NAME_HEADER, FUNCTION_QUALIFIER_HEADER, INVOKE_PATH,
    LOG_RESULT_HEADER, LOG_TYPE_HEADER, PING_PATH, REQUEST_ID_HEADER,
};
use lrpc_common::transport::{HyperRequest, HyperResponse};
use lrpc_common::{InvocationContext, LrpcError, PlatformErrorKind, PlatformFault, Result};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;

/// HTTP server hosting one dispatcher.
pub struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    function_name: Option<Arc<str>>,
}

impl HttpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            function_name: None,
        }
    }

    /// Only answer requests addressed to `name`.
    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(Arc::from(name.into()));
        self
    }

    /// Binds `addr` and serves in a background task.
    ///
    /// Returns the bound address, which differs from `addr` when port 0 was
    /// requested.
    pub async fn bind(self, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LrpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        let local = listener.local_addr()?;
        tracing::info!("HTTP server listening on {}", local);

        tokio::spawn(async move {
            if let Err(e) = self.accept_loop(listener).await {
                tracing::error!("HTTP server stopped: {}", e);
            }
        });
        Ok(local)
    }

    /// Binds `addr` and serves until accepting fails.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LrpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);
        self.accept_loop(listener).await
    }

    async fn accept_loop(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| LrpcError::Transport(format!("Failed to accept connection: {}", e)))?;

            let io = TokioIo::new(stream);
            let dispatcher = self.dispatcher.clone();
            let hosted = self.function_name.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = dispatcher.clone();
                    let hosted = hosted.clone();
                    async move { Self::handle_request(dispatcher, hosted.as_deref(), req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("Error serving connection: {}", err);
                }
            });
        }
    }

    async fn handle_request(
        dispatcher: Arc<Dispatcher>,
        hosted: Option<&str>,
        req: HyperRequest,
    ) -> std::result::Result<HyperResponse, hyper::Error> {
        let requested = header_str(req.headers(), FUNCTION_NAME_HEADER);
        if let (Some(hosted), Some(requested)) = (hosted, requested) {
            if !names_function(requested, hosted) {
                tracing::debug!("Rejecting request for unknown function {}", requested);
                return Ok(HttpEnvelope::status_response(StatusCode::NOT_FOUND));
            }
        }

        match (req.method(), req.uri().path()) {
            (&Method::GET, PING_PATH) => Ok(HttpEnvelope::payload_response(dispatcher.ping())),
            (&Method::POST, INVOKE_PATH) => Self::handle_invoke(dispatcher, req).await,
            _ => Ok(HttpEnvelope::status_response(StatusCode::NOT_FOUND)),
        }
    }

    async fn handle_invoke(
        dispatcher: Arc<Dispatcher>,
        req: HyperRequest,
    ) -> std::result::Result<HyperResponse, hyper::Error> {
        let headers = req.headers();
        let request_id = header_str(headers, REQUEST_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let function_name = header_str(headers, FUNCTION_NAME_HEADER).map(str::to_string);
        let qualifier = header_str(headers, FUNCTION_QUALIFIER_HEADER).map(str::to_string);
        let deadline = header_str(headers, DEADLINE_HEADER).and_then(parse_deadline);
        let log_tail = header_str(headers, LOG_TYPE_HEADER)
            .is_some_and(|v| v.eq_ignore_ascii_case("Tail"));

        let payload = req.into_body().collect().await?.to_bytes();

        let mut ctx = InvocationContext::new(request_id.clone(), payload.to_vec());
        if let Some(name) = function_name {
            ctx = ctx.with_function(name, qualifier);
        }
        if let Some(deadline) = deadline {
            ctx = ctx.with_deadline(deadline);
        }

        let outcome = tokio::task::spawn_blocking(move || dispatcher.invoke(ctx))
            .await
            .unwrap_or_else(|e| {
                Err(PlatformFault::new(
                    format!("dispatcher task failed: {}", e),
                    PlatformErrorKind::Error,
                ))
            });

        let tail = log_tail.then(|| STANDARD.encode(execution_log(&request_id, outcome.as_ref().err())));
        let mut response = match outcome {
            Ok(payload) => HttpEnvelope::payload_response(payload),
            Err(fault) => HttpEnvelope::fault_response(&fault),
        };
        if let Some(value) = tail.and_then(|t| HeaderValue::from_str(&t).ok()) {
            response.headers_mut().insert(LOG_RESULT_HEADER, value);
        }
        Ok(response)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Whether a requested function name (plain or full ARN) names `hosted`.
fn names_function(requested: &str, hosted: &str) -> bool {
    requested == hosted
        || requested
            .strip_suffix(hosted)
            .is_some_and(|prefix| prefix.starts_with("arn:") && prefix.ends_with(":function:"))
}

fn parse_deadline(millis: &str) -> Option<SystemTime> {
    match millis.trim().parse::<u64>() {
        Ok(ms) => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}: {:?}", DEADLINE_HEADER, millis);
            None
        }
    }
}

/// Execution log of one invocation in the platform's START/END framing.
fn execution_log(request_id: &str, fault: Option<&PlatformFault>) -> String {
    let mut log = format!("START RequestId: {}\n", request_id);
    if let Some(fault) = fault {
        log.push_str(&format!("ERROR {}: {}\n", fault.error_type, fault.error_message));
    }
    log.push_str(&format!("END RequestId: {}\n", request_id));
    log
}

/// Serves the process-wide default dispatcher on the address given by
/// [`ServerConfig::from_env`].
pub async fn serve() -> Result<()> {
    let config = ServerConfig::from_env();
    if config.port == 0 {
        tracing::info!("No port configured, starting test server on a random port");
    }
    let mut server = HttpServer::new(crate::default_dispatcher());
    if let Some(name) = &config.function_name {
        server = server.with_function_name(name.clone());
    }
    server.run(config.socket_addr()?).await
}
