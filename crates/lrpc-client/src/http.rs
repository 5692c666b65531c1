//! HTTP transport
//!
//! Talks to an lrpc hosting endpoint (see `lrpc_server::HttpServer`) over
//! HTTP/1.1 using hyper's pooled client.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;

use lrpc_common::protocol::error::{LrpcError, Result};
use lrpc_common::transport::http::{
    FUNCTION_ERROR_HEADER, FUNCTION_NAME_HEADER, FUNCTION_QUALIFIER_HEADER, INVOKE_PATH,
    LOG_RESULT_HEADER, LOG_TYPE_HEADER, PING_PATH,
};
use lrpc_common::transport::{InvokeOutput, InvokeRequest, Transport};

/// [`Transport`] over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: HyperClient<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    /// Transport for the endpoint at `base_url` (`http://host:port`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = HyperClient::builder(TokioExecutor::new()).build_http();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<(hyper::http::response::Parts, Bytes)> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| LrpcError::Transport(format!("HTTP request failed: {}", e)))?;

        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();

        if !parts.status.is_success() {
            return Err(LrpcError::Transport(format!(
                "HTTP {}: {}",
                parts.status,
                String::from_utf8_lossy(&body)
            )));
        }
        Ok((parts, body))
    }
}

fn build_error(e: hyper::http::Error) -> LrpcError {
    LrpcError::Transport(format!("invalid HTTP request: {}", e))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn describe(&self, function_name: &str, qualifier: Option<&str>) -> Result<()> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(format!("{}{}", self.base_url, PING_PATH))
            .header(FUNCTION_NAME_HEADER, function_name);
        if let Some(q) = qualifier {
            builder = builder.header(FUNCTION_QUALIFIER_HEADER, q);
        }
        let request = builder.body(Full::new(Bytes::new())).map_err(build_error)?;

        self.send(request).await.map(|_| ()).map_err(|e| {
            LrpcError::Transport(format!("function {} not reachable: {}", function_name, e))
        })
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutput> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("{}{}", self.base_url, INVOKE_PATH))
            .header(FUNCTION_NAME_HEADER, request.function_name.as_str());
        if let Some(q) = &request.qualifier {
            builder = builder.header(FUNCTION_QUALIFIER_HEADER, q.as_str());
        }
        if request.log_tail {
            builder = builder.header(LOG_TYPE_HEADER, "Tail");
        }
        let http_request = builder
            .body(Full::new(Bytes::from(request.payload)))
            .map_err(build_error)?;

        let (parts, body) = self.send(http_request).await?;
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(InvokeOutput {
            payload: body.to_vec(),
            function_error: header(FUNCTION_ERROR_HEADER),
            log_result: header(LOG_RESULT_HEADER),
        })
    }
}
