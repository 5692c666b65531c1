use std::net::SocketAddr;

use lrpc_common::{LrpcError, Result};

/// Environment variable holding the port of the hosting endpoint.
pub const PORT_ENV: &str = "_LAMBDA_SERVER_PORT";
/// Environment variable naming the hosted function.
pub const FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Populate the correlation map so methods can call `context_for`.
    pub track_invocations: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            track_invocations: true,
        }
    }
}

/// Configuration for the local hosting endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_host: String,
    /// Port 0 picks a random free port.
    pub port: u16,
    /// Requests naming any other function are refused.
    pub function_name: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
            function_name: None,
        }
    }
}

impl ServerConfig {
    /// Reads the port from `_LAMBDA_SERVER_PORT` and the hosted function
    /// from `AWS_LAMBDA_FUNCTION_NAME`.
    ///
    /// An absent or unparsable port leaves it at 0.
    pub fn from_env() -> Self {
        let mut config = Self::from_port_var(std::env::var(PORT_ENV).ok().as_deref());
        config.function_name = std::env::var(FUNCTION_NAME_ENV)
            .ok()
            .filter(|name| !name.trim().is_empty());
        config
    }

    fn from_port_var(value: Option<&str>) -> Self {
        let port = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid {}: {:?}", PORT_ENV, v);
                0
            }),
            _ => 0,
        };
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_host, self.port)
            .parse()
            .map_err(|e| LrpcError::Transport(format!("invalid bind address {}:{}: {}", self.bind_host, self.port, e)))
    }
}
