use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use lrpc_common::transport::http::UNHANDLED;
use lrpc_common::transport::{InvokeOutput, InvokeRequest, Transport};
use lrpc_common::{InvocationContext, LrpcError, PlatformErrorKind, PlatformFault, Result};

use crate::dispatcher::Dispatcher;

/// In-process [`Transport`] that hands payloads straight to dispatchers.
///
/// Each function name maps to one dispatcher. Invocations run on tokio's
/// blocking pool, the same way the HTTP endpoint runs them.
#[derive(Clone, Default)]
pub struct LocalTransport {
    functions: BTreeMap<String, Arc<Dispatcher>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport with a single function.
    pub fn single(function_name: impl Into<String>, dispatcher: Dispatcher) -> Self {
        Self::new().with_function(function_name, dispatcher)
    }

    pub fn with_function(mut self, function_name: impl Into<String>, dispatcher: Dispatcher) -> Self {
        self.functions
            .insert(function_name.into(), Arc::new(dispatcher));
        self
    }

    fn function(&self, name: &str) -> Result<Arc<Dispatcher>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| LrpcError::Transport(format!("function not found: {}", name)))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn describe(&self, function_name: &str, _qualifier: Option<&str>) -> Result<()> {
        self.function(function_name).map(|_| ())
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeOutput> {
        let dispatcher = self.function(&request.function_name)?;
        let ctx = InvocationContext::new(uuid::Uuid::new_v4().to_string(), request.payload)
            .with_function(request.function_name, request.qualifier);

        let outcome = tokio::task::spawn_blocking(move || dispatcher.invoke(ctx))
            .await
            .unwrap_or_else(|e| {
                Err(PlatformFault::new(
                    format!("dispatcher task failed: {}", e),
                    PlatformErrorKind::Error,
                ))
            });

        Ok(match outcome {
            Ok(payload) => InvokeOutput::payload(payload),
            Err(fault) => InvokeOutput {
                payload: fault.to_json(),
                function_error: Some(UNHANDLED.to_string()),
                log_result: None,
            },
        })
    }
}
