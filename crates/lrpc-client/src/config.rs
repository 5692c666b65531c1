use std::fmt;
use std::str::FromStr;

use lrpc_common::{LrpcError, Result};

/// Remote function a client talks to, with an optional version or alias.
///
/// # Example
///
/// ```
/// use lrpc_client::FunctionTarget;
///
/// let target = FunctionTarget::parse("arith:live").unwrap();
/// assert_eq!(target.name, "arith");
/// assert_eq!(target.qualifier.as_deref(), Some("live"));
///
/// let arn = FunctionTarget::parse("arn:aws:lambda:us-east-1:123456789012:function:arith").unwrap();
/// assert!(arn.qualifier.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionTarget {
    pub name: String,
    pub qualifier: Option<String>,
}

impl FunctionTarget {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionTarget {
            name: name.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Parses `name[:qualifier]`.
    ///
    /// Plain names split on the last `:`. ARNs contain colons of their own,
    /// so only an eighth segment is taken as the qualifier.
    pub fn parse(target: &str) -> Result<Self> {
        let target = target.trim();
        let (name, qualifier) = if target.starts_with("arn:") {
            let segments: Vec<&str> = target.splitn(8, ':').collect();
            match segments.as_slice() {
                [head @ .., qualifier] if segments.len() == 8 => (head.join(":"), Some(*qualifier)),
                _ => (target.to_string(), None),
            }
        } else {
            match target.rsplit_once(':') {
                Some((name, qualifier)) => (name.to_string(), Some(qualifier)),
                None => (target.to_string(), None),
            }
        };

        if name.is_empty() {
            return Err(LrpcError::Transport(format!(
                "invalid function name: {:?}",
                target
            )));
        }

        Ok(FunctionTarget {
            name,
            qualifier: qualifier.filter(|q| !q.is_empty()).map(str::to_string),
        })
    }
}

impl FromStr for FunctionTarget {
    type Err = LrpcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FunctionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}:{}", self.name, q),
            None => f.write_str(&self.name),
        }
    }
}

/// Client configuration.
///
/// # Default Configuration
///
/// - `queue_capacity`: 1000
/// - `capture_logs`: true
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Completed calls the streaming codec holds before further submissions
    /// wait for a reader.
    pub queue_capacity: usize,
    /// Ask the platform for the execution log tail of each streaming call.
    pub capture_logs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            capture_logs: true,
        }
    }
}

impl ClientConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_capture_logs(mut self, capture: bool) -> Self {
        self.capture_logs = capture;
        self
    }
}
