//! Host-supplied collaborators: transport, logging and extra script functions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::error::PluginError;
use crate::link::{split_colon_link, NULL};
use crate::types::{Request, Response};

/// Transport used for every fetch the engine performs.
pub trait Fetch: Send + Sync {
    /// Perform the actual network call.
    fn request(&self, url: &str, request: &Request) -> anyhow::Result<Response>;

    /// Fetch `url`, serving `NULL::payload` links from memory.
    ///
    /// The synthesized response carries the payload's UTF-8 bytes and keeps
    /// the whole link as its location.
    fn call_request(&self, url: &str, request: &Request) -> anyhow::Result<Response> {
        match split_colon_link(url) {
            Some((NULL, payload)) => Ok(Response::new(
                payload.as_bytes().to_vec(),
                request.clone(),
                url,
            )),
            _ => self.request(url, request),
        }
    }
}

/// Plugin-level log sink.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str, plugin_name: &str);
    fn error(&self, plugin_name: &str, error: &PluginError);
}

/// Host function callable from plugin scripts.
///
/// Arguments and return value cross the boundary as JSON values; `None`
/// becomes `undefined`. An error is thrown into the script.
pub type NativeFunction =
    Arc<dyn Fn(&[serde_json::Value]) -> anyhow::Result<Option<serde_json::Value>> + Send + Sync>;

/// Everything the engine needs from its host.
#[derive(Clone)]
pub struct IoProvider {
    pub fetch: Arc<dyn Fetch>,
    pub logger: Arc<dyn Logger>,
    /// Registered after the built-ins; a name clash replaces the built-in.
    pub custom_functions: HashMap<String, NativeFunction>,
}

impl IoProvider {
    pub fn new(fetch: Arc<dyn Fetch>, logger: Arc<dyn Logger>) -> Self {
        Self {
            fetch,
            logger,
            custom_functions: HashMap::new(),
        }
    }

    /// Add a script-callable host function.
    #[must_use]
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> anyhow::Result<Option<serde_json::Value>>
            + Send
            + Sync
            + 'static,
    {
        self.custom_functions.insert(name.into(), Arc::new(function));
        self
    }
}

impl fmt::Debug for IoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.custom_functions.keys().collect();
        names.sort();
        f.debug_struct("IoProvider")
            .field("custom_functions", &names)
            .finish_non_exhaustive()
    }
}

/// [`Logger`] that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str, plugin_name: &str) {
        info!(plugin = plugin_name, "{message}");
    }

    fn error(&self, plugin_name: &str, error: &PluginError) {
        error!(plugin = plugin_name, error = %error, "plugin error");
    }
}
