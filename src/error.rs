//! Plugin engine errors
//!
//! Every failure the engine can raise falls into one of these kinds. Errors
//! are reported to the host [`Logger`](crate::io::Logger) where they are
//! detected and then returned unchanged to the caller.

use thiserror::Error;

/// Plugin engine errors
#[derive(Error, Debug)]
pub enum PluginError {
    /// Structural problem in the plugin document or a malformed link.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The script block could not be executed when the engine was built.
    #[error("Script initialization failed: {0}")]
    ScriptInit(String),

    /// A named script function threw, was undefined or returned a non-string.
    #[error("Script error: {0}")]
    ScriptInvoke(String),

    /// The script ran but handed back a value that breaks the request contract.
    #[error("Invalid script result: {0}")]
    InvalidResult(String),

    #[error("Fetch failed for '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// The script runtime was released; the engine can no longer run hooks.
    #[error("Script runtime has been released")]
    Released,

    #[error("Config error: {0}")]
    Config(String),
}

impl PluginError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
