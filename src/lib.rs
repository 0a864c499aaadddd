//! `srcplug` - Runtime for declarative content-source plugins
//!
//! A plugin is an XML document describing a site: metadata, typed nodes
//! (entries, views, searches) and a JavaScript block whose functions shape
//! requests and parse responses. The engine resolves URLs against the nodes
//! and drives the fetch ↔ script chain using `TYPE::payload` colon links.
//!
//! # Features
//!
//! - **Node matching**: source-pattern admission filter + first matching view
//! - **CALL loop**: scripts may request extra fetch rounds (`CALL::url`)
//! - **Literal content**: `NULL::text` links bypass the network
//! - **Charset aware**: placeholder encoding and body decoding follow the plugin charset
//! - **Isolated scripting**: one `QuickJS` runtime per plugin on its own thread
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use srcplug::{HttpFetch, IoProvider, PluginEngine, TracingLogger};
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = std::fs::read_to_string("site.xml")?;
//!     let io = IoProvider::new(Arc::new(HttpFetch::new()?), Arc::new(TracingLogger));
//!     let engine = PluginEngine::new(&source, io)?;
//!
//!     let url = "https://example.com/item/42";
//!     if let Some(node) = engine.find_node(url, true) {
//!         let response = engine.get_data(node, Some(url), 1)?;
//!         println!("{}", response.text());
//!     }
//!     engine.release();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod io;
pub mod link;
pub mod plugin;
pub mod script;
pub mod types;

pub use config::EngineConfig;
pub use engine::PluginEngine;
pub use error::{PluginError, Result};
pub use http_client::HttpFetch;
pub use io::{Fetch, IoProvider, Logger, NativeFunction, TracingLogger};
pub use link::{split_colon_link, DataType};
pub use plugin::{Action, Meta, Node, NodeKind};
pub use script::ScriptBridge;
pub use types::{Request, Response};

/// Version of srcplug
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
