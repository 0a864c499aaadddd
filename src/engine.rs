//! Resolution engine: matches URLs to nodes and drives the fetch/script chain.
//!
//! ```text
//! get_data(node, input, page)
//!   url = node.url | input | "NULL::"   (%input / %page substituted)
//!   ├─ no request hook ─▶ fetch(url) ───────────────────────────┐
//!   └─ request hook ─▶ hook(empty @ url)                         │
//!        while result is "CALL::x": hook(fetch(x))               │
//!        redirect node ? keep result : fetch(result) ────────────┤
//!                                                                ▼
//!                                       parse hook ? parse(result) : result
//! ```

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::error::{PluginError, Result};
use crate::io::IoProvider;
use crate::link::{format_url, split_colon_link, CALL, NULL_LINK};
use crate::plugin::nodes::{CATCH_ENCODING, CATCH_USER_AGENT};
use crate::plugin::{Meta, Node, Nodes, PluginDocument};
use crate::script::ScriptBridge;
use crate::types::{Request, Response};

/// A loaded plugin, ready to resolve URLs.
pub struct PluginEngine {
    meta: Meta,
    nodes: Nodes,
    io: IoProvider,
    /// Outgoing request after `catch` directives were applied.
    initial_request: Request,
    script: ScriptBridge,
    guid: OnceCell<String>,
}

impl PluginEngine {
    /// Load a plugin with the default [`EngineConfig`].
    pub fn new(source: &str, io: IoProvider) -> Result<Self> {
        Self::with_config(source, io, &EngineConfig::default())
    }

    /// Parse `source`, apply its catch directives and start its script runtime.
    pub fn with_config(source: &str, io: IoProvider, config: &EngineConfig) -> Result<Self> {
        let document = PluginDocument::parse(source)
            .inspect_err(|e| io.logger.error("<unknown plugin>", e))?;
        let PluginDocument {
            meta,
            nodes,
            script,
        } = document;

        let initial_request =
            initial_request(&nodes.catch).inspect_err(|e| io.logger.error(&meta.title, e))?;

        let script = ScriptBridge::new(
            &script,
            &meta.title,
            &io,
            initial_request.clone(),
            &config.script,
        )?;

        debug!(
            plugin = %meta.title,
            entries = nodes.entries.len(),
            views = nodes.views.len(),
            searches = nodes.searches.len(),
            "Plugin loaded"
        );

        Ok(Self {
            meta,
            nodes,
            io,
            initial_request,
            script,
            guid: OnceCell::new(),
        })
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn io(&self) -> &IoProvider {
        &self.io
    }

    pub fn entries(&self) -> &[Node] {
        &self.nodes.entries
    }

    pub fn views(&self) -> &[Node] {
        &self.nodes.views
    }

    /// The first search node, if any.
    pub fn search(&self) -> Option<&Node> {
        self.nodes.searches.first()
    }

    pub fn redirect_node(&self) -> Option<&Node> {
        self.nodes.redirect.as_ref()
    }

    pub fn catch_processors(&self) -> &HashMap<String, String> {
        &self.nodes.catch
    }

    /// Request every pipeline starts from.
    pub fn initial_request(&self) -> &Request {
        &self.initial_request
    }

    /// Stable fingerprint: upper-case hex MD5 of `author ++ title`.
    pub fn guid(&self) -> &str {
        self.guid.get_or_init(|| {
            let seed = format!("{}{}", self.meta.author, self.meta.title);
            format!("{:X}", md5::compute(seed.as_bytes()))
        })
    }

    /// First view node matching `url`, or the redirect node when allowed.
    ///
    /// Returns `None` whenever the plugin's source pattern rejects `url`.
    pub fn find_node(&self, url: &str, allow_redirect: bool) -> Option<&Node> {
        if !self.meta.is_match(url) {
            return None;
        }
        self.nodes.find_view(url).or_else(|| {
            if allow_redirect {
                self.nodes.redirect.as_ref()
            } else {
                None
            }
        })
    }

    /// Resolve `node` into content.
    #[instrument(skip(self, node), fields(plugin = %self.meta.title, node = %node.data_type))]
    pub fn get_data(&self, node: &Node, input: Option<&str>, page: u32) -> Result<Response> {
        let template = node
            .url
            .as_deref()
            .or(input)
            .unwrap_or(NULL_LINK);
        let url = format_url(template, self.initial_request.encoding, input, page);
        debug!(url = %url, "Working URL");

        let result = match &node.request {
            None => self.fetch(&url, &self.initial_request)?,
            Some(hook) => {
                let primed = Response::new(Vec::new(), self.initial_request.clone(), url);
                let mut result = self.script.invoke(hook, primed)?;

                loop {
                    let text = result.text();
                    let Some((CALL, target)) = split_colon_link(&text) else {
                        break;
                    };
                    debug!(target = %target, "CALL round");
                    let fetched = self.fetch(target, &result.request)?;
                    result = self.script.invoke(hook, fetched)?;
                }

                if node.is_redirect() {
                    result
                } else {
                    self.fetch(&result.text(), &result.request)?
                }
            }
        };

        match &node.parse {
            Some(hook) => self.script.invoke(hook, result),
            None => Ok(result),
        }
    }

    /// Run script function `TYPE` on `payload` for a `TYPE::payload` link.
    pub fn process_data(&self, colon_url: &str) -> Result<Vec<u8>> {
        Ok(self.process_response(colon_url)?.into_body())
    }

    /// Like [`process_data`](Self::process_data), keeping the request the
    /// hook returned so the body can be decoded in its charset.
    pub fn process_response(&self, colon_url: &str) -> Result<Response> {
        let Some((hook, payload)) = split_colon_link(colon_url) else {
            let err = PluginError::parse(format!("not a colon link: '{colon_url}'"));
            self.io.logger.error(&self.meta.title, &err);
            return Err(err);
        };
        let node = Node::redirect(hook);
        self.get_data(&node, Some(payload), 1)
    }

    /// Shut down the script runtime. Later script calls fail with
    /// [`PluginError::Released`].
    pub fn release(&self) {
        self.script.release();
    }

    pub fn is_released(&self) -> bool {
        self.script.is_released()
    }

    fn fetch(&self, url: &str, request: &Request) -> Result<Response> {
        self.io.fetch.call_request(url, request).map_err(|source| {
            let err = PluginError::Fetch {
                url: url.to_string(),
                source,
            };
            self.io.logger.error(&self.meta.title, &err);
            err
        })
    }
}

/// Apply `ua` and `encoding` catch directives to a fresh request.
fn initial_request(catch: &HashMap<String, String>) -> Result<Request> {
    let mut request = Request::new();
    if let Some(agent) = catch.get(CATCH_USER_AGENT) {
        request
            .headers
            .insert("User-Agent".to_string(), agent.clone());
    }
    if let Some(label) = catch.get(CATCH_ENCODING) {
        if !request.set_encoding_label(label) {
            return Err(PluginError::parse(format!(
                "catch 'encoding' names an unknown or decode-only charset: '{label}'"
            )));
        }
    }
    Ok(request)
}
