//! QuickJS instance owned by a bridge worker thread.
//!
//! Uses `QuickJS` via rquickjs bindings (ES2020, ~1MB). Never leaves the
//! thread it was created on; see [`ScriptBridge`](super::ScriptBridge).

use std::collections::BTreeMap;

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Object, Runtime, Value};
use tracing::debug;

use super::callbacks::{self, CallbackEnv, CallbackRegistry};
use crate::config::ScriptConfig;
use crate::error::{PluginError, Result};
use crate::types::{Request, Response};

static STACK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\d+)(?::\d+)?\)?$").expect("static regex"));

/// JavaScript engine for one plugin
pub(crate) struct JsEngine {
    context: Context,
    // Dropped after `context`.
    _runtime: Runtime,
    /// Script block text, for source lines in error messages.
    script: String,
}

impl JsEngine {
    /// Create a runtime with the configured limits.
    pub(crate) fn new(config: &ScriptConfig) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| PluginError::ScriptInit(format!("cannot create JS runtime: {e}")))?;
        runtime.set_memory_limit(config.memory_limit);
        runtime.set_max_stack_size(config.max_stack_size);

        let context = Context::full(&runtime)
            .map_err(|e| PluginError::ScriptInit(format!("cannot create JS context: {e}")))?;

        Ok(Self {
            context,
            _runtime: runtime,
            script: String::new(),
        })
    }

    /// Register native callbacks as globals.
    pub(crate) fn install(&self, registry: CallbackRegistry, env: CallbackEnv) -> Result<()> {
        self.context.with(|ctx| {
            callbacks::install(&ctx, registry, env).map_err(|e| {
                PluginError::ScriptInit(format!("cannot register native callbacks: {e}"))
            })
        })
    }

    /// Run the plugin's script block.
    pub(crate) fn execute(&mut self, script: &str) -> Result<()> {
        debug!("Evaluating script block: {} chars", script.len());
        self.script = script.to_string();

        self.context.with(|ctx| {
            ctx.eval::<(), _>(script)
                .catch(&ctx)
                .map_err(|caught| {
                    PluginError::ScriptInit(format!(
                        "script block failed, cannot initialize: {}",
                        describe_caught(&caught, Some(script))
                    ))
                })
        })
    }

    /// Call global `function(bodyText, location, request)`.
    ///
    /// The returned string becomes the new body, re-encoded in the request's
    /// (possibly changed) charset; the request object is read back afterwards.
    pub(crate) fn invoke(&self, function: &str, response: &Response) -> Result<Response> {
        debug!(hook = function, location = %response.location, "Invoking script hook");

        self.context.with(|ctx| {
            let target: Value = ctx
                .globals()
                .get(function)
                .map_err(|e| PluginError::ScriptInvoke(format!("cannot read '{function}': {e}")))?;
            let Some(target) = target.as_function() else {
                return Err(PluginError::ScriptInvoke(format!(
                    "'{function}' is not a function (found {:?})",
                    target.type_of()
                )));
            };

            let request = to_js_request(&ctx, &response.request).map_err(|e| {
                PluginError::ScriptInvoke(format!("cannot pass request to '{function}': {e}"))
            })?;

            let returned: Value = target
                .call((response.text(), response.location.as_str(), request.clone()))
                .catch(&ctx)
                .map_err(|caught| {
                    PluginError::ScriptInvoke(format!(
                        "'{function}' failed: {}",
                        describe_caught(&caught, Some(self.script.as_str()))
                    ))
                })?;

            let Some(text) = returned.as_string() else {
                return Err(PluginError::ScriptInvoke(format!(
                    "'{function}' returned {:?} instead of a string",
                    returned.type_of()
                )));
            };
            let text = text
                .to_string()
                .map_err(|e| PluginError::ScriptInvoke(format!("'{function}' result: {e}")))?;

            let request = from_js_request(&request)?;
            let (body, _, _) = request.encoding.encode(&text);
            Ok(Response::new(
                body.into_owned(),
                request,
                response.location.clone(),
            ))
        })
    }
}

/// `{ headers: {...}, formData: {...}, encoding: "UTF-8" }`
fn to_js_request<'js>(ctx: &Ctx<'js>, request: &Request) -> rquickjs::Result<Object<'js>> {
    let headers = Object::new(ctx.clone())?;
    for (name, value) in &request.headers {
        headers.set(name.as_str(), value.as_str())?;
    }
    let form_data = Object::new(ctx.clone())?;
    for (name, value) in &request.form_data {
        form_data.set(name.as_str(), value.as_str())?;
    }

    let object = Object::new(ctx.clone())?;
    object.set("headers", headers)?;
    object.set("formData", form_data)?;
    object.set("encoding", request.encoding.name())?;
    Ok(object)
}

fn from_js_request(object: &Object<'_>) -> Result<Request> {
    let label: Value = object
        .get("encoding")
        .map_err(|e| PluginError::InvalidResult(format!("request.encoding: {e}")))?;
    let label = match label.as_string() {
        Some(label) => label
            .to_string()
            .map_err(|e| PluginError::InvalidResult(format!("request.encoding: {e}")))?,
        None => {
            return Err(PluginError::InvalidResult(format!(
                "request.encoding is {:?}, not a string",
                label.type_of()
            )))
        }
    };
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .filter(|encoding| encoding.output_encoding() == *encoding)
        .ok_or_else(|| {
            PluginError::InvalidResult(format!(
                "request.encoding '{label}' is not a known charset that can encode text"
            ))
        })?;

    Ok(Request {
        headers: string_map(object, "headers")?,
        form_data: string_map(object, "formData")?,
        encoding,
    })
}

/// Read `object[field]` as a map whose values must all be strings.
fn string_map(object: &Object<'_>, field: &str) -> Result<BTreeMap<String, String>> {
    let value: Value = object
        .get(field)
        .map_err(|e| PluginError::InvalidResult(format!("request.{field}: {e}")))?;
    let Some(entries) = value.as_object() else {
        return Err(PluginError::InvalidResult(format!(
            "request.{field} is {:?}, not an object",
            value.type_of()
        )));
    };

    let mut map = BTreeMap::new();
    for prop in entries.props::<String, Value>() {
        let (key, value) =
            prop.map_err(|e| PluginError::InvalidResult(format!("request.{field}: {e}")))?;
        let Some(text) = value.as_string() else {
            return Err(PluginError::InvalidResult(format!(
                "request.{field}['{key}'] is {:?}, not a string",
                value.type_of()
            )));
        };
        let text = text
            .to_string()
            .map_err(|e| PluginError::InvalidResult(format!("request.{field}['{key}']: {e}")))?;
        map.insert(key, text);
    }
    Ok(map)
}

/// Message, line with its source text (when `script` is known) and JS stack.
pub(crate) fn describe_caught(caught: &CaughtError<'_>, script: Option<&str>) -> String {
    let CaughtError::Exception(exception) = caught else {
        return caught.to_string();
    };

    let stack = exception.stack();
    let mut text = exception.message().unwrap_or_else(|| "<no message>".to_string());
    let line = exception
        .as_object()
        .get::<_, Option<i32>>("lineNumber")
        .ok()
        .flatten()
        .or_else(|| stack.as_deref().and_then(stack_line));
    if let Some(line) = line {
        text = format!("line {line}: {text}");
        let source_line = usize::try_from(line)
            .ok()
            .and_then(|line| line.checked_sub(1))
            .and_then(|index| script?.lines().nth(index));
        if let Some(source_line) = source_line {
            text.push_str("\n\n");
            text.push_str(source_line.trim());
        }
    }
    text.push_str("\n\n");
    text.push_str(stack.as_deref().unwrap_or("<no stack trace>"));
    text
}

/// Line of the innermost frame, e.g. `2` from `at hook (eval_script:2:11)`.
fn stack_line(stack: &str) -> Option<i32> {
    stack
        .lines()
        .find_map(|frame| STACK_LINE.captures(frame.trim()))
        .and_then(|caps| caps[1].parse().ok())
}
