//! Native functions exposed to plugin scripts.
//!
//! ```text
//! JavaScript:  print(msg)      require(url)           hostFn(a, b)
//!      ↓            ↓               ↓                      ↓
//! Rust:        Logger::log     Fetch::request + eval  NativeFunction(&[json])
//! ```
//!
//! Built-ins are registered first and host functions after them, so a host
//! function with the same name replaces the built-in.

use std::collections::HashMap;
use std::sync::Arc;

use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{CatchResultExt, Ctx, Exception, Function, Value};

use crate::error::PluginError;
use crate::io::{Fetch, Logger, NativeFunction};
use crate::types::Request;

/// What runs when a registered global is called.
#[derive(Clone)]
pub(crate) enum Callback {
    Print,
    Require,
    Host(NativeFunction),
}

/// Name → callback table built once per bridge.
#[derive(Clone)]
pub(crate) struct CallbackRegistry {
    entries: HashMap<String, Callback>,
}

impl CallbackRegistry {
    pub(crate) fn new(custom: &HashMap<String, NativeFunction>) -> Self {
        let mut entries = HashMap::new();
        entries.insert("print".to_string(), Callback::Print);
        entries.insert("require".to_string(), Callback::Require);
        for (name, function) in custom {
            entries.insert(name.clone(), Callback::Host(Arc::clone(function)));
        }
        Self { entries }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, name: &str) -> Option<&Callback> {
        self.entries.get(name)
    }
}

/// Host state the callbacks need.
#[derive(Clone)]
pub(crate) struct CallbackEnv {
    pub(crate) plugin_name: String,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) fetch: Arc<dyn Fetch>,
    /// Request used by `require` fetches.
    pub(crate) request: Request,
}

impl CallbackEnv {
    /// Log `error` and turn it into a pending JS exception.
    fn throw(&self, ctx: &Ctx<'_>, error: &PluginError) -> rquickjs::Error {
        self.logger.error(&self.plugin_name, error);
        Exception::throw_message(ctx, &error.to_string())
    }
}

/// Register every callback of `registry` as a global function.
pub(crate) fn install<'js>(
    ctx: &Ctx<'js>,
    registry: CallbackRegistry,
    env: CallbackEnv,
) -> rquickjs::Result<()> {
    let env = Arc::new(env);
    let globals = ctx.globals();

    for (name, callback) in registry.entries {
        let env = Arc::clone(&env);
        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                dispatch(&ctx, &callback, &env, &args.0)
            },
        )?;
        globals.set(name.as_str(), function)?;
    }
    Ok(())
}

fn dispatch<'js>(
    ctx: &Ctx<'js>,
    callback: &Callback,
    env: &CallbackEnv,
    args: &[Value<'js>],
) -> rquickjs::Result<Value<'js>> {
    match callback {
        Callback::Print => {
            if let Some(message) = args.first() {
                let Coerced(text) = message.get::<Coerced<String>>()?;
                env.logger.log(&text, &env.plugin_name);
            }
            Ok(Value::new_undefined(ctx.clone()))
        }
        Callback::Require => {
            let Some(url) = args.first() else {
                return Err(env.throw(
                    ctx,
                    &PluginError::ScriptInvoke(
                        "'require': 1 argument required, but only 0 present.".to_string(),
                    ),
                ));
            };
            let Coerced(url) = url.get::<Coerced<String>>()?;

            let outcome = match env.fetch.request(&url, &env.request) {
                Ok(script) => ctx
                    .eval::<(), _>(script.text())
                    .catch(ctx)
                    .map_err(|caught| caught.to_string()),
                Err(e) => Err(format!("{e:#}")),
            };
            if let Err(reason) = outcome {
                return Err(env.throw(
                    ctx,
                    &PluginError::ScriptInvoke(format!("Can not load script '{url}': {reason}")),
                ));
            }
            Ok(Value::new_undefined(ctx.clone()))
        }
        Callback::Host(function) => {
            let params = args
                .iter()
                .map(|arg| to_json(ctx, arg))
                .collect::<rquickjs::Result<Vec<_>>>()?;
            match function(&params) {
                Ok(Some(value)) => from_json(ctx, &value),
                Ok(None) => Ok(Value::new_undefined(ctx.clone())),
                Err(e) => Err(Exception::throw_message(ctx, &format!("{e:#}"))),
            }
        }
    }
}

/// JS value → JSON via `JSON.stringify`; unserializable values become `null`.
fn to_json<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<serde_json::Value> {
    let Some(text) = ctx.json_stringify(value.clone())? else {
        return Ok(serde_json::Value::Null);
    };
    serde_json::from_str(&text.to_string()?)
        .map_err(|e| Exception::throw_message(ctx, &format!("argument is not JSON: {e}")))
}

fn from_json<'js>(ctx: &Ctx<'js>, value: &serde_json::Value) -> rquickjs::Result<Value<'js>> {
    let text = serde_json::to_string(value)
        .map_err(|e| Exception::throw_message(ctx, &format!("result is not JSON: {e}")))?;
    ctx.json_parse(text)
}
