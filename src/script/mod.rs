//! Script bridge: one QuickJS runtime per plugin, confined to one thread.
//!
//! QuickJS is not safe for concurrent entry, so each bridge spawns a worker
//! thread that creates the runtime, runs the script block and then executes
//! queued jobs one at a time. Callers block until their job completes.
//!
//! ```text
//! caller thread            worker thread ("srcplug-script")
//! ─────────────            ──────────────────────────────────
//! new() ───────────────▶   JsEngine::new → install callbacks → execute
//!       ◀── init result
//! invoke() ── Job ─────▶   JsEngine::invoke
//!       ◀── Response
//! release() ─ Shutdown ─▶  drain, drop runtime, exit
//! ```

pub(crate) mod callbacks;
pub(crate) mod js_engine;

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use self::callbacks::{CallbackEnv, CallbackRegistry};
use self::js_engine::JsEngine;
use crate::config::ScriptConfig;
use crate::error::{PluginError, Result};
use crate::io::{IoProvider, Logger};
use crate::types::{Request, Response};

type Job = Box<dyn FnOnce(&JsEngine) + Send>;

enum WorkerMsg {
    Run(Job),
    Shutdown,
}

/// Serialized access to a plugin's script runtime.
pub struct ScriptBridge {
    plugin_name: String,
    logger: Arc<dyn Logger>,
    jobs: Sender<WorkerMsg>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScriptBridge {
    /// Spawn the worker, register callbacks and run `script`.
    ///
    /// `request` is the request `require()` fetches with.
    pub fn new(
        script: &str,
        plugin_name: &str,
        io: &IoProvider,
        request: Request,
        config: &ScriptConfig,
    ) -> Result<Self> {
        let registry = CallbackRegistry::new(&io.custom_functions);
        let env = CallbackEnv {
            plugin_name: plugin_name.to_string(),
            logger: Arc::clone(&io.logger),
            fetch: Arc::clone(&io.fetch),
            request,
        };
        let script = script.to_string();
        let config = config.clone();
        let (jobs, job_rx) = crossbeam_channel::unbounded::<WorkerMsg>();
        let (init_tx, init_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let spawned = std::thread::Builder::new()
            .name("srcplug-script".to_string())
            .spawn(move || run_worker(&script, &config, registry, env, &init_tx, &job_rx));

        let init = match spawned {
            Ok(handle) => match init_rx.recv() {
                Ok(Ok(())) => Ok(handle),
                Ok(Err(e)) => {
                    let _ = handle.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = handle.join();
                    Err(PluginError::ScriptInit(
                        "script worker exited during initialization".to_string(),
                    ))
                }
            },
            Err(e) => Err(PluginError::ScriptInit(format!(
                "cannot spawn script worker: {e}"
            ))),
        };

        match init {
            Ok(handle) => Ok(Self {
                plugin_name: plugin_name.to_string(),
                logger: Arc::clone(&io.logger),
                jobs,
                worker: Mutex::new(Some(handle)),
            }),
            Err(e) => {
                io.logger.error(plugin_name, &e);
                Err(e)
            }
        }
    }

    /// Call script function `function` with `response`; see [`JsEngine::invoke`].
    pub fn invoke(&self, function: &str, response: Response) -> Result<Response> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let target = function.to_string();
        let job: Job = Box::new(move |engine| {
            let _ = reply_tx.send(engine.invoke(&target, &response));
        });

        let result = self
            .jobs
            .send(WorkerMsg::Run(job))
            .map_err(|_| PluginError::Released)
            .and_then(|()| reply_rx.recv().map_err(|_| PluginError::Released))
            .and_then(|result| result);

        if let Err(e) = &result {
            self.logger.error(&self.plugin_name, e);
        }
        result
    }

    /// Drain queued work, drop the runtime and join the worker.
    ///
    /// Safe to call more than once; later [`invoke`](Self::invoke) calls fail
    /// with [`PluginError::Released`].
    pub fn release(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        let _ = self.jobs.send(WorkerMsg::Shutdown);
        if handle.join().is_err() {
            warn!(plugin = %self.plugin_name, "script worker panicked before release");
            self.logger
                .log("script runtime was not released cleanly", &self.plugin_name);
        }
        debug!(plugin = %self.plugin_name, "script runtime released");
    }

    pub fn is_released(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for ScriptBridge {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_worker(
    script: &str,
    config: &ScriptConfig,
    registry: CallbackRegistry,
    env: CallbackEnv,
    init_tx: &Sender<Result<()>>,
    jobs: &Receiver<WorkerMsg>,
) {
    let engine = JsEngine::new(config).and_then(|mut engine| {
        engine.install(registry, env)?;
        engine.execute(script)?;
        Ok(engine)
    });
    let engine = match engine {
        Ok(engine) => {
            let _ = init_tx.send(Ok(()));
            engine
        }
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };

    for msg in jobs {
        match msg {
            WorkerMsg::Run(job) => job(&engine),
            WorkerMsg::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::io::Fetch;

    struct ScriptServer;

    impl Fetch for ScriptServer {
        fn request(&self, url: &str, request: &Request) -> anyhow::Result<Response> {
            match url {
                "http://cdn/lib.js" => Ok(Response::new(
                    b"function shout(s) { return s.toUpperCase(); }".to_vec(),
                    request.clone(),
                    url,
                )),
                _ => anyhow::bail!("404: {url}"),
            }
        }
    }

    #[derive(Default)]
    struct CountingLogger {
        logs: Mutex<Vec<String>>,
        errors: AtomicUsize,
    }

    impl Logger for CountingLogger {
        fn log(&self, message: &str, plugin_name: &str) {
            self.logs
                .lock()
                .unwrap()
                .push(format!("{plugin_name}: {message}"));
        }

        fn error(&self, _plugin_name: &str, _error: &PluginError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn io(logger: Arc<CountingLogger>) -> IoProvider {
        IoProvider::new(Arc::new(ScriptServer), logger)
    }

    fn bridge(script: &str, io: &IoProvider) -> Result<ScriptBridge> {
        ScriptBridge::new(script, "demo", io, Request::new(), &ScriptConfig::default())
    }

    fn empty() -> Response {
        Response::new(Vec::new(), Request::new(), "http://site/")
    }

    #[test]
    fn print_goes_to_logger() {
        let logger = Arc::new(CountingLogger::default());
        let bridge = bridge(
            "function hook() { print('hello ' + 1); return 'ok'; }",
            &io(Arc::clone(&logger)),
        )
        .unwrap();
        bridge.invoke("hook", empty()).unwrap();
        assert_eq!(logger.logs.lock().unwrap().as_slice(), ["demo: hello 1"]);
    }

    #[test]
    fn require_loads_remote_script() {
        let logger = Arc::new(CountingLogger::default());
        let bridge = bridge(
            "require('http://cdn/lib.js'); function hook(body) { return shout('abc'); }",
            &io(logger),
        )
        .unwrap();
        assert_eq!(bridge.invoke("hook", empty()).unwrap().text(), "ABC");
    }

    #[test]
    fn require_failure_is_reported_and_fatal() {
        let logger = Arc::new(CountingLogger::default());
        let result = bridge("require('http://cdn/missing.js');", &io(Arc::clone(&logger)));
        assert!(matches!(result, Err(PluginError::ScriptInit(_))));
        // Once from the callback, once for the failed initialization.
        assert_eq!(logger.errors.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn require_without_argument_throws() {
        let logger = Arc::new(CountingLogger::default());
        let bridge = bridge(
            "function hook() { try { require(); return 'no'; } catch (e) { return 'threw'; } }",
            &io(logger),
        )
        .unwrap();
        assert_eq!(bridge.invoke("hook", empty()).unwrap().text(), "threw");
    }

    #[test]
    fn host_functions_receive_json_arguments() {
        let logger = Arc::new(CountingLogger::default());
        let io = io(logger).with_function("sum", |args| {
            let total: f64 = args.iter().filter_map(serde_json::Value::as_f64).sum();
            Ok(Some(serde_json::json!({ "total": total })))
        });
        let bridge = bridge(
            "function hook() { return String(sum(1, 2, 3.5).total); }",
            &io,
        )
        .unwrap();
        assert_eq!(bridge.invoke("hook", empty()).unwrap().text(), "6.5");
    }

    #[test]
    fn host_function_can_shadow_print() {
        let logger = Arc::new(CountingLogger::default());
        let io = io(Arc::clone(&logger))
            .with_function("print", |_| Ok(Some(serde_json::json!("shadowed"))));
        let bridge = bridge("function hook() { return print('x'); }", &io).unwrap();
        assert_eq!(bridge.invoke("hook", empty()).unwrap().text(), "shadowed");
        assert!(logger.logs.lock().unwrap().is_empty());
    }

    #[test]
    fn host_function_errors_become_exceptions() {
        let logger = Arc::new(CountingLogger::default());
        let io = io(logger).with_function("fail", |_| anyhow::bail!("nope"));
        let bridge = bridge(
            "function hook() { try { fail(); } catch (e) { return 'caught'; } return 'no'; }",
            &io,
        )
        .unwrap();
        assert_eq!(bridge.invoke("hook", empty()).unwrap().text(), "caught");
    }

    #[test]
    fn init_error_is_logged() {
        let logger = Arc::new(CountingLogger::default());
        let result = bridge("throw new Error('bad plugin');", &io(Arc::clone(&logger)));
        let err = result.err().unwrap();
        assert!(matches!(err, PluginError::ScriptInit(_)));
        assert!(err.to_string().contains("bad plugin"));
        assert!(err.to_string().contains("line 1"));
        assert_eq!(logger.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoke_after_release_is_rejected() {
        let logger = Arc::new(CountingLogger::default());
        let bridge = bridge("function hook() { return 'ok'; }", &io(logger)).unwrap();
        assert!(!bridge.is_released());
        bridge.release();
        assert!(bridge.is_released());
        assert!(matches!(
            bridge.invoke("hook", empty()),
            Err(PluginError::Released)
        ));
        // Second release is a no-op.
        bridge.release();
    }

    #[test]
    fn concurrent_invocations_are_serialized() {
        let logger = Arc::new(CountingLogger::default());
        let bridge = Arc::new(
            bridge(
                "var n = 0; function next() { n += 1; return String(n); }",
                &io(logger),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bridge = Arc::clone(&bridge);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| bridge.invoke("next", empty()).unwrap().text())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .map(|s| s.parse().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=80).collect::<Vec<_>>());
    }
}
