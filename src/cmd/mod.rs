mod info;
mod output;
mod resolve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use srcplug::{EngineConfig, HttpFetch, IoProvider, PluginEngine, TracingLogger};

pub use info::{cmd_find, cmd_info};
pub use resolve::{cmd_call, cmd_entry, cmd_get, cmd_search};

/// Load the plugin at `path` with the user's config and the HTTP transport.
fn load_engine(path: &Path) -> Result<PluginEngine> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read plugin {}", path.display()))?;
    let config = EngineConfig::load()?;
    let fetch = HttpFetch::with_config(&config.http)?;
    let io = IoProvider::new(Arc::new(fetch), Arc::new(TracingLogger));
    let engine = PluginEngine::with_config(&source, io, &config)
        .with_context(|| format!("cannot load plugin {}", path.display()))?;
    Ok(engine)
}
