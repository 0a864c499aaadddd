use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Result};
use tracing::info;

use srcplug::{Node, PluginEngine};

use super::load_engine;
use super::output::output_body;

pub fn cmd_get(
    plugin: &Path,
    url: &str,
    page: u32,
    allow_redirect: bool,
    max_body: usize,
) -> Result<()> {
    let engine = load_engine(plugin)?;
    let Some(node) = engine.find_node(url, allow_redirect) else {
        engine.release();
        bail!("no node of '{}' matches {url}", engine.meta().title);
    };
    let outcome = run_node(&engine, node, Some(url), page, max_body);
    engine.release();
    outcome
}

pub fn cmd_entry(
    plugin: &Path,
    index: usize,
    input: Option<&str>,
    page: u32,
    max_body: usize,
) -> Result<()> {
    let engine = load_engine(plugin)?;
    let Some(node) = engine.entries().get(index) else {
        let count = engine.entries().len();
        engine.release();
        bail!("entry index {index} out of range ({count} entries)");
    };
    let outcome = run_node(&engine, node, input, page, max_body);
    engine.release();
    outcome
}

pub fn cmd_search(plugin: &Path, query: &str, page: u32, max_body: usize) -> Result<()> {
    let engine = load_engine(plugin)?;
    let Some(node) = engine.search() else {
        engine.release();
        bail!("plugin '{}' has no search node", engine.meta().title);
    };
    let outcome = run_node(&engine, node, Some(query), page, max_body);
    engine.release();
    outcome
}

pub fn cmd_call(plugin: &Path, link: &str) -> Result<()> {
    let engine = load_engine(plugin)?;
    let outcome = engine
        .process_response(link)
        .map(|response| output_body(&response.text(), 0));
    engine.release();
    Ok(outcome?)
}

fn run_node(
    engine: &PluginEngine,
    node: &Node,
    input: Option<&str>,
    page: u32,
    max_body: usize,
) -> Result<()> {
    let start = Instant::now();
    let response = engine.get_data(node, input, page)?;
    info!(
        node = %node.data_type,
        location = %response.location,
        bytes = response.body.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Resolved"
    );
    output_body(&response.text(), max_body);
    Ok(())
}
