use std::path::Path;

use anyhow::Result;
use serde_json::json;

use srcplug::{Node, NodeKind, PluginEngine};

use super::load_engine;

pub fn cmd_info(plugin: &Path, as_json: bool) -> Result<()> {
    let engine = load_engine(plugin)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&info_json(&engine))?);
    } else {
        print_info(&engine);
    }

    engine.release();
    Ok(())
}

pub fn cmd_find(plugin: &Path, url: &str, allow_redirect: bool) -> Result<()> {
    let engine = load_engine(plugin)?;

    match engine.find_node(url, allow_redirect) {
        Some(node) => println!("{}", describe_node(node)),
        None => println!("❌ No node matches {url}"),
    }

    engine.release();
    Ok(())
}

fn print_info(engine: &PluginEngine) {
    let meta = engine.meta();
    println!("🧩 {} v{}", meta.title, meta.version);
    if !meta.author.is_empty() {
        println!("   Author: {}", meta.author);
    }
    println!("   GUID: {}", engine.guid());
    if !meta.source_url.is_empty() {
        println!("   Source: {}", meta.source_url);
    }
    println!("   Match: {}", meta.source_expr.as_str());
    if !meta.summary.is_empty() {
        println!("   Summary: {}", meta.summary);
    }
    if !meta.tags.is_empty() {
        println!("   Tags: {}", meta.tags.join(", "));
    }

    println!("\n📚 Entries ({}):", engine.entries().len());
    for (index, node) in engine.entries().iter().enumerate() {
        println!("   [{index}] {}", describe_node(node));
    }
    println!("\n👁  Views ({}):", engine.views().len());
    for node in engine.views() {
        println!("   {}", describe_node(node));
    }
    if let Some(search) = engine.search() {
        println!("\n🔍 Search: {}", describe_node(search));
    }
    if let Some(redirect) = engine.redirect_node() {
        println!("\n↪️  Redirect: {}", describe_node(redirect));
    }

    if !meta.actions.is_empty() {
        println!("\n⚡ Actions:");
        for action in &meta.actions {
            println!("   {} ({}): {}", action.title, action.kind, action.value);
        }
    }
}

fn describe_node(node: &Node) -> String {
    let mut text = match &node.kind {
        NodeKind::Entry { title } => format!("{} \"{title}\"", node.data_type),
        NodeKind::View { expr } => format!("{} /{}/", node.data_type, expr.as_str()),
        NodeKind::Search | NodeKind::Redirect => node.data_type.to_string(),
    };
    if let Some(url) = &node.url {
        text.push_str(&format!(" → {url}"));
    }
    let hooks: Vec<String> = [("request", &node.request), ("parse", &node.parse)]
        .into_iter()
        .filter_map(|(name, hook)| hook.as_ref().map(|hook| format!("{name}={hook}")))
        .collect();
    if !hooks.is_empty() {
        text.push_str(&format!(" [{}]", hooks.join(", ")));
    }
    text
}

fn info_json(engine: &PluginEngine) -> serde_json::Value {
    let meta = engine.meta();
    let node_json = |node: &Node| {
        json!({
            "type": node.data_type.to_string(),
            "title": node.title(),
            "url": node.url,
            "request": node.request,
            "parse": node.parse,
            "cache_millis": node.cache_millis(),
        })
    };

    json!({
        "title": meta.title,
        "version": meta.version,
        "author": meta.author,
        "guid": engine.guid(),
        "source_url": meta.source_url,
        "source_expr": meta.source_expr.as_str(),
        "summary": meta.summary,
        "tags": meta.tags,
        "properties": meta.properties,
        "actions": meta.actions.iter().map(|action| json!({
            "title": action.title,
            "type": action.kind,
            "value": action.value,
        })).collect::<Vec<_>>(),
        "entries": engine.entries().iter().map(node_json).collect::<Vec<_>>(),
        "views": engine.views().iter().map(node_json).collect::<Vec<_>>(),
        "search": engine.search().map(node_json),
        "redirect": engine.redirect_node().map(node_json),
    })
}
