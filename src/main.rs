//! `srcplug` CLI - Load a content-source plugin and run its nodes

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "srcplug")]
#[command(about = "Run declarative content-source plugins")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show plugin metadata and node summary
    Info {
        /// Plugin XML file
        plugin: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which node a URL resolves to
    Find {
        /// Plugin XML file
        plugin: PathBuf,

        /// URL to match
        url: String,

        /// Fall back to the redirect node when no view matches
        #[arg(short, long)]
        redirect: bool,
    },

    /// Resolve a URL and print the content
    Get {
        /// Plugin XML file
        plugin: PathBuf,

        /// URL to resolve
        url: String,

        /// Page number substituted for %page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Fall back to the redirect node when no view matches
        #[arg(short, long)]
        redirect: bool,

        /// Maximum characters to print (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_body: usize,
    },

    /// Run an entry node
    Entry {
        /// Plugin XML file
        plugin: PathBuf,

        /// Entry index, as listed by `info`
        index: usize,

        /// Value substituted for %input
        #[arg(short, long)]
        input: Option<String>,

        /// Page number substituted for %page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Maximum characters to print (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_body: usize,
    },

    /// Run the search node
    Search {
        /// Plugin XML file
        plugin: PathBuf,

        /// Search query
        query: String,

        /// Page number substituted for %page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Maximum characters to print (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_body: usize,
    },

    /// Run a TYPE::payload link through the script
    Call {
        /// Plugin XML file
        plugin: PathBuf,

        /// Colon link, e.g. `decode::abc`
        link: String,
    },
}

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { plugin, json } => cmd::cmd_info(&plugin, json),
        Commands::Find {
            plugin,
            url,
            redirect,
        } => cmd::cmd_find(&plugin, &url, redirect),
        Commands::Get {
            plugin,
            url,
            page,
            redirect,
            max_body,
        } => cmd::cmd_get(&plugin, &url, page, redirect, max_body),
        Commands::Entry {
            plugin,
            index,
            input,
            page,
            max_body,
        } => cmd::cmd_entry(&plugin, index, input.as_deref(), page, max_body),
        Commands::Search {
            plugin,
            query,
            page,
            max_body,
        } => cmd::cmd_search(&plugin, &query, page, max_body),
        Commands::Call { plugin, link } => cmd::cmd_call(&plugin, &link),
    }
}
