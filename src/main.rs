mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cake::config::CakeConfig;

#[derive(Parser)]
#[command(name = "cake", version, about = "Knowledge-graph context engine for LLM prompts")]
struct Cli {
    /// Config file (defaults to ~/.cake/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport unless --http is given)
    Serve {
        /// Serve over streamable HTTP at server.host:server.port
        #[arg(long)]
        http: bool,
    },
    /// Load knowledge files (.md as Markdown, otherwise JSON triplets) into the graph
    Load {
        files: Vec<PathBuf>,
        /// Also load the built-in framework sample
        #[arg(long)]
        framework: bool,
    },
    /// Print the knowledge context for a query
    Context {
        query: String,
        #[arg(long)]
        max_depth: Option<usize>,
        #[arg(long)]
        max_nodes: Option<usize>,
        #[arg(long)]
        max_length: Option<usize>,
        /// Comma-separated entity types to recognize
        #[arg(long)]
        types: Option<String>,
        /// Comma-separated node labels to report
        #[arg(long)]
        labels: Option<String>,
        /// Comma-separated relationship types to report
        #[arg(long)]
        relationships: Option<String>,
    },
    /// Search graph nodes
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show a node and its edges
    Inspect { id: String },
    /// Show graph and cache statistics
    Stats,
    /// Export the graph as JSON to stdout
    Export,
    /// Merge an exported JSON file into the graph
    Import { file: PathBuf },
    /// Show the entities recognized in a piece of text
    Extract {
        text: String,
        /// Comma-separated entity types to recognize
        #[arg(long)]
        types: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CakeConfig::load_from(path)?,
        None => CakeConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC and command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Load { files, framework } => cli::load::load(&config, &files, framework)?,
        Command::Context {
            query,
            max_depth,
            max_nodes,
            max_length,
            types,
            labels,
            relationships,
        } => {
            let args = cli::context::ContextArgs {
                max_depth,
                max_nodes,
                max_length,
                entity_types: types,
                node_labels: labels,
                relationships,
            };
            cli::context::context(&config, &query, &args)?;
        }
        Command::Search { query, limit } => cli::search::search(&config, &query, limit)?,
        Command::Inspect { id } => cli::inspect::inspect(&config, &id)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Export => cli::export::export(&config)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Extract { text, types, json } => {
            cli::extract::extract(&text, types.as_deref(), json)?
        }
    }

    Ok(())
}
