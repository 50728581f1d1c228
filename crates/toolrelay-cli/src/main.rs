//! # toolrelay-cli
//!
//! Command-line interface for Toolrelay.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use toolrelay_core::error::format_error_with_suggestion;
use toolrelay_core::{Config, McpServerConfig};

mod commands;

/// Application context containing shared state.
pub struct AppContext {
    pub config: Config,
}

impl AppContext {
    /// Servers to use: the `--server` URLs when given, else the configured ones.
    pub fn servers(&self, overrides: &[String]) -> Vec<McpServerConfig> {
        if overrides.is_empty() {
            self.config.servers.clone()
        } else {
            overrides.iter().map(McpServerConfig::from_url).collect()
        }
    }
}

/// Toolrelay - answer questions with an LLM agent backed by MCP tool servers
#[derive(Parser)]
#[command(name = "toolrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Question to ask the agent
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Model to use (e.g., gpt-4o, gpt-4o-mini)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// MCP server URL; repeat for several servers (replaces configured servers)
    #[arg(short, long = "server", value_name = "URL", global = true)]
    servers: Vec<String>,

    /// Extra configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the servers and list their tools
    Tools,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the configuration directory
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so answers on stdout stay clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<toolrelay_core::Error>() {
            Some(err) => eprintln!("Error: {}", format_error_with_suggestion(err)),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let mut config = Config::load_validated(cli.config.as_deref())?;
    if let Some(ref model) = cli.model {
        config.general.model = model.clone();
    }

    let ctx = Arc::new(AppContext { config });

    match cli.command {
        Some(Commands::Tools) => {
            commands::tools::run(&ctx, &cli.servers).await?;
        }
        Some(Commands::Config { action }) => {
            commands::config::handle(action, &ctx)?;
        }
        Some(Commands::Version) => {
            println!("toolrelay {}", env!("CARGO_PKG_VERSION"));
        }
        None => match cli.query {
            Some(ref query) => commands::query::run(query, &cli.servers, &ctx).await?,
            None => anyhow::bail!("No query given. Run 'toolrelay --help' for usage."),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_with_servers() {
        let cli = Cli::try_parse_from([
            "toolrelay",
            "How is AAPL doing?",
            "--server",
            "http://127.0.0.1:3000/sse",
            "-s",
            "http://127.0.0.1:3001/sse",
            "--model",
            "gpt-4o-mini",
        ])
        .unwrap();

        assert_eq!(cli.query.as_deref(), Some("How is AAPL doing?"));
        assert_eq!(cli.servers.len(), 2);
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["toolrelay", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));

        let cli = Cli::try_parse_from(["toolrelay", "tools", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Tools)));
        assert!(cli.verbose);
    }

    #[test]
    fn test_server_overrides() {
        let ctx = AppContext {
            config: Config::default(),
        };

        let servers = ctx.servers(&[]);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "stocks");

        let servers = ctx.servers(&["http://localhost:4000/mcp".to_string()]);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "localhost:4000");
        assert_eq!(servers[0].url, "http://localhost:4000/mcp");
    }
}
