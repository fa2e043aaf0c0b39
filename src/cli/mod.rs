//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod say;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use clap::{Parser, Subcommand};

use crate::core::config::data::path_display;
use crate::core::config::Config;
use crate::core::orchestrator::Orchestrator;
use crate::core::session::SessionStore;
use crate::mcp::client::McpToolClient;
use crate::mcp::ToolClient;
use crate::utils::logging::init_tracing;

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown"),
        option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown")
    )
});

#[derive(Parser)]
#[command(name = "toolrelay")]
#[command(version, long_version = LONG_VERSION.as_str())]
#[command(about = "A streaming chat gateway in front of an MCP tool backend")]
#[command(
    long_about = "toolrelay routes each chat turn through an MCP tool backend and an LLM. \
For every message it decides whether a tool should be called, folds the tool result \
into the prompt and streams the model's answer back.\n\n\
Environment Variables:\n\
  TOOLRELAY_TOOL_URL   Tool backend base URL (overrides the config file)\n\
  TOOLRELAY_LLM_URL    OpenAI-compatible API base URL\n\
  TOOLRELAY_MODEL      Model name\n\
  OPENAI_API_KEY       API key (the variable name is configurable)\n\
  TOOLRELAY_LOG        Log filter, e.g. toolrelay=debug\n\n\
Chat commands:\n\
  /help             List the slash commands\n\
  Ctrl+C            Cancel the answer being streamed"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Auth token forwarded with every chat request
    #[arg(long, global = true, value_name = "TOKEN")]
    pub auth_token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send one message and print the streamed answer
    Say {
        /// The message (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the tools advertised by the backend
    Tools,
    /// Check that the tool backend answers
    Health,
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the configuration file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write a configuration file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let orchestrator = build_orchestrator(args.config.as_deref())?;
            chat::run_chat(orchestrator, args.auth_token).await
        }
        Commands::Say { prompt } => {
            let orchestrator = build_orchestrator(args.config.as_deref())?;
            say::run_say(orchestrator, prompt, args.auth_token).await
        }
        Commands::Tools => {
            let client = tool_client(args.config.as_deref())?;
            print_tools(&client).await;
            Ok(())
        }
        Commands::Health => {
            let client = tool_client(args.config.as_deref())?;
            if !print_health(&client).await {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config { command } => run_config_command(command, args.config.as_deref()),
    }
}

fn build_orchestrator(config_path: Option<&Path>) -> Result<Orchestrator, Box<dyn Error>> {
    let config = Config::load(config_path)?;
    let orchestrator = Orchestrator::from_config(&config, Arc::new(SessionStore::new()))?;
    Ok(orchestrator)
}

fn tool_client(config_path: Option<&Path>) -> Result<McpToolClient, Box<dyn Error>> {
    let config = Config::load(config_path)?;
    Ok(McpToolClient::new(config.tool_backend)?)
}

/// Prints the catalog, or the reason it is empty.
pub(crate) async fn print_tools(client: &dyn ToolClient) {
    let tools = client.list_tools().await;
    if tools.is_empty() {
        match client.last_error() {
            Some(err) => eprintln!("❌ No tools available: {err}"),
            None => println!("No tools available."),
        }
        return;
    }
    println!("Available tools:");
    for tool in &tools {
        println!("  {:<28} {}", tool.name, tool.description_or_default());
    }
}

pub(crate) async fn print_health(client: &dyn ToolClient) -> bool {
    if client.initialize().await {
        println!("✅ Tool backend is reachable");
        true
    } else {
        let reason = client
            .last_error()
            .unwrap_or_else(|| "no response".to_string());
        eprintln!("❌ Tool backend is unavailable: {reason}");
        false
    }
}

fn run_config_command(
    command: ConfigCommands,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_path()?,
    };
    match command {
        ConfigCommands::Path => println!("{}", path_display(&path)),
        ConfigCommands::Show => Config::load(Some(&path))?.resolved().print_all(),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                eprintln!(
                    "⚠️  {} already exists; pass --force to overwrite it",
                    path_display(&path)
                );
                std::process::exit(1);
            }
            Config::default().resolved().save_to_path(&path)?;
            println!("✅ Wrote default configuration to {}", path_display(&path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
