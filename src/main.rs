use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

mod chat;
mod cmd_parser;
mod config;
mod context;
mod edit_parser;
mod editor;
mod error;
mod llm;
mod panel;
mod prompts;
mod protocol;
mod thinking;
mod workspace;

use config::Config;
use context::vcs::GitProbe;
use context::ContextAggregator;
use panel::{ChannelSink, LogNotifier, Notifier, Panel, StdoutSink, TtyTerminal};
use prompts::{PromptMode, PromptsConfig};
use protocol::{AiResponse, InboundMessage, OutboundMessage};
use workspace::{LocalWorkspace, Workspace};

#[derive(Debug, Parser)]
#[command(name = "natural-git")]
#[command(version)]
#[command(about = "Natural-language Git commands and workspace analysis")]
struct Cli {
    /// Config file (defaults to ~/.natural-git/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a config value, e.g. --set provider=ollama
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override_arg, global = true)]
    overrides: Vec<(String, String)>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the panel over JSON lines on stdin/stdout
    Serve {
        #[arg(long, value_enum)]
        mode: Option<PromptMode>,
        /// Workspace folders (defaults to the current directory)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
        /// Send this request before any UI attaches; the result waits in the queue
        #[arg(long)]
        ask: Option<String>,
    },
    /// Interactive session in the terminal
    Chat {
        #[arg(long, value_enum)]
        mode: Option<PromptMode>,
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
    },
    /// Translate one request into Git commands and print them
    Ask { request: String },
    /// Print the workspace snapshot that would be sent with a request
    Context {
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
    },
}

fn parse_override_arg(s: &str) -> Result<(String, String), String> {
    config::parse_override(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = config::load_or_create_config(cli.config.as_deref())?;
    config.merge_overrides(cli.overrides)?;

    // The chat UI owns the terminal, so keep logging quiet unless asked
    let log_level = match (&cli.log_level, &cli.command) {
        (Some(level), _) => level.clone(),
        (None, Command::Chat { .. }) => "warn".to_string(),
        (None, _) => config.general.log_level.clone(),
    };
    init_logging(&log_level)?;

    match cli.command {
        Command::Serve { mode, roots, ask } => {
            let mode = mode.unwrap_or(config.panel.mode);
            let panel = build_panel(&config, mode, roots, Box::new(LogNotifier))?;
            serve(panel, ask).await
        }
        Command::Chat { mode, roots } => {
            let mode = mode.unwrap_or(config.panel.mode);
            let panel = build_panel(&config, mode, roots, Box::new(chat::ConsoleNotifier))?;
            chat::run_chat(panel).await
        }
        Command::Ask { request } => ask(&config, &request).await,
        Command::Context { roots } => {
            let workspace = LocalWorkspace::new(resolve_roots(roots)?);
            let snapshot = ContextAggregator::new(&workspace, &GitProbe).gather().await;
            print!("{}", snapshot);
            Ok(())
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", level))?;

    // stdout carries the protocol in serve mode
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
    Ok(())
}

fn resolve_roots(roots: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        return Ok(vec![std::env::current_dir()?]);
    }
    roots
        .into_iter()
        .map(|root| {
            root.canonicalize()
                .with_context(|| format!("Workspace folder not found: {}", root.display()))
        })
        .collect()
}

fn build_panel(
    config: &Config,
    mode: PromptMode,
    roots: Vec<PathBuf>,
    notifier: Box<dyn Notifier>,
) -> Result<Panel> {
    let generator = llm::from_config(&config.llm)?;
    let prompts = PromptsConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load prompts.toml, using built-in prompts: {:#}", e);
        PromptsConfig::default()
    });
    let workspace = LocalWorkspace::new(resolve_roots(roots)?);

    info!(
        "Using {} in {:?} mode with {} workspace folder(s)",
        generator.name(),
        mode,
        workspace.folders().len()
    );

    Ok(Panel::new(mode, generator, workspace)
        .with_prompts(prompts)
        .with_confirm(editor::confirm_for(config.panel.confirm_create))
        .with_terminal(Box::new(TtyTerminal::new(&config.panel.terminal_name)))
        .with_notifier(notifier))
}

async fn serve(mut panel: Panel, initial: Option<String>) -> Result<()> {
    if let Some(request) = initial {
        panel.handle_user_message(&request).await;
        debug!("{} message(s) waiting for a UI", panel.pending_len());
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    info!("Panel ready, waiting for a UI on stdin");

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                debug!("Received: {}", trimmed);

                // Whoever speaks first is the UI
                if !panel.is_attached() {
                    panel.attach(Box::new(StdoutSink));
                }

                match InboundMessage::parse(trimmed) {
                    Ok(message) => {
                        if let Err(e) = panel.handle_message(message).await {
                            error!("Error handling message: {:#}", e);
                        }
                    }
                    Err(e) => warn!("Ignoring message: {:#}", e),
                }
            }
            Err(e) => {
                error!("Error reading from stdin: {}", e);
                break;
            }
        }
    }

    info!("Panel shutting down");
    Ok(())
}

async fn ask(config: &Config, request: &str) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut panel = build_panel(config, PromptMode::Git, Vec::new(), Box::new(chat::ConsoleNotifier))?;
    panel.attach(Box::new(ChannelSink(tx)));

    let indicator = thinking::show_thinking(PromptMode::Git);
    panel.handle_user_message(request).await;
    indicator.finish();

    while let Ok(message) = rx.try_recv() {
        if let OutboundMessage::AiResponse(AiResponse::Commands { commands, .. }) = message {
            for command in commands {
                println!("{}", command.bright_cyan());
            }
        }
    }
    Ok(())
}
