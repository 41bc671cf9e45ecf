use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tipchat_core::config::{get_default_config_file, ChatConfig, APP_NAME};
use tipchat_core::{ChatClient, ChatSession, StaticToken};
use tracing::{debug, warn};

mod app;
mod cli;
mod commands;
mod logging;
mod output;

use crate::cli::Args;
use crate::logging::{init_tracing, log_error, log_info};
use crate::output::print_usage_instructions;

/// Configuration from file, then `.env` and environment, then flags
fn load_config(args: &Args) -> Result<ChatConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file(APP_NAME).context("Failed to locate config file")?,
    };
    let file_config = ChatConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    dotenvy::dotenv().ok();
    let flags = ChatConfig {
        backend_url: args.backend_url.clone(),
        bearer_token: args.token.clone(),
        stream: args.no_stream.then_some(false),
        ..ChatConfig::default()
    };
    Ok(file_config.apply_env().merge(&flags))
}

/// Main function - Connects to the chat backend and asks questions
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log_error(&format!("{:#}", e));
            return Err(e);
        }
    };
    init_tracing(config.log_level(), args.verbose);
    debug!(backend = config.backend_url(), "Loaded configuration");

    if !args.interactive && args.prompt.is_none() {
        // No prompt and not interactive, show usage
        print_usage_instructions();
        return Ok(());
    }

    let client = ChatClient::new(&config).context("Failed to create chat client")?;
    let tokens = Arc::new(StaticToken::new(config.bearer_token.clone()));
    let mut session = ChatSession::new(client, tokens, &config);

    match session.load_backend_config().await {
        Ok(_) => log_info(&format!("Connected to {}", config.backend_url())),
        Err(e) => warn!("Could not load backend config, using defaults: {}", e),
    }

    // Call app logic based on arguments
    if args.interactive {
        if let Err(e) = crate::app::run_interactive_chat(&mut session).await {
            log_error(&format!("Error in interactive chat: {}", e));
            eprintln!("{}", format!("Interactive chat failed: {}", e).red());
        }
    } else if let Some(prompt) = args.prompt.clone() {
        if let Err(e) = crate::app::run_single_query(&mut session, prompt).await {
            log_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }

    Ok(())
}
