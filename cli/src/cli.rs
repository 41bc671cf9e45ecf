use clap::Parser;
use std::path::PathBuf;

/// Ask questions about clinical system tip sheets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The question to ask
    #[arg(index = 1)] // Positional argument
    pub prompt: Option<String>,

    /// Enter interactive chat mode
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Base URL of the chat backend
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long)]
    pub token: Option<String>,

    /// Wait for the whole answer instead of streaming it
    #[arg(long, default_value_t = false)]
    pub no_stream: bool,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
