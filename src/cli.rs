use crate::gym::OutboxKind;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chatbot-pro", version, about = "WhatsApp assistant, story-tag verification and workout tracking")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML config file [default: config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP server with every webhook and the gym API
    Serve,
    /// Serve verification tools as JSON-RPC over stdin/stdout
    Ops,
    /// Replay queued gym writes once and exit
    Sync {
        /// Drop every queued intent of this kind before replaying
        #[arg(long, value_enum)]
        discard: Option<OutboxKind>,
    },
}
