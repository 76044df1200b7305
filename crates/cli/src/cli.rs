use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use transport::Protocol;

#[derive(Parser, Debug)]
#[command(name = "ariel", version, about = "Inspect models on a remote inference server")]
pub struct Cli {
    #[command(flatten)]
    pub connection: Connection,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings layered over the config file and `ARIEL_*` variables
#[derive(Args, Debug)]
pub struct Connection {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Wire protocol (grpc or http)
    #[arg(long, global = true)]
    pub protocol: Option<Protocol>,

    /// Server endpoint (host:port or URI)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a model's signature
    Inspect {
        /// Model name
        model: String,

        /// Model version (server default when omitted)
        #[arg(long)]
        version: Option<String>,
    },

    /// Check whether the server is ready
    Ready,
}
