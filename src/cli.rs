use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fopgate")]
#[command(about = "Media and document job gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind to; overrides `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file; defaults to FOPGATE_CONFIG or config/fopgate.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}
