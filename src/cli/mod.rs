//! CLI surface: AniBridge is primarily a long-running bridge process, so the
//! command set is deliberately small — `daemon` (the default), `check`,
//! `health`, `init`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anibridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge: scheduler, Torznab indexer, qBittorrent façade, STRM proxy.
    #[command(alias = "-d")]
    Daemon,

    /// Reap dangling jobs from a previous run and exit, without serving HTTP.
    #[command(alias = "-c")]
    Check,

    /// Print the `/health` payload without starting the HTTP server.
    Health,

    /// Write a default config.toml if one does not already exist.
    #[command(alias = "--init")]
    Init,
}
