//! This module defines the command line arguments Ladle accepts.

use std::path::PathBuf;

use crate::db::cmd::DbCommand;


#[derive(Debug, clap::Parser)]
#[command(about = "GraphQL backend of the Ladle recipe sharing app.")]
pub(crate) struct Args {
    #[command(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the backend HTTP server.
    Serve {
        #[command(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[command(subcommand)]
        cmd: DbCommand,

        #[command(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions of all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, Ladle will
    /// try opening `config.toml` or `/etc/ladle/config.toml`.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
}
