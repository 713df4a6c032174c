//! Structurize CLI — post-build restructuring of bundler output.
//!
//! Moves scripts, stylesheets and media into their folders and rewrites the
//! references in every emitted HTML document to match.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
