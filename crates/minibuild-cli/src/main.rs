//! minibuild CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use minibuild_cli::{Cli, Commands, cmd};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Explicit verbosity flags win over RUST_LOG.
    let filter = match cli.log_directive() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config();
    match cli.command {
        Commands::Resolve { dir, json } => cmd::resolve::resolve(config, &dir, json),
        Commands::Classpath { dir } => cmd::classpath::classpath(config, &dir),
        Commands::Download { dir } => cmd::download::download(config, &dir),
        Commands::Compile { dir } => cmd::compile::compile(config, &dir),
        Commands::Discover { roots, exclude } => cmd::discover::discover(config, &roots, &exclude),
    }
}
