//! sprig - a static site builder for component-style pages and markdown posts.

mod build;
mod cli;
mod compiler;
mod config;
mod css;
mod logger;
mod reload;
mod serve;
mod tsx;
mod utils;
mod vdom;
mod watch;

use anyhow::Result;
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use compiler::Mode;
use config::{ConfigHandle, SiteConfig};
use serve::serve_site;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build => {
            let config = SiteConfig::load(&cli.root, &cli.config)?;
            config.validate()?;
            build_site(&config, Mode::Production).map(|_| ())
        }
        Commands::Dev => {
            let config = ConfigHandle::load(&cli.root, &cli.config)?;
            serve_site(Arc::new(config))
        }
    }
}
