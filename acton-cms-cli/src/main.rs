//! acton-cms command line tool

#![allow(clippy::multiple_crate_versions)]

mod commands;

use acton_cms::config::CmsConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ServeCommand, SitemapCommand, ThemesCommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "acton-cms")]
#[command(version)]
#[command(about = "Manage themes, sitemaps and the public server of an acton-cms site", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the XDG config for "acton-cms")
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Discover, install, activate and publish themes
    Themes {
        #[command(subcommand)]
        command: ThemesCommand,
    },
    /// Print or regenerate the sitemap document
    Sitemap(SitemapCommand),
    /// Run the public HTTP server
    Serve(ServeCommand),
}

impl Cli {
    fn load_config(&self) -> Result<CmsConfig> {
        match &self.config {
            Some(path) => CmsConfig::load_from(&path.to_string_lossy()),
            None => CmsConfig::load_for_service("acton-cms"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Commands::Themes { command } => command.execute(config).await,
        Commands::Sitemap(command) => command.execute(config).await,
        Commands::Serve(command) => command.execute(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_theme_commands() {
        let cli = Cli::try_parse_from(["acton-cms", "themes", "uninstall", "flexia", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Themes {
                command: ThemesCommand::Uninstall { ref slug, yes: true }
            } if slug == "flexia"
        ));

        let cli = Cli::try_parse_from(["acton-cms", "--config", "site.toml", "sitemap", "--regenerate"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(cli.command, Commands::Sitemap(SitemapCommand { regenerate: true, .. })));
    }

    #[test]
    fn test_serve_port_override() {
        let cli = Cli::try_parse_from(["acton-cms", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve(ServeCommand { port: Some(9000) })));
    }
}
