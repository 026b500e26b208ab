//! Sitemap command

use super::{operator, SUCCESS};
use acton_cms::config::CmsConfig;
use acton_cms::state::CmsState;
use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;

/// Print the sitemap, or write it to a file
#[derive(Debug, Args)]
pub struct SitemapCommand {
    /// Rebuild the document even if a cached one is still fresh
    #[arg(short, long)]
    pub regenerate: bool,

    /// Write the document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SitemapCommand {
    /// Execute the sitemap command
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be opened or the file cannot be
    /// written.
    pub async fn execute(self, config: CmsConfig) -> Result<()> {
        let state = CmsState::from_config(config).await?;
        let document = if self.regenerate {
            state.admin().regenerate_sitemap(&operator()).await?
        } else {
            state.sitemap().build_document().await
        };

        match self.output {
            Some(path) => {
                tokio::fs::write(&path, &document)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                let urls = document.matches("<url>").count();
                println!(
                    "{SUCCESS} Wrote {} URL(s) to {}",
                    style(urls).bold(),
                    style(path.display()).cyan()
                );
            }
            None => print!("{document}"),
        }
        Ok(())
    }
}
