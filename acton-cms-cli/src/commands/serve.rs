//! Public server command

use acton_cms::config::CmsConfig;
use acton_cms::state::CmsState;
use anyhow::Result;
use clap::Args;
use console::style;

/// Run the public HTTP server until Ctrl-C
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Override the configured port
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    /// Execute the serve command
    ///
    /// # Errors
    ///
    /// Returns an error if logging cannot be initialized, the site cannot be
    /// opened, or the server fails.
    pub async fn execute(self, mut config: CmsConfig) -> Result<()> {
        acton_cms::observability::init()?;
        if let Some(port) = self.port {
            config.server.port = port;
        }

        println!(
            "{} {} on {}",
            style("Serving").green().bold(),
            style(&config.site.name).bold(),
            style(format!("http://{}", config.bind_address())).cyan()
        );
        let state = CmsState::from_config(config).await?;
        acton_cms::web::serve(state).await
    }
}
