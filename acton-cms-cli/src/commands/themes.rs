//! Theme management commands

use super::{operator, INFO, SUCCESS};
use acton_cms::config::CmsConfig;
use acton_cms::state::CmsState;
use acton_cms::theme::Theme;
use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Theme management commands
#[derive(Debug, Subcommand)]
pub enum ThemesCommand {
    /// List discovered packages and installed themes
    List,
    /// Install a discovered package
    Install {
        /// Theme slug
        slug: String,
    },
    /// Make an installed theme the active one
    Activate {
        /// Theme slug
        slug: String,
    },
    /// Remove an inactive theme and its published assets
    Uninstall {
        /// Theme slug
        slug: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Copy a theme's assets into the public root
    Publish {
        /// Theme slug
        slug: String,
    },
}

impl ThemesCommand {
    /// Execute the themes command
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be opened or the operation fails.
    pub async fn execute(self, config: CmsConfig) -> Result<()> {
        let state = CmsState::from_config(config).await?;
        match self {
            Self::List => list(&state).await,
            Self::Install { slug } => install(&state, &slug).await,
            Self::Activate { slug } => activate(&state, &slug).await,
            Self::Uninstall { slug, yes } => uninstall(&state, &slug, yes).await,
            Self::Publish { slug } => publish(&state, &slug).await,
        }
    }
}

fn status_label(theme: Option<&Theme>) -> String {
    match theme {
        Some(theme) if theme.is_active => style("active").green().bold().to_string(),
        Some(_) => style("installed").cyan().to_string(),
        None => style("available").dim().to_string(),
    }
}

async fn list(state: &CmsState) -> Result<()> {
    let registry = state.registry();
    let installed: BTreeMap<String, Theme> = registry
        .installed()
        .await?
        .into_iter()
        .map(|theme| (theme.slug.clone(), theme))
        .collect();

    let mut rows: BTreeMap<String, (String, String)> = registry
        .discover_themes()
        .into_iter()
        .map(|manifest| (manifest.slug, (manifest.name, manifest.version)))
        .collect();
    for theme in installed.values() {
        rows.entry(theme.slug.clone())
            .or_insert_with(|| (theme.name.clone(), theme.version.clone()));
    }

    println!(
        "\n{INFO} Themes in {}",
        style(state.config().themes.themes_root.display()).bold()
    );
    println!("{}", "─".repeat(72));
    println!("{:<20} {:<28} {:<10} {:<12}", "Slug", "Name", "Version", "Status");
    println!("{}", "─".repeat(72));

    if rows.is_empty() {
        println!("  {}", style("(No theme packages found)").dim());
    }
    for (slug, (name, version)) in &rows {
        println!(
            "{:<20} {:<28} {:<10} {}",
            slug,
            name,
            version,
            status_label(installed.get(slug))
        );
    }
    println!();
    Ok(())
}

async fn install(state: &CmsState, slug: &str) -> Result<()> {
    let theme = state
        .admin()
        .install_theme(&operator(), slug)
        .await
        .with_context(|| format!("installing theme '{slug}'"))?;
    println!(
        "{SUCCESS} Installed {} {}",
        style(&theme.name).cyan().bold(),
        style(format!("v{}", theme.version)).dim()
    );
    Ok(())
}

async fn activate(state: &CmsState, slug: &str) -> Result<()> {
    let activated = state.admin().activate_theme(&operator(), slug).await?;
    if !activated {
        anyhow::bail!("Theme '{slug}' is not installed. Run `acton-cms themes install {slug}` first.");
    }
    println!("{SUCCESS} {} is now the active theme", style(slug).cyan().bold());
    Ok(())
}

async fn uninstall(state: &CmsState, slug: &str, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Uninstall theme '{slug}' and delete its published assets?"))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("{INFO} Cancelled");
            return Ok(());
        }
    }

    state
        .admin()
        .uninstall_theme(&operator(), slug)
        .await
        .with_context(|| format!("uninstalling theme '{slug}'"))?;
    println!("{SUCCESS} Uninstalled {}", style(slug).cyan().bold());
    Ok(())
}

async fn publish(state: &CmsState, slug: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Failed to set progress style")?,
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_message(format!("Publishing assets for {slug}..."));

    let report = state.admin().publish_assets(&operator(), slug).await;
    spinner.finish_and_clear();
    let report = report.with_context(|| format!("publishing assets for '{slug}'"))?;

    println!(
        "{SUCCESS} Published {} file(s) to {}",
        style(report.copied.len()).bold(),
        style(state.registry().publisher().target_dir(slug).display()).cyan()
    );
    for missing in &report.missing {
        println!("  {} declared asset not found: {missing}", style("!").yellow().bold());
    }
    println!("  fingerprint {}", style(&report.fingerprint).dim());
    Ok(())
}
