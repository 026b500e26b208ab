//! CLI command implementations

pub mod serve;
pub mod sitemap;
pub mod themes;

pub use serve::ServeCommand;
pub use sitemap::SitemapCommand;
pub use themes::ThemesCommand;

use acton_cms::auth::Actor;
use console::Emoji;

pub static SUCCESS: Emoji = Emoji("✓", "√");
pub static INFO: Emoji = Emoji("ℹ", "i");

/// Identity used for administrative operations run from the shell
pub fn operator() -> Actor {
    Actor::new(0, "cli")
}
