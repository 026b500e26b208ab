//! Shared fixtures for integration tests
#![allow(dead_code)]

use acton_cms::prelude::*;
use acton_cms::store::{ContentSeed, MemoryContentStore};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const PAGE_TYPE: i64 = 1;
pub const NEWS_TYPE: i64 = 2;

/// A site on disk with seeded content
pub struct Site {
    pub dir: TempDir,
    pub state: CmsState,
    pub content: Arc<MemoryContentStore>,
}

impl Site {
    pub fn ops() -> Actor {
        Actor::new(1, "ops")
    }

    pub async fn activate(&self, slug: &str) {
        let admin = self.state.admin();
        admin.install_theme(&Self::ops(), slug).await.unwrap();
        assert!(admin.activate_theme(&Self::ops(), slug).await.unwrap());
    }

    pub fn themes_root(&self) -> std::path::PathBuf {
        self.dir.path().join("themes")
    }

    pub fn public_root(&self) -> std::path::PathBuf {
        self.dir.path().join("public")
    }
}

pub fn post_type(id: i64, slug: &str, prefix: Option<&str>) -> PostType {
    PostType {
        id,
        name: slug[..1].to_uppercase() + &slug[1..],
        slug: slug.into(),
        route_prefix: prefix.map(String::from),
        is_hierarchical: false,
        is_public: true,
        single_template_ref: None,
        archive_template_ref: None,
        supports: BTreeSet::new(),
    }
}

pub fn entry(id: i64, post_type_id: i64, slug: &str, age_hours: i64) -> Content {
    Content {
        id,
        post_type_id,
        title: format!("Entry {slug}"),
        slug: slug.into(),
        status: ContentStatus::Published,
        published_at: Some(Utc::now() - Duration::hours(age_hours)),
        updated_at: None,
        content: format!("<p>{slug}</p>"),
        excerpt: None,
        featured_image: None,
        meta_title: None,
        meta_description: None,
        view_count: 0,
        parent_id: None,
        meta_data: serde_json::Map::new(),
    }
}

pub fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// Markup theme with no explicit mapping for "news"
pub fn flexia_package(themes_root: &Path) {
    let dir = themes_root.join("flexia");
    let manifest = serde_json::json!({
        "slug": "flexia",
        "name": "Flexia",
        "version": "1.2.0",
        "assets": {"css": ["assets/app.css"]},
        "customizer": {
            "accent": {"type": "color", "default": "#336699"}
        },
        "supports": ["menus"]
    });
    write(&dir, "theme.json", &manifest.to_string());
    write(&dir, "templates/page.html", "<article class=\"page\">{{ post.title }}</article>");
    write(
        &dir,
        "templates/posts.html",
        "<ul>{% for p in posts %}<li>{{ p.title }}</li>{% endfor %}</ul>",
    );
    write(&dir, "templates/post.html", "<article style=\"color: {{ theme.settings.accent }}\">{{ post.title }}</article>");
    write(&dir, "partials/header.html", "<header>{{ site.name }}</header>");
    write(&dir, "partials/footer.html", "<footer>{{ theme.name }}</footer>");
    write(&dir, "assets/app.css", "body { margin: 0 }");
}

/// Second markup theme with different output
pub fn classic_package(themes_root: &Path) {
    let dir = themes_root.join("classic");
    write(&dir, "theme.json", r#"{"slug": "classic", "name": "Classic"}"#);
    write(&dir, "templates/index.html", "classic {{ posts | length }}");
    write(&dir, "templates/page.html", "classic page {{ post.title }}");
}

pub fn seed() -> ContentSeed {
    let mut draft = entry(5, NEWS_TYPE, "draft", 1);
    draft.status = ContentStatus::Draft;
    ContentSeed {
        post_types: vec![post_type(PAGE_TYPE, "page", Some("/")), post_type(NEWS_TYPE, "news", Some("news"))],
        content: vec![
            entry(1, PAGE_TYPE, "about", 48),
            entry(2, NEWS_TYPE, "launch", 24),
            entry(3, NEWS_TYPE, "update", 2),
            draft,
        ],
        ..ContentSeed::default()
    }
}

pub fn config(root: &Path) -> CmsConfig {
    let mut config = CmsConfig::default();
    config.site.name = "Acton".into();
    config.site.base_url = "https://example.com".into();
    config.themes.themes_root = root.join("themes");
    config.themes.public_root = root.join("public");
    config
}

/// Site with flexia and classic packages on disk, nothing installed
pub async fn site() -> Site {
    let dir = tempfile::tempdir().unwrap();
    flexia_package(&dir.path().join("themes"));
    classic_package(&dir.path().join("themes"));

    let content = Arc::new(MemoryContentStore::seeded(seed()));
    let state = CmsState::assemble(
        config(dir.path()),
        Backends::in_memory(content.clone()),
        Arc::new(ComponentRegistry::new()),
    )
    .await
    .unwrap();
    Site { dir, state, content }
}

pub fn as_json(result: &PageResult) -> Option<Value> {
    match result {
        PageResult::Unrendered(contract) => Some(serde_json::to_value(contract).unwrap()),
        PageResult::Rendered(_) => None,
    }
}
