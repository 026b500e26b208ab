//! Markup renderer
//!
//! Renders text templates with minijinja. Placeholders read the data
//! contract (`{{ post.title }}`, `{{ theme.settings.accent }}`) and named
//! fragments are pulled in with `{% include "header" %}`.
//!
//! Body lookup for a logical name: an active stored template row with that
//! slug wins over the theme file. Includes resolve the same way, then fall
//! back to the theme's partials and templates; an include that exists
//! nowhere renders as an empty string.
//!
//! Include bodies are read with `tokio::fs` before rendering starts, by
//! following literal `include`, `extends`, `import` and `from` names from the
//! page body outward. The minijinja loader only looks names up in that set,
//! so rendering never touches the filesystem. Names computed at render time
//! are not followed and render empty.

use super::RendererAdapter;
use crate::composer::DataContract;
use crate::store::TemplateStore;
use crate::template::{TemplateRef, TemplateSource};
use crate::theme::{ActiveThemeProvider, Theme, ThemeKind};
use async_trait::async_trait;
use minijinja::{AutoEscape, Environment, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

static LOADED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{%-?\s*(?:include|extends|import|from)\s+["']([^"']+)["']"#)
        .expect("include pattern is valid")
});

/// Upper bound on distinct names followed for one render
const MAX_INCLUDES: usize = 64;

/// Renders markup themes and stored templates
#[derive(Clone)]
pub struct MarkupRenderer {
    provider: Arc<ActiveThemeProvider>,
    templates: Arc<dyn TemplateStore>,
    extensions: Arc<[String]>,
}

impl fmt::Debug for MarkupRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupRenderer")
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl MarkupRenderer {
    /// Create a renderer accepting the given file extensions
    #[must_use]
    pub fn new(
        provider: Arc<ActiveThemeProvider>,
        templates: Arc<dyn TemplateStore>,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            provider,
            templates,
            extensions: extensions.into(),
        }
    }

    fn accepts(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(extension))
    }

    async fn load_body(&self, template: &TemplateRef) -> Option<String> {
        match &template.source {
            TemplateSource::Stored { id } => match self.templates.template(*id).await {
                Ok(Some(row)) => Some(row.content),
                Ok(None) => {
                    tracing::warn!(template_id = id, "stored template does not exist");
                    None
                }
                Err(e) => {
                    tracing::warn!(template_id = id, error = %e, "stored template lookup failed");
                    None
                }
            },
            TemplateSource::Theme { path } => {
                if !template.extension().is_some_and(|ext| self.accepts(ext)) {
                    return None;
                }
                match self.templates.active_template(&template.name).await {
                    Ok(Some(row)) => return Some(row.content),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(template = %template.name, error = %e, "stored override lookup failed");
                    }
                }
                match tokio::fs::read_to_string(path).await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "theme template unreadable");
                        None
                    }
                }
            }
        }
    }

    async fn stored_bodies(&self) -> HashMap<String, String> {
        match self.templates.templates().await {
            Ok(rows) => rows
                .into_iter()
                .filter(|row| row.is_active)
                .map(|row| (row.slug, row.content))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "stored templates unavailable for includes");
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl RendererAdapter for MarkupRenderer {
    fn kind(&self) -> ThemeKind {
        ThemeKind::Markup
    }

    async fn try_render(&self, template: &TemplateRef, contract: &DataContract) -> Option<String> {
        let body = self.load_body(template).await?;
        let theme = self.provider.current();
        let stored = self.stored_bodies().await;
        let env = environment(collect_includes(theme.as_deref(), &stored, &body).await);

        match env.render_str(&body, context(contract)) {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!(template = %template.name, error = %e, "markup render failed");
                None
            }
        }
    }
}

/// Read every body `body` reaches through literal include-like tags
async fn collect_includes(
    theme: Option<&Theme>,
    stored: &HashMap<String, String>,
    body: &str,
) -> HashMap<String, String> {
    let mut found = HashMap::new();
    let mut pending = loaded_names(body);
    while let Some(name) = pending.pop() {
        if found.contains_key(&name) {
            continue;
        }
        if found.len() >= MAX_INCLUDES {
            tracing::warn!(include = %name, "include limit reached, rendering empty");
            break;
        }
        let Some(included) = load_include(theme, stored, &name).await else {
            tracing::debug!(include = %name, "include not found, rendering empty");
            continue;
        };
        pending.extend(loaded_names(&included));
        found.insert(name, included);
    }
    found
}

fn loaded_names(body: &str) -> Vec<String> {
    LOADED_NAME
        .captures_iter(body)
        .map(|captures| captures[1].to_string())
        .collect()
}

async fn load_include(
    theme: Option<&Theme>,
    stored: &HashMap<String, String>,
    name: &str,
) -> Option<String> {
    if let Some(body) = stored.get(name) {
        return Some(body.clone());
    }

    let theme = theme?;
    let ext = &theme.template_extension;
    let candidates = [
        theme.partials.get(name).cloned(),
        theme.templates.get(name).cloned(),
        Some(format!("partials/{name}.{ext}")),
        Some(format!("templates/{name}.{ext}")),
        Some(name.to_string()),
    ];
    for relative in candidates.into_iter().flatten() {
        let Some(path) = theme.resolve_path(&relative) else {
            continue;
        };
        if let Ok(body) = tokio::fs::read_to_string(&path).await {
            return Some(body);
        }
    }
    None
}

fn environment(includes: HashMap<String, String>) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.set_loader(move |name| Ok(Some(includes.get(name).cloned().unwrap_or_default())));
    env
}

/// Render context: the contract's fields at top level, slots as safe markup
fn context(contract: &DataContract) -> Value {
    let mut root: BTreeMap<String, Value> = match serde_json::to_value(contract) {
        Ok(serde_json::Value::Object(fields)) => fields
            .into_iter()
            .map(|(key, value)| (key, Value::from_serialize(&value)))
            .collect(),
        _ => BTreeMap::new(),
    };
    root.remove("slots");
    for (name, html) in &contract.slots {
        root.insert(name.clone(), Value::from_safe_string(html.clone()));
    }
    Value::from_iter(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::{PageMeta, SiteView};
    use crate::model::{Template, TemplateType};
    use crate::store::{MemoryContentStore, MemoryThemeStore, ThemeStore};
    use crate::template::RenderKind;
    use crate::theme::ThemeManifest;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;

    fn contract() -> DataContract {
        DataContract::new(
            SiteView {
                name: "Acton".into(),
                url: "https://example.com".into(),
                description: None,
                locale: "en".into(),
            },
            PageMeta {
                title: "About <us>".into(),
                description: None,
                url: "/about".into(),
                kind: RenderKind::Single,
                query: None,
            },
        )
    }

    async fn renderer(dir: &Path, content: Arc<MemoryContentStore>) -> MarkupRenderer {
        let store = Arc::new(MemoryThemeStore::new());
        let manifest: ThemeManifest = serde_json::from_value(json!({"slug": "flexia"})).unwrap();
        store
            .insert(Theme::from_manifest(&manifest.with_directory(dir.to_path_buf()), None))
            .await
            .unwrap();
        store.activate("flexia").await.unwrap();
        let provider = Arc::new(ActiveThemeProvider::load(store).await.unwrap());
        MarkupRenderer::new(provider, content, vec!["html".into()])
    }

    fn theme_ref(dir: &Path, relative: &str, name: &str) -> TemplateRef {
        TemplateRef {
            name: name.into(),
            source: TemplateSource::Theme {
                path: dir.join(relative),
            },
            theme: Some("flexia".into()),
        }
    }

    fn row(id: i64, slug: &str, content: &str) -> Template {
        Template {
            id,
            name: slug.into(),
            slug: slug.into(),
            template_type: TemplateType::Partial,
            content: content.into(),
            variables: BTreeSet::new(),
            is_default: false,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_renders_with_includes_and_escaping() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(
            dir.path().join("templates/page.html"),
            r#"{% include "header" %}<h1>{{ meta.title }}</h1>{% include "footer" %}"#,
        )
        .unwrap();
        fs::write(dir.path().join("partials/header.html"), "<header>{{ site.name }}</header>").unwrap();

        let renderer = renderer(dir.path(), Arc::new(MemoryContentStore::new())).await;
        let html = renderer
            .try_render(&theme_ref(dir.path(), "templates/page.html", "page"), &contract())
            .await
            .unwrap();

        assert_eq!(html, "<header>Acton</header><h1>About &lt;us&gt;</h1>");
    }

    #[tokio::test]
    async fn test_stored_row_overrides_theme_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("templates/page.html"), "from file").unwrap();

        let content = Arc::new(MemoryContentStore::new());
        content.save_template(row(0, "page", "from row {{ site.name }}")).await.unwrap();

        let renderer = renderer(dir.path(), content).await;
        let html = renderer
            .try_render(&theme_ref(dir.path(), "templates/page.html", "page"), &contract())
            .await
            .unwrap();
        assert_eq!(html, "from row Acton");
    }

    #[tokio::test]
    async fn test_declines_foreign_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Pages")).unwrap();
        fs::write(dir.path().join("Pages/Page.tsx"), "export default 1").unwrap();

        let renderer = renderer(dir.path(), Arc::new(MemoryContentStore::new())).await;
        assert!(renderer
            .try_render(&theme_ref(dir.path(), "Pages/Page.tsx", "page"), &contract())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_stored_reference_and_slots() {
        let dir = tempfile::tempdir().unwrap();
        let content = Arc::new(MemoryContentStore::new());
        let saved = content
            .save_template(row(0, "layout", "<main>{{ content }}</main>"))
            .await
            .unwrap();

        let renderer = renderer(dir.path(), content).await;
        let layout = TemplateRef {
            name: "layout".into(),
            source: TemplateSource::Stored { id: saved.id },
            theme: None,
        };
        let html = renderer
            .try_render(&layout, &contract().with_slot("content", "<p>Hi</p>".into()))
            .await
            .unwrap();
        assert_eq!(html, "<main><p>Hi</p></main>");
    }

    #[tokio::test]
    async fn test_render_error_is_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("templates/page.html"), "{% if %}").unwrap();

        let renderer = renderer(dir.path(), Arc::new(MemoryContentStore::new())).await;
        assert!(renderer
            .try_render(&theme_ref(dir.path(), "templates/page.html", "page"), &contract())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_nested_includes_are_read_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::create_dir_all(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("templates/page.html"), r#"{% include "header" %}|{% include 'ghost' %}"#).unwrap();
        fs::write(dir.path().join("partials/header.html"), r#"<header>{%- include "brand" -%}</header>"#).unwrap();
        fs::write(dir.path().join("partials/brand.html"), "{{ site.name }}").unwrap();

        let theme = Theme::from_manifest(
            &serde_json::from_value::<ThemeManifest>(json!({"slug": "flexia"}))
                .unwrap()
                .with_directory(dir.path().to_path_buf()),
            None,
        );
        let body = fs::read_to_string(dir.path().join("templates/page.html")).unwrap();
        let includes = collect_includes(Some(&theme), &HashMap::new(), &body).await;
        let mut names: Vec<_> = includes.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["brand", "header"]);

        // Files removed after collection no longer matter to the render
        fs::remove_dir_all(dir.path().join("partials")).unwrap();
        let html = environment(includes).render_str(&body, context(&contract())).unwrap();
        assert_eq!(html, "<header>Acton</header>|");
    }

    #[tokio::test]
    async fn test_self_including_partial_terminates() {
        let mut stored = HashMap::new();
        stored.insert("loop".to_string(), r#"{% include "loop" %}"#.to_string());
        let includes = collect_includes(None, &stored, r#"{% include "loop" %}"#).await;
        assert_eq!(includes.len(), 1);
    }
}
