//! Page composition
//!
//! Builds the data contract for a request, resolves the template, asks the
//! renderer adapters in order (the active theme's declared kind first, the
//! other kind last) and assembles the page:
//!
//! ```text
//! layout(header, content, footer)
//! ```
//!
//! `header`, `footer` and `layout` are partials resolved by name. A missing
//! fragment renders empty; a missing layout concatenates the fragments.
//! When nothing can render the request the caller gets the contract back
//! and serves the plain JSON view.

mod contract;

pub use contract::{DataContract, PageMeta, PaginationView, SiteView, ThemeView};

use crate::model::{content_path, Content, Page, PostType};
use crate::render::{ordered_for, Renderer, RendererAdapter};
use crate::store::ContentStore;
use crate::template::{RenderKind, RenderRequest, TemplateRef, TemplateResolver};
use crate::theme::{Theme, ThemeKind};
use std::fmt;
use std::sync::Arc;

/// A page the active theme rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final markup
    pub html: String,
    /// Template that rendered the content
    pub template: TemplateRef,
    /// Adapter kind that rendered it
    pub renderer: ThemeKind,
}

/// Outcome of a composition
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    /// Theme output
    Rendered(RenderedPage),
    /// Nothing could render; serve the contract directly
    Unrendered(DataContract),
}

impl PageResult {
    /// Rendered markup, if any
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Rendered(page) => Some(&page.html),
            Self::Unrendered(_) => None,
        }
    }

    /// Whether the theme rendered the page
    #[must_use]
    pub const fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

/// Caller-supplied listing title and description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOverrides {
    /// Page title
    pub title: Option<String>,
    /// Meta description
    pub description: Option<String>,
}

/// Composes pages from content, theme and adapters
#[derive(Clone)]
pub struct PageComposer {
    content: Arc<dyn ContentStore>,
    resolver: TemplateResolver,
    renderers: Arc<[Renderer]>,
    site: SiteView,
}

impl fmt::Debug for PageComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageComposer")
            .field("resolver", &self.resolver)
            .field("renderers", &self.renderers)
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}

impl PageComposer {
    /// Create a composer
    #[must_use]
    pub fn new(
        content: Arc<dyn ContentStore>,
        resolver: TemplateResolver,
        renderers: Vec<Renderer>,
        site: SiteView,
    ) -> Self {
        Self {
            content,
            resolver,
            renderers: renderers.into(),
            site,
        }
    }

    /// Template resolver
    #[must_use]
    pub const fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Render one entry
    ///
    /// Increments the entry's view count once, whether or not the theme
    /// renders it.
    pub async fn render_single(&self, content: &Content, post_type: &PostType) -> PageResult {
        let theme = self.resolver.provider().current();

        let mut post = content.clone();
        match self.content.increment_view_count(content.id).await {
            Ok(count) => post.view_count = count,
            Err(e) => tracing::warn!(content_id = content.id, error = %e, "view count not recorded"),
        }

        let terms = self.content.terms_for(content.id).await.unwrap_or_else(|e| {
            tracing::warn!(content_id = content.id, error = %e, "terms unavailable");
            Vec::new()
        });

        let url = content_path(post_type.route_prefix.as_deref(), &content.slug)
            .unwrap_or_else(|_| post_type.archive_path());
        let meta = PageMeta {
            title: content.meta_title.clone().unwrap_or_else(|| content.title.clone()),
            description: content
                .meta_description
                .clone()
                .or_else(|| content.excerpt.clone()),
            url,
            kind: RenderKind::Single,
            query: None,
        };

        let mut contract = self.base_contract(meta, theme.as_deref()).await;
        contract.post = Some(post);
        contract.post_type = Some(post_type.clone());
        contract.terms = terms;

        let request = RenderRequest::single(post_type).with_hint(content.template_hint());
        self.render(&request, theme.as_deref(), contract).await
    }

    /// Render a paginated listing
    ///
    /// With a post type this is that type's archive, otherwise the site
    /// index.
    pub async fn render_index(
        &self,
        page: Page<Content>,
        post_type: Option<&PostType>,
        overrides: IndexOverrides,
    ) -> PageResult {
        let theme = self.resolver.provider().current();
        let meta = PageMeta {
            title: overrides.title.unwrap_or_else(|| {
                post_type.map_or_else(|| self.site.name.clone(), |pt| pt.name.clone())
            }),
            description: overrides.description.or_else(|| self.site.description.clone()),
            url: post_type.map_or_else(|| "/".to_string(), PostType::archive_path),
            kind: if post_type.is_some() {
                RenderKind::Archive
            } else {
                RenderKind::Index
            },
            query: None,
        };

        let mut contract = self.base_contract(meta, theme.as_deref()).await;
        contract.pagination = Some(PaginationView::from(&page));
        contract.posts = page.items;
        contract.post_type = post_type.cloned();

        let request = match post_type {
            Some(pt) => RenderRequest::archive(pt),
            None => RenderRequest::index(None),
        };
        self.render(&request, theme.as_deref(), contract).await
    }

    /// Render search results
    pub async fn render_search(&self, query: &str, page: Page<Content>) -> PageResult {
        let theme = self.resolver.provider().current();
        let meta = PageMeta {
            title: format!("Search: {query}"),
            description: self.site.description.clone(),
            url: "/search".to_string(),
            kind: RenderKind::Search,
            query: Some(query.to_string()),
        };

        let mut contract = self.base_contract(meta, theme.as_deref()).await;
        contract.pagination = Some(PaginationView::from(&page));
        contract.posts = page.items;

        self.render(&RenderRequest::search(), theme.as_deref(), contract).await
    }

    async fn base_contract(&self, meta: PageMeta, theme: Option<&Theme>) -> DataContract {
        let menus = self.content.menus().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "menus unavailable");
            Vec::new()
        });
        DataContract::new(self.site.clone(), meta)
            .with_theme(theme)
            .with_menus(menus)
    }

    async fn render(
        &self,
        request: &RenderRequest<'_>,
        theme: Option<&Theme>,
        contract: DataContract,
    ) -> PageResult {
        let Some(theme) = theme else {
            tracing::debug!(kind = %request.kind, "no active theme");
            return PageResult::Unrendered(contract);
        };
        let Some(template) = self.resolver.resolve(request) else {
            return PageResult::Unrendered(contract);
        };

        for renderer in ordered_for(&self.renderers, theme.kind) {
            if let Some(body) = renderer.try_render(&template, &contract).await {
                let html = self.compose(renderer, &template, &contract, body).await;
                return PageResult::Rendered(RenderedPage {
                    html,
                    template,
                    renderer: renderer.kind(),
                });
            }
        }

        tracing::debug!(template = %template.name, "no adapter rendered the template");
        PageResult::Unrendered(contract)
    }

    async fn compose(
        &self,
        renderer: &Renderer,
        template: &TemplateRef,
        contract: &DataContract,
        body: String,
    ) -> String {
        let header = self.render_partial("header", contract).await.unwrap_or_default();
        let footer = self.render_partial("footer", contract).await.unwrap_or_default();

        let slotted = contract
            .with_slot("header", header.clone())
            .with_slot("content", body.clone())
            .with_slot("footer", footer.clone());
        let page = match self.render_partial("layout", &slotted).await {
            Some(page) => page,
            None => format!("{header}{body}{footer}"),
        };

        renderer.finalize(page, template, contract)
    }

    async fn render_partial(&self, name: &str, contract: &DataContract) -> Option<String> {
        let partial = self.resolver.resolve_partial(name).await?;
        let declared = self
            .resolver
            .provider()
            .current()
            .map_or(ThemeKind::Markup, |theme| theme.kind);
        for renderer in ordered_for(&self.renderers, declared) {
            if let Some(html) = renderer.try_render(&partial, contract).await {
                return Some(html);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentStatus, Pagination};
    use crate::render::{ComponentRegistry, ComponentRenderer, MarkupRenderer};
    use crate::store::{MemoryContentStore, MemoryThemeStore, ThemeStore};
    use crate::theme::{ActiveThemeProvider, ThemeManifest};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;

    fn news() -> PostType {
        PostType {
            id: 1,
            name: "News".into(),
            slug: "news".into(),
            route_prefix: Some("news".into()),
            is_hierarchical: false,
            is_public: true,
            single_template_ref: None,
            archive_template_ref: None,
            supports: BTreeSet::new(),
        }
    }

    fn entry(id: i64, slug: &str) -> Content {
        Content {
            id,
            post_type_id: 1,
            title: format!("Entry {id}"),
            slug: slug.into(),
            status: ContentStatus::Published,
            published_at: Some(Utc::now() - Duration::hours(id)),
            updated_at: None,
            content: String::new(),
            excerpt: None,
            featured_image: None,
            meta_title: None,
            meta_description: None,
            view_count: 0,
            parent_id: None,
            meta_data: serde_json::Map::new(),
        }
    }

    fn write(dir: &Path, relative: &str, body: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn site() -> SiteView {
        SiteView {
            name: "Acton".into(),
            url: "https://example.com".into(),
            description: None,
            locale: "en".into(),
        }
    }

    async fn composer(
        dir: Option<&Path>,
        manifest: Value,
        content: Arc<MemoryContentStore>,
        components: Arc<ComponentRegistry>,
    ) -> PageComposer {
        let themes = Arc::new(MemoryThemeStore::new());
        if let Some(dir) = dir {
            let manifest: ThemeManifest = serde_json::from_value(manifest).unwrap();
            themes
                .insert(Theme::from_manifest(&manifest.with_directory(dir.to_path_buf()), None))
                .await
                .unwrap();
            themes.activate("flexia").await.unwrap();
        }
        let provider = Arc::new(ActiveThemeProvider::load(themes).await.unwrap());
        let resolver = TemplateResolver::new(provider.clone(), content.clone());
        let renderers = vec![
            Renderer::Markup(MarkupRenderer::new(provider.clone(), content.clone(), vec!["html".into()])),
            Renderer::Component(ComponentRenderer::new(provider, components)),
        ];
        PageComposer::new(content, resolver, renderers, site())
    }

    #[tokio::test]
    async fn test_listing_without_layout_concatenates_fragments() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/posts.html", "{% for p in posts %}[{{ p.title }}]{% endfor %}");
        write(dir.path(), "partials/header.html", "<header>{{ meta.title }}</header>");

        let composer = composer(
            Some(dir.path()),
            json!({"slug": "flexia"}),
            Arc::new(MemoryContentStore::new()),
            Arc::new(ComponentRegistry::new()),
        )
        .await;
        let page = Page::from_all(vec![entry(1, "a"), entry(2, "b")], Pagination::new(1, 10));
        let result = composer.render_index(page, Some(&news()), IndexOverrides::default()).await;

        assert_eq!(result.html(), Some("<header>News</header>[Entry 1][Entry 2]"));
    }

    #[tokio::test]
    async fn test_layout_receives_slots() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/single.html", "<article>{{ post.title }}</article>");
        write(dir.path(), "partials/header.html", "<h>");
        write(dir.path(), "partials/footer.html", "<f>");
        write(dir.path(), "partials/layout.html", "<body>{{ header }}{{ content }}{{ footer }}</body>");

        let content = Arc::new(MemoryContentStore::new());
        content.put_content(entry(1, "hello"));
        let composer = composer(
            Some(dir.path()),
            json!({"slug": "flexia"}),
            content,
            Arc::new(ComponentRegistry::new()),
        )
        .await;

        let result = composer.render_single(&entry(1, "hello"), &news()).await;
        let PageResult::Rendered(page) = result else {
            panic!("expected rendered page");
        };
        assert_eq!(page.html, "<body><h><article>Entry 1</article><f></body>");
        assert_eq!(page.renderer, ThemeKind::Markup);
        assert!(page.template.path().unwrap().ends_with("templates/single.html"));
    }

    #[tokio::test]
    async fn test_no_theme_returns_contract_and_counts_view() {
        let content = Arc::new(MemoryContentStore::new());
        content.put_content(entry(1, "hello"));
        let composer =
            composer(None, Value::Null, content.clone(), Arc::new(ComponentRegistry::new())).await;

        let result = composer.render_single(&entry(1, "hello"), &news()).await;
        let PageResult::Unrendered(contract) = result else {
            panic!("expected contract");
        };
        assert!(contract.theme.is_none());
        assert_eq!(contract.post.unwrap().view_count, 1);
        assert_eq!(contract.meta.url, "/news/hello");

        composer.render_single(&entry(1, "hello"), &news()).await;
        assert_eq!(content.increment_view_count(1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_component_theme_falls_back_to_markup_adapter() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/posts.html", "markup listing");

        let composer = composer(
            Some(dir.path()),
            json!({"slug": "flexia", "type": "component", "templates": {"posts": "templates/posts.html"}}),
            Arc::new(MemoryContentStore::new()),
            Arc::new(ComponentRegistry::new()),
        )
        .await;
        let result = composer
            .render_index(Page::from_all(Vec::new(), Pagination::new(1, 10)), None, IndexOverrides::default())
            .await;
        let PageResult::Rendered(page) = result else {
            panic!("expected rendered page");
        };
        assert_eq!(page.renderer, ThemeKind::Markup);
        assert_eq!(page.html, "markup listing");
    }

    #[tokio::test]
    async fn test_component_page_wrapped_in_envelope() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "templates/posts.tsx", "export default 1");

        let components = Arc::new(ComponentRegistry::new());
        components.register("flexia", "templates/posts", |props: &Value| -> anyhow::Result<String> {
            Ok(format!("<ul>{}</ul>", props["posts"].as_array().map_or(0, Vec::len)))
        });
        let composer = composer(
            Some(dir.path()),
            json!({"slug": "flexia", "type": "component"}),
            Arc::new(MemoryContentStore::new()),
            components,
        )
        .await;

        let page = Page::from_all(vec![entry(1, "a")], Pagination::new(1, 10));
        let result = composer.render_search("entry", page).await;
        let html = result.html().unwrap();
        assert!(html.starts_with(r#"<div id="app" data-page=""#));
        assert!(html.ends_with("<ul>1</ul></div>"));
    }

    #[tokio::test]
    async fn test_index_overrides_and_total_miss() {
        let dir = tempfile::tempdir().unwrap();
        let composer = composer(
            Some(dir.path()),
            json!({"slug": "flexia"}),
            Arc::new(MemoryContentStore::new()),
            Arc::new(ComponentRegistry::new()),
        )
        .await;
        let overrides = IndexOverrides {
            title: Some("Latest".into()),
            description: Some("Fresh".into()),
        };
        let result = composer
            .render_index(Page::from_all(Vec::new(), Pagination::new(1, 10)), None, overrides)
            .await;
        let PageResult::Unrendered(contract) = result else {
            panic!("expected contract");
        };
        assert_eq!(contract.meta.title, "Latest");
        assert_eq!(contract.meta.description.as_deref(), Some("Fresh"));
        assert_eq!(contract.meta.kind, RenderKind::Index);
        assert!(contract.theme.is_some());
    }
}
