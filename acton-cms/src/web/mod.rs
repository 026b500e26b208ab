//! Public HTTP surface
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /` | site index |
//! | `GET /{slug}` | root page, else post type listing |
//! | `GET /{prefix}/{slug}` | single entry |
//! | `GET /search?q=` | search results |
//! | `GET /sitemap.xml` | sitemap document |
//! | `GET /health`, `/health/live`, `/health/ready` | health checks |
//! | `GET /themes/...` | published theme assets |
//!
//! Listings accept `?page=N`. Rendered pages are HTML; when nothing renders
//! the page contract is returned as JSON with `"fallback": true` and a 200.
//! Missing or unpublished content is a JSON 404.

use crate::composer::{DataContract, IndexOverrides, PageResult};
use crate::error::{CmsError, StoreError};
use crate::health::{health_check, liveness, readiness};
use crate::model::{Content, Pagination};
use crate::state::CmsState;
use crate::store::ContentStore;
use crate::theme::ActiveThemeProvider;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

/// Query string accepted by listing routes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// 1-based page number
    pub page: Option<u32>,
    /// Search terms
    pub q: Option<String>,
}

impl ListQuery {
    fn pagination(&self, per_page: u32) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), per_page)
    }
}

/// Build the public router
pub fn router(state: CmsState) -> Router {
    let assets = ServeDir::new(state.config().themes.public_root.join("themes"));
    Router::new()
        .route("/", get(home))
        .route("/search", get(search))
        .route("/sitemap.xml", get(sitemap))
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/{slug}", get(page_or_listing))
        .route("/{prefix}/{slug}", get(single))
        .nest_service("/themes", assets)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
///
/// While serving, the active theme row is polled every
/// `server.theme_poll_seconds` so activations made by the CLI against the
/// same database take effect without a restart.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: CmsState) -> anyhow::Result<()> {
    let address = state.config().bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let watcher = state
        .config()
        .server
        .theme_poll_interval()
        .map(|every| watch_active_theme(state.provider().clone(), every));
    tracing::info!(%address, "listening");
    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await;
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    served?;
    Ok(())
}

/// Re-read the active theme on an interval until the task is aborted
///
/// Store errors are logged and the held theme is kept.
pub fn watch_active_theme(provider: Arc<ActiveThemeProvider>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            if let Err(e) = provider.sync().await {
                tracing::warn!(error = %e, "active theme poll failed");
            }
        }
    })
}

async fn home(
    State(state): State<CmsState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, CmsError> {
    let pagination = query.pagination(state.config().site.per_page);
    let page = state.content().published_content(None, pagination).await?;
    respond(
        state
            .composer()
            .render_index(page, None, IndexOverrides::default())
            .await,
    )
}

async fn page_or_listing(
    State(state): State<CmsState>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, CmsError> {
    let content = state.content();

    if let Some(entry) = content
        .find_by_slug_and_type(&slug, None)
        .await?
        .filter(Content::is_visible)
    {
        if let Some(post_type) = content
            .post_type(entry.post_type_id)
            .await?
            .filter(|pt| pt.is_public)
        {
            return respond(state.composer().render_single(&entry, &post_type).await);
        }
    }

    let post_type = content
        .find_post_type(&slug)
        .await?
        .filter(|pt| pt.is_public && !pt.is_page_like())
        .ok_or_else(|| CmsError::NotFound(format!("/{slug}")))?;

    let pagination = query.pagination(state.config().site.per_page);
    let page = content.published_content(Some(post_type.id), pagination).await?;
    respond(
        state
            .composer()
            .render_index(page, Some(&post_type), IndexOverrides::default())
            .await,
    )
}

async fn single(
    State(state): State<CmsState>,
    Path((prefix, slug)): Path<(String, String)>,
) -> Result<Response, CmsError> {
    let content = state.content();
    let not_found = || CmsError::NotFound(format!("/{prefix}/{slug}"));

    let post_type = content
        .find_post_type(&prefix)
        .await?
        .filter(|pt| pt.is_public && !pt.is_page_like())
        .ok_or_else(not_found)?;
    let entry = content
        .find_by_slug_and_type(&slug, Some(post_type.id))
        .await?
        .filter(Content::is_visible)
        .ok_or_else(not_found)?;

    respond(state.composer().render_single(&entry, &post_type).await)
}

async fn search(
    State(state): State<CmsState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, CmsError> {
    let terms = query.q.as_deref().unwrap_or_default().trim().to_string();
    let pagination = query.pagination(state.config().site.per_page);
    let page = state.content().search(&terms, pagination).await?;
    respond(state.composer().render_search(&terms, page).await)
}

async fn sitemap(State(state): State<CmsState>) -> Response {
    let document = state.sitemap().build_document().await;
    (
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        document,
    )
        .into_response()
}

fn respond(result: PageResult) -> Result<Response, CmsError> {
    match result {
        PageResult::Rendered(page) => Ok(Html(page.html).into_response()),
        PageResult::Unrendered(contract) => fallback_view(&contract),
    }
}

fn fallback_view(contract: &DataContract) -> Result<Response, CmsError> {
    let mut body = match serde_json::to_value(contract).map_err(StoreError::from)? {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    body.insert("fallback".to_string(), Value::Bool(true));
    Ok(Json(Value::Object(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CmsConfig;
    use crate::model::{ContentStatus, PostType};
    use crate::render::ComponentRegistry;
    use crate::state::Backends;
    use crate::store::{ContentSeed, MemoryContentStore};
    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use crate::store::{MemoryThemeStore, ThemeStore};
    use crate::theme::{Theme, ThemeManifest};
    use std::collections::BTreeSet;
    use tower::ServiceExt;

    async fn app() -> Router {
        let post_type = PostType {
            id: 1,
            name: "Pages".into(),
            slug: "page".into(),
            route_prefix: Some("/".into()),
            is_hierarchical: true,
            is_public: true,
            single_template_ref: None,
            archive_template_ref: None,
            supports: BTreeSet::new(),
        };
        let about = Content {
            id: 1,
            post_type_id: 1,
            title: "About".into(),
            slug: "about".into(),
            status: ContentStatus::Published,
            published_at: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
            updated_at: None,
            content: String::new(),
            excerpt: None,
            featured_image: None,
            meta_title: None,
            meta_description: None,
            view_count: 0,
            parent_id: None,
            meta_data: Map::new(),
        };
        let seed = ContentSeed {
            post_types: vec![post_type],
            content: vec![about],
            ..ContentSeed::default()
        };
        let state = CmsState::assemble(
            CmsConfig::default(),
            Backends::in_memory(Arc::new(MemoryContentStore::seeded(seed))),
            Arc::new(ComponentRegistry::new()),
        )
        .await
        .unwrap();
        router(state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root_page_without_theme_is_fallback_json() {
        let (status, body) = get(app().await, "/about").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["post"]["slug"], "about");
        assert_eq!(body["meta"]["kind"], "single");
    }

    #[tokio::test]
    async fn test_page_type_has_no_listing() {
        let (status, body) = get(app().await, "/page").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[test]
    fn test_pagination_defaults_to_first_page() {
        let query = ListQuery::default();
        assert_eq!(query.pagination(10), Pagination::new(1, 10));
        let query = ListQuery {
            page: Some(0),
            q: None,
        };
        assert_eq!(query.pagination(5).page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_picks_up_activation_from_another_writer() {
        let store = Arc::new(MemoryThemeStore::new());
        for slug in ["flexia", "classic"] {
            let manifest: ThemeManifest = serde_json::from_value(serde_json::json!({ "slug": slug })).unwrap();
            store.insert(Theme::from_manifest(&manifest, None)).await.unwrap();
        }
        store.activate("flexia").await.unwrap();
        let provider = Arc::new(ActiveThemeProvider::load(store.clone()).await.unwrap());

        let watcher = watch_active_theme(provider.clone(), Duration::from_secs(5));
        store.activate("classic").await.unwrap();
        assert_eq!(provider.current_slug().as_deref(), Some("flexia"));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(provider.current_slug().as_deref(), Some("classic"));
        watcher.abort();
    }
}
