//! Sitemap document over seeded content

mod common;

use acton_cms::prelude::*;
use common::{entry, post_type, site, Site, NEWS_TYPE, PAGE_TYPE};
use std::collections::BTreeSet;
use std::time::Duration;

fn locs(document: &str) -> Vec<&str> {
    document
        .lines()
        .filter_map(|line| line.trim().strip_prefix("<loc>")?.strip_suffix("</loc>"))
        .collect()
}

#[tokio::test]
async fn test_document_lists_root_pages_then_posts() {
    let site = site().await;
    let document = site.state.sitemap().build_document().await;

    assert!(document.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert_eq!(
        locs(&document),
        vec![
            "https://example.com/",
            "https://example.com/about",
            "https://example.com/news/update",
            "https://example.com/news/launch",
        ]
    );
    assert!(!document.contains("draft"));
}

#[tokio::test]
async fn test_settings_restrict_post_types() {
    let site = site().await;
    let ops = Site::ops();
    let mut settings = site.state.sitemap().settings().await;
    settings.included_post_type_ids = Some(BTreeSet::from([NEWS_TYPE]));
    site.state.admin().save_sitemap_settings(&ops, settings).await.unwrap();

    let document = site.state.sitemap().build_document().await;
    assert_eq!(
        locs(&document),
        vec![
            "https://example.com/",
            "https://example.com/news/update",
            "https://example.com/news/launch",
        ]
    );

    let mut bad = site.state.sitemap().settings().await;
    bad.cache_ttl_seconds = 30;
    let err = site.state.admin().save_sitemap_settings(&ops, bad).await.unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_post_type_change_invalidates_document() {
    let site = site().await;
    let before = site.state.sitemap().build_document().await;
    assert!(before.contains("/news/launch"));

    let renamed = post_type(NEWS_TYPE, "news", Some("updates"));
    site.state.admin().save_post_type(&Site::ops(), renamed).await.unwrap();

    let after = site.state.sitemap().build_document().await;
    assert!(after.contains("https://example.com/updates/launch"));
    assert!(!after.contains("/news/"));
}

#[tokio::test(start_paused = true)]
async fn test_cached_document_expires_after_ttl() {
    let site = site().await;
    let ops = Site::ops();
    let mut settings = site.state.sitemap().settings().await;
    settings.cache_ttl_seconds = 120;
    site.state.admin().save_sitemap_settings(&ops, settings).await.unwrap();

    let first = site.state.sitemap().build_document().await;
    site.content.put_content(entry(9, PAGE_TYPE, "contact", 1));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(site.state.sitemap().build_document().await, first);

    tokio::time::advance(Duration::from_secs(61)).await;
    let refreshed = site.state.sitemap().build_document().await;
    assert!(refreshed.contains("https://example.com/contact"));

    let stamped = site.state.sitemap().settings().await;
    assert!(stamped.last_generated_at.is_some());
}

#[tokio::test]
async fn test_regenerate_ignores_cache() {
    let site = site().await;
    let first = site.state.sitemap().build_document().await;
    site.content.put_content(entry(9, PAGE_TYPE, "contact", 1));
    assert_eq!(site.state.sitemap().build_document().await, first);

    let regenerated = site.state.admin().regenerate_sitemap(&Site::ops()).await.unwrap();
    assert!(regenerated.contains("/contact"));
    assert_eq!(site.state.sitemap().build_document().await, regenerated);
}
