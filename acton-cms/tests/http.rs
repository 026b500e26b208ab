//! Public routes through the axum router

mod common;

use acton_cms::prelude::*;
use acton_cms::web::router;
use axum::http::StatusCode;
use axum_test::TestServer;
use common::{site, Site, NEWS_TYPE};
use serde_json::Value;

fn server(site: &Site) -> TestServer {
    TestServer::new(router(site.state.clone())).unwrap()
}

#[tokio::test]
async fn test_without_theme_pages_fall_back_to_json() {
    let site = site().await;
    let server = server(&site);

    let response = server.get("/about").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["fallback"], true);
    assert_eq!(body["post"]["title"], "Entry about");
    assert_eq!(body["meta"]["url"], "/about");
    assert_eq!(body["site"]["name"], "Acton");
    assert!(body["theme"].is_null());
}

#[tokio::test]
async fn test_listing_and_single_render_with_active_theme() {
    let site = site().await;
    site.activate("flexia").await;
    let server = server(&site);

    let listing = server.get("/news").await;
    listing.assert_status_ok();
    assert_eq!(
        listing.text(),
        "<header>Acton</header><ul><li>Entry update</li><li>Entry launch</li></ul><footer>Flexia</footer>"
    );

    let single = server.get("/news/launch").await;
    single.assert_status_ok();
    let html = single.text();
    assert!(html.starts_with("<header>Acton</header>"));
    assert!(html.contains("<article style=\"color: #336699\">Entry launch</article>"));

    let page = server.get("/about").await;
    assert!(page.text().contains("<article class=\"page\">Entry about</article>"));

    let launch = site
        .state
        .content()
        .find_by_slug_and_type("launch", Some(NEWS_TYPE))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(launch.view_count, 1);
}

#[tokio::test]
async fn test_home_and_pagination() {
    let site = site().await;
    site.activate("flexia").await;
    let server = server(&site);

    let home = server.get("/").await.text();
    assert!(home.contains("<li>Entry update</li><li>Entry launch</li><li>Entry about</li>"));

    let past_end = server.get("/news").add_query_param("page", 2).await.text();
    assert!(past_end.contains("<ul></ul>"));
}

#[tokio::test]
async fn test_missing_and_unpublished_are_not_found() {
    let site = site().await;
    site.activate("flexia").await;
    let server = server(&site);

    for path in ["/news/draft", "/news/nothing", "/nothing", "/about/launch"] {
        let response = server.get(path).expect_failure().await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "not_found", "{path}");
    }
}

#[tokio::test]
async fn test_search_renders_matches() {
    let site = site().await;
    site.activate("flexia").await;
    let server = server(&site);

    let html = server.get("/search").add_query_param("q", "launch").await.text();
    assert!(html.contains("<ul><li>Entry launch</li></ul>"));

    let empty = server.get("/search").await.text();
    assert!(empty.contains("<ul></ul>"));
}

#[tokio::test]
async fn test_sitemap_is_xml() {
    let site = site().await;
    let response = server(&site).get("/sitemap.xml").await;
    response.assert_status_ok();
    let content_type = response.header("content-type");
    assert!(content_type.to_str().unwrap().starts_with("application/xml"));
    assert!(response.text().contains("<loc>https://example.com/news/launch</loc>"));
}

#[tokio::test]
async fn test_health_reports_theme_state() {
    let site = site().await;
    let server = server(&site);

    let degraded: Value = server.get("/health").await.json();
    assert_eq!(degraded["status"], "degraded");
    server.get("/health/ready").await.assert_status_ok();
    server.get("/health/live").await.assert_text("OK");

    site.activate("flexia").await;
    let healthy: Value = server.get("/health").await.json();
    assert_eq!(healthy["status"], "healthy");
    assert_eq!(healthy["components"]["themes"]["message"], "active theme: flexia");
}

#[tokio::test]
async fn test_published_assets_are_served() {
    let site = site().await;
    site.activate("flexia").await;
    site.state.admin().publish_assets(&Site::ops(), "flexia").await.unwrap();

    let css = server(&site).get("/themes/flexia/assets/app.css").await;
    css.assert_status_ok();
    assert_eq!(css.text(), "body { margin: 0 }");
}
