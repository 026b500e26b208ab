//! Health check endpoints and handlers
//!
//! - Liveness: is the process running?
//! - Readiness: can the theme and content stores be reached?
//! - Full check: store latency and whether a theme is active
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use acton_cms::health::{health_check, liveness, readiness};
//! use acton_cms::state::CmsState;
//!
//! fn routes(state: CmsState) -> Router {
//!     Router::new()
//!         .route("/health", get(health_check))
//!         .route("/health/live", get(liveness))
//!         .route("/health/ready", get(readiness))
//!         .with_state(state)
//! }
//! ```

use crate::state::CmsState;
use crate::store::{ContentStore, ThemeStore};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Instant, SystemTime};

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving normally
    Healthy,
    /// Serving, but with reduced output (e.g. no active theme)
    Degraded,
    /// Not able to serve
    Unhealthy,
}

/// Individual component health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: HealthStatus,
    /// Optional message with details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ComponentHealth {
    /// Create a healthy component
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: None,
        }
    }

    /// Create a healthy component with message
    #[must_use]
    pub fn healthy_with_message(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: Some(message.into()),
            response_time_ms: None,
        }
    }

    /// Create a degraded component
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            response_time_ms: None,
        }
    }

    /// Create an unhealthy component
    #[must_use]
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            response_time_ms: None,
        }
    }

    /// Add response time
    #[must_use]
    pub const fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall status
    pub status: HealthStatus,
    /// Application version
    pub version: String,
    /// Timestamp of health check (Unix epoch)
    pub timestamp: u64,
    /// Individual component healths
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthCheckResponse {
    /// Create new health check response
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: version.into(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            components: BTreeMap::new(),
        }
    }

    /// Add component health
    pub fn add_component(&mut self, name: impl Into<String>, health: ComponentHealth) {
        self.components.insert(name.into(), health);
        self.recalculate_status();
    }

    fn recalculate_status(&mut self) {
        self.status = if self.components.values().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if self.components.values().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
    }

    /// Get HTTP status code based on health
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.status {
            // Still serving
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HealthCheckResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Theme store reachability plus active theme presence
pub async fn check_themes(state: &CmsState) -> ComponentHealth {
    let started = Instant::now();
    match state.themes().active().await {
        Ok(Some(theme)) => ComponentHealth::healthy_with_message(format!("active theme: {}", theme.slug))
            .with_response_time(elapsed_ms(started)),
        Ok(None) => ComponentHealth::degraded("no active theme; pages are served as JSON")
            .with_response_time(elapsed_ms(started)),
        Err(e) => ComponentHealth::unhealthy(e.to_string()).with_response_time(elapsed_ms(started)),
    }
}

/// Content store reachability
pub async fn check_content(state: &CmsState) -> ComponentHealth {
    let started = Instant::now();
    match state.content().post_types().await {
        Ok(types) => ComponentHealth::healthy_with_message(format!("{} post types", types.len()))
            .with_response_time(elapsed_ms(started)),
        Err(e) => ComponentHealth::unhealthy(e.to_string()).with_response_time(elapsed_ms(started)),
    }
}

/// Run every component check
pub async fn health_check_with_state(state: &CmsState) -> HealthCheckResponse {
    let mut response = HealthCheckResponse::new(env!("CARGO_PKG_VERSION"));
    response.add_component("themes", check_themes(state).await);
    response.add_component("content", check_content(state).await);
    response
}

/// Liveness handler
///
/// Returns 200 OK if the application is running.
#[allow(clippy::unused_async)]
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness handler
///
/// Ready once both stores answer. A missing active theme does not make the
/// site unready.
pub async fn readiness(State(state): State<CmsState>) -> impl IntoResponse {
    let mut response = HealthCheckResponse::new(env!("CARGO_PKG_VERSION"));
    let mut themes = check_themes(&state).await;
    if themes.status == HealthStatus::Degraded {
        themes.status = HealthStatus::Healthy;
    }
    response.add_component("themes", themes);
    response.add_component("content", check_content(&state).await);
    response
}

/// Comprehensive health check handler
pub async fn health_check(State(state): State<CmsState>) -> impl IntoResponse {
    health_check_with_state(&state).await
}
