//! Error types and error handling
//!
//! Fallback chains (template resolution, adapter selection) never use these
//! types: a miss there is an `Option::None`. Errors are reserved for store
//! failures, administrative validation and I/O.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or validating a theme manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Manifest file is not valid JSON/TOML for the manifest schema
    #[error("failed to parse manifest {path}: {message}")]
    Parse {
        /// Manifest path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Manifest parsed but violates a schema rule
    #[error("invalid manifest {path}: {reason}")]
    Invalid {
        /// Manifest path
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
}

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored JSON column could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unique constraint or optimistic check failed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend not reachable or not migrated
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row holds a value no current type can represent
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Theme management errors
///
/// Returned as structured failures to administrative callers.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// A theme with this slug is already installed
    #[error("theme '{0}' is already installed")]
    AlreadyInstalled(String),

    /// The theme is active and cannot be removed
    #[error("theme '{0}' is active and cannot be uninstalled")]
    ThemeActive(String),

    /// No installed theme with this slug
    #[error("theme '{0}' is not installed")]
    NotInstalled(String),

    /// No discoverable theme package with this slug
    #[error("theme package '{0}' was not found in the themes root")]
    PackageNotFound(String),

    /// Customizer value rejected by the theme schema
    #[error("invalid customizer value for '{key}': {reason}")]
    InvalidCustomizerValue {
        /// Customizer key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Asset path points outside the theme directory
    #[error("asset path '{0}' escapes the theme directory")]
    UnsafeAssetPath(String),

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum CmsError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Theme management error
    #[error(transparent)]
    Theme(#[from] ThemeError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Forbidden (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not Found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Settings failed validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

impl CmsError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::Theme(ThemeError::NotInstalled(_) | ThemeError::PackageNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidSettings(_)
            | Self::Theme(
                ThemeError::InvalidCustomizerValue { .. }
                | ThemeError::UnsafeAssetPath(_)
                | ThemeError::Manifest(_),
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Theme(ThemeError::AlreadyInstalled(_) | ThemeError::ThemeActive(_)) => {
                StatusCode::CONFLICT
            }
            Self::Config(_)
            | Self::Store(_)
            | Self::Theme(ThemeError::Io(_) | ThemeError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Theme(ThemeError::AlreadyInstalled(_)) => "already_installed",
            Self::Theme(ThemeError::ThemeActive(_)) => "theme_active",
            Self::Theme(ThemeError::NotInstalled(_) | ThemeError::PackageNotFound(_))
            | Self::NotFound(_) => "not_found",
            Self::Theme(_) => "theme",
            Self::Store(_) => "store",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidSettings(_) => "invalid_settings",
        }
    }
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
