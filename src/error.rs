//! Error types shared by the navigation, extraction and strategy layers.

use thiserror::Error;

/// Failures reported by a [`PageContext`](crate::page::PageContext) backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PageError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("page backend error: {0}")]
    Backend(String),
}

/// Site profile loading and validation errors.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("page '{0}' is declared more than once")]
    DuplicatePage(String),

    #[error("element '{element}' is declared more than once on page '{page}'")]
    DuplicateElement { page: String, element: String },

    #[error("action on page '{page}' refers to undeclared element '{element}'")]
    UnknownElement { page: String, element: String },

    #[error("profile names page '{0}' but does not declare it")]
    MissingPage(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Whole-operation failures of a task.
///
/// Per-row and per-selector misses never reach this type; they degrade
/// to sentinels and zero amounts inside the extractor.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("no selector matched '{element}' after {tried} candidates")]
    SelectorExhausted { element: String, tried: usize },

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("cancelled by operator: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl AgentError {
    /// Stable tag written into failed task results.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Navigation(_) => "navigation_failure",
            AgentError::SelectorExhausted { .. } => "selector_exhausted",
            AgentError::Backend(_) => "backend_failure",
            AgentError::Cancelled(_) => "cancelled",
            AgentError::Config(_) => "config_error",
            AgentError::Profile(_) => "profile_error",
        }
    }
}

impl From<PageError> for AgentError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Navigation { .. } | PageError::Timeout(_) => {
                AgentError::Navigation(err.to_string())
            }
            PageError::Backend(msg) => AgentError::Backend(msg),
        }
    }
}
