use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum PrerenderError {
    #[error("Unable to start browser: {0}")]
    Launch(String),

    #[error("Navigation to route {route} failed: {message}")]
    Navigation { route: String, message: String },

    #[error("Timed out after {timeout:?} waiting for document event '{event}' on route {route}")]
    WaitTimeout {
        route: String,
        event: String,
        timeout: Duration,
    },

    #[error("Selector '{selector}' did not appear on route {route} within {timeout:?}")]
    SelectorTimeout {
        route: String,
        selector: String,
        timeout: Duration,
    },

    #[error("Script evaluation failed on route {route}: {message}")]
    Evaluation { route: String, message: String },

    #[error("{0}")]
    Batch(BatchFailure),

    #[error("Static server error: {0}")]
    Server(String),

    #[error("Unable to write rendered route {route} to file \"{}\": {source}", path.display())]
    Output {
        route: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Every per-route failure of a batch, in route submission order.
#[derive(Debug)]
pub struct BatchFailure {
    pub total: usize,
    pub failures: Vec<PrerenderError>,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unable to prerender all routes! {} of {} route(s) failed",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

impl PrerenderError {
    pub fn navigation(route: impl Into<String>, message: impl Into<String>) -> Self {
        PrerenderError::Navigation {
            route: route.into(),
            message: message.into(),
        }
    }

    pub fn evaluation(route: impl Into<String>, message: impl Into<String>) -> Self {
        PrerenderError::Evaluation {
            route: route.into(),
            message: message.into(),
        }
    }

    /// The route a per-route error belongs to, if any.
    pub fn route(&self) -> Option<&str> {
        match self {
            PrerenderError::Navigation { route, .. }
            | PrerenderError::WaitTimeout { route, .. }
            | PrerenderError::SelectorTimeout { route, .. }
            | PrerenderError::Evaluation { route, .. }
            | PrerenderError::Output { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            PrerenderError::Launch(msg) => ErrorPayload::new(
                ErrorCategory::Browser,
                format!("Unable to start browser: {}", msg),
                "Install Chrome/Chromium or point --chrome (or [browser].executable) at the binary; in containers try [browser].no_sandbox = true.",
            ),
            PrerenderError::Navigation { .. } => ErrorPayload::new(
                ErrorCategory::Navigation,
                self.to_string(),
                "Check that the route is served by the static server and loads without network errors; raise [renderer.navigation].timeout if the page is slow.",
            ),
            PrerenderError::WaitTimeout { .. } => ErrorPayload::new(
                ErrorCategory::Timeout,
                self.to_string(),
                "Make sure the application dispatches the configured document event, or raise [renderer].wait_timeout.",
            ),
            PrerenderError::SelectorTimeout { .. } => ErrorPayload::new(
                ErrorCategory::Timeout,
                self.to_string(),
                "Verify the selector matches an element the page renders, or raise [renderer].selector_timeout.",
            ),
            PrerenderError::Evaluation { .. } => ErrorPayload::new(
                ErrorCategory::Script,
                self.to_string(),
                "Inspect the page's console output (run with --verbose) for the thrown error.",
            ),
            PrerenderError::Batch(batch) => {
                let remediation = batch
                    .failures
                    .first()
                    .and_then(|first| first.to_payload().remediation)
                    .unwrap_or_else(|| "Re-run with --verbose for per-route details.".to_string());
                ErrorPayload::new(ErrorCategory::Batch, batch.to_string(), remediation)
            }
            PrerenderError::Server(msg) => ErrorPayload::new(
                ErrorCategory::Config,
                msg.to_string(),
                "Check --host/--port; choose a free port or use port 0 for an ephemeral one.",
            ),
            PrerenderError::Output { .. } => ErrorPayload::new(
                ErrorCategory::Io,
                self.to_string(),
                "Check that the output directory is writable.",
            ),
            PrerenderError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            PrerenderError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify --host/--port and that routes start with '/'.",
            ),
            PrerenderError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("static dir") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Point --static-dir (or static_dir in the config) at the build output directory.",
                    )
                } else if lower.contains("route") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Pass at least one --route (e.g., --route / --route /about); routes must start with '/'.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/config values (e.g., --viewport WIDTHxHEIGHT, non-zero timeouts).",
                    )
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PrerenderError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Browser,
    Navigation,
    Timeout,
    Script,
    Batch,
    Io,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
