//! Renderer configuration.
//!
//! [`RenderOptions`] carries every knob a render batch honours. It is
//! deserialisable from the `[renderer]` table of the config file; the console
//! handler is the only field that can only be set programmatically.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::ConsoleMessage;
use crate::wait::{ElementGate, WaitStrategy};
use crate::{PrerenderError, Result, Viewport};

/// Global property the injected value is stored under unless overridden.
pub const DEFAULT_INJECT_PROPERTY: &str = "__PRERENDER_INJECTED";

/// Default bound for navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound for `render_after_element_exists`.
pub const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound for `render_after_document_event`.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback receiving `(route, message)` for every console message a page emits.
pub type ConsoleHandler = Arc<dyn Fn(&str, &ConsoleMessage) + Send + Sync>;

/// Lifecycle milestone a navigation waits for before it is considered done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// No network connections for at least 500 ms.
    #[default]
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    /// No more than two network connections for at least 500 ms.
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

impl WaitUntil {
    /// Name of the CDP `Page.lifecycleEvent` that marks this milestone.
    pub fn lifecycle_event(self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "DOMContentLoaded",
            WaitUntil::NetworkIdle0 => "networkIdle",
            WaitUntil::NetworkIdle2 => "networkAlmostIdle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationOptions {
    pub wait_until: WaitUntil,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::default(),
            timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Upper bound on simultaneously open pages; 0 means unbounded.
    pub max_concurrent_routes: usize,
    pub inject: Option<serde_json::Value>,
    pub inject_property: String,
    pub skip_third_party_requests: bool,
    pub render_after_document_event: Option<String>,
    #[serde(with = "humantime_serde")]
    pub render_after_time: Option<Duration>,
    pub render_after_element_exists: Option<String>,
    pub viewport: Option<Viewport>,
    pub navigation: NavigationOptions,
    #[serde(with = "humantime_serde")]
    pub selector_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    #[serde(skip)]
    pub console_handler: Option<ConsoleHandler>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_concurrent_routes: 0,
            inject: None,
            inject_property: DEFAULT_INJECT_PROPERTY.to_string(),
            skip_third_party_requests: false,
            render_after_document_event: None,
            render_after_time: None,
            render_after_element_exists: None,
            viewport: None,
            navigation: NavigationOptions::default(),
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            console_handler: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("max_concurrent_routes", &self.max_concurrent_routes)
            .field("inject", &self.inject)
            .field("inject_property", &self.inject_property)
            .field("skip_third_party_requests", &self.skip_third_party_requests)
            .field(
                "render_after_document_event",
                &self.render_after_document_event,
            )
            .field("render_after_time", &self.render_after_time)
            .field(
                "render_after_element_exists",
                &self.render_after_element_exists,
            )
            .field("viewport", &self.viewport)
            .field("navigation", &self.navigation)
            .field("selector_timeout", &self.selector_timeout)
            .field("wait_timeout", &self.wait_timeout)
            .field("console_handler", &self.console_handler.is_some())
            .finish()
    }
}

impl RenderOptions {
    /// The primary readiness strategy: document event, else timer, else immediate.
    pub fn wait_strategy(&self) -> WaitStrategy {
        if let Some(event) = &self.render_after_document_event {
            WaitStrategy::DocumentEvent {
                event: event.clone(),
                timeout: self.wait_timeout,
            }
        } else if let Some(delay) = self.render_after_time {
            WaitStrategy::Time(delay)
        } else {
            WaitStrategy::Immediate
        }
    }

    /// The selector gate evaluated before the primary strategy, if configured.
    pub fn element_gate(&self) -> Option<ElementGate> {
        self.render_after_element_exists
            .as_ref()
            .filter(|selector| !selector.trim().is_empty())
            .map(|selector| ElementGate::new(selector.clone(), self.selector_timeout))
    }

    /// The largest bound any single page operation may wait for.
    pub fn longest_timeout(&self) -> Duration {
        self.navigation
            .timeout
            .max(self.wait_timeout)
            .max(self.selector_timeout)
    }

    pub fn with_console_handler(
        mut self,
        handler: impl Fn(&str, &ConsoleMessage) + Send + Sync + 'static,
    ) -> Self {
        self.console_handler = Some(Arc::new(handler));
        self
    }
}

/// Host and port of the local server the application is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
}

impl ServerTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Scheme, host and port every route is resolved against.
    pub fn base_origin(&self) -> Result<Url> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let url = Url::parse(&format!("http://{}:{}", host, self.port))?;
        Ok(url)
    }

    /// Absolute URL for `route` on this server.
    pub fn route_url(&self, route: &str) -> Result<Url> {
        let base = self.base_origin()?;
        let url = base.join(route)?;
        if url.origin() != base.origin() {
            return Err(PrerenderError::Config(format!(
                "route '{}' does not resolve to the local server",
                route
            )));
        }
        Ok(url)
    }
}
