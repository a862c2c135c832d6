//! Browser abstraction the renderer drives.
//!
//! The core only talks to a browser through [`BrowserHandle`] and
//! [`PageHandle`], which keeps page sessions testable without a Chrome
//! binary and leaves process lifecycle to the caller.
//!
//! # Module Structure
//!
//! - [`chromium`] - chromiumoxide-backed implementation and launcher
//!
//! # Example
//!
//! ```no_run
//! use prerender_lib::{ChromiumBrowser, LaunchOptions, RenderOptions, RouteRenderer, ServerTarget};
//!
//! # async fn example() -> prerender_lib::Result<()> {
//! let browser = ChromiumBrowser::launch(&LaunchOptions::default()).await?;
//! let renderer = RouteRenderer::new(RenderOptions::default(), ServerTarget::new("localhost", 8000));
//! let rendered = renderer.render_routes(&["/".to_string()], &browser).await;
//! browser.close().await;
//! let rendered = rendered?;
//! println!("{} route(s) rendered", rendered.len());
//! # Ok(())
//! # }
//! ```

mod chromium;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::gate::RequestGate;
use crate::options::NavigationOptions;
use crate::Viewport;

pub use chromium::{
    ChromiumBrowser, ChromiumPage, LaunchOptions, DEFAULT_LAUNCH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    REQUEST_TIMEOUT_SLACK,
};

/// Failure reported by a browser or page operation, before it is tagged with a route.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("{0}")]
    Protocol(String),
    /// The page threw while evaluating a script.
    #[error("{0}")]
    Script(String),
    #[error("{0}")]
    Navigation(String),
}

pub type PageResult<T> = std::result::Result<T, PageError>;

/// A console message emitted by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: String,
    pub text: String,
}

pub type ConsoleSink = Arc<dyn Fn(ConsoleMessage) + Send + Sync>;

/// A started browser that can open tabs. Shared by every session of a batch.
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    async fn open_page(&self) -> PageResult<Box<dyn PageHandle>>;
}

/// One browser tab, exclusively owned by a single page session.
#[async_trait]
pub trait PageHandle: Send {
    async fn forward_console(&mut self, sink: ConsoleSink) -> PageResult<()>;

    /// Registers a script that runs in every new document before any page script.
    async fn add_init_script(&mut self, source: &str) -> PageResult<()>;

    async fn set_viewport(&mut self, viewport: &Viewport) -> PageResult<()>;

    /// Routes every outgoing request through `gate` from now on.
    async fn install_request_gate(&mut self, gate: RequestGate) -> PageResult<()>;

    async fn navigate(&mut self, url: &Url, options: &NavigationOptions) -> PageResult<()>;

    /// Evaluates `expression` in the page, awaiting it if it yields a promise.
    async fn evaluate(&mut self, expression: &str) -> PageResult<serde_json::Value>;

    /// Serialized markup of the whole document, doctype included.
    async fn content(&mut self) -> PageResult<String>;

    async fn close(self: Box<Self>) -> PageResult<()>;
}
