//! Prerender Library
//!
//! Renders client-side application routes to static HTML by driving headless
//! Chromium against a local static server, then writes each route to disk.
//!
//! # Module Overview
//!
//! - [`renderer`] - Batch orchestration (`RouteRenderer::render_routes`)
//! - [`session`] - Single-route page lifecycle
//! - [`wait`] - Readiness strategies (document event, timer, selector gate)
//! - [`gate`] - Third-party request filtering
//! - [`limiter`] - Bounded concurrent admission
//! - [`browser`] - Browser abstraction and the chromiumoxide backend
//! - [`server`] - Static file server for the build output
//! - [`pipeline`] - End-to-end job: serve, render, post-process, write
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use prerender_lib::{LaunchOptions, PrerenderJob, RenderOptions};
//!
//! # async fn example() -> prerender_lib::Result<()> {
//! let job = PrerenderJob {
//!     static_dir: "dist".into(),
//!     output_dir: None,
//!     routes: vec!["/".to_string(), "/about".to_string()],
//!     host: "127.0.0.1".to_string(),
//!     port: 0,
//!     launch: LaunchOptions::default(),
//!     renderer: RenderOptions {
//!         render_after_document_event: Some("app-rendered".to_string()),
//!         ..RenderOptions::default()
//!     },
//!     post_process: None,
//! };
//! let report = job.run().await?;
//! println!("wrote {} route(s)", report.routes.len());
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod gate;
pub mod limiter;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod renderer;
pub mod server;
pub mod session;
pub mod viewport;
pub mod wait;

pub use browser::{
    BrowserHandle, ChromiumBrowser, ConsoleMessage, LaunchOptions, PageError, PageHandle,
};
pub use config::Config;
pub use error::{BatchFailure, PrerenderError, Result};
pub use gate::{RequestDecision, RequestGate};
pub use limiter::ConcurrencyLimiter;
pub use options::{
    ConsoleHandler, NavigationOptions, RenderOptions, ServerTarget, WaitUntil,
    DEFAULT_INJECT_PROPERTY,
};
pub use output::{ErrorOutput, PrerenderOutput, RenderOutput, PRERENDER_OUTPUT_VERSION};
pub use pipeline::{
    default_output_path, PostProcess, PrerenderJob, PrerenderReport, RenderedRoute, WrittenRoute,
};
pub use renderer::{RenderResult, RouteRenderer};
pub use server::StaticServer;
pub use session::PageSession;
pub use viewport::Viewport;
pub use wait::{ElementGate, WaitStrategy};
