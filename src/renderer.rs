//! Batch orchestration over a shared browser.

use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::browser::BrowserHandle;
use crate::error::BatchFailure;
use crate::limiter::ConcurrencyLimiter;
use crate::options::{RenderOptions, ServerTarget};
use crate::session::PageSession;
use crate::{PrerenderError, Result};

/// Output of one successfully rendered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    /// The route as it was requested.
    pub original_route: String,
    /// `location.pathname` after redirects and client-side routing.
    pub route: String,
    pub html: String,
}

/// Renders a route set, all-or-nothing.
#[derive(Debug, Clone)]
pub struct RouteRenderer {
    options: RenderOptions,
    target: ServerTarget,
}

impl RouteRenderer {
    pub fn new(options: RenderOptions, target: ServerTarget) -> Self {
        Self { options, target }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn target(&self) -> &ServerTarget {
        &self.target
    }

    /// Renders every route and returns the results in `routes` order.
    ///
    /// Sessions run concurrently up to `max_concurrent_routes` on the calling
    /// task. A failing session does not cancel its siblings; once all of them
    /// finished, any failure turns the whole call into a single
    /// [`PrerenderError::Batch`] and no results are returned.
    pub async fn render_routes(
        &self,
        routes: &[String],
        browser: &dyn BrowserHandle,
    ) -> Result<Vec<RenderResult>> {
        let limiter = ConcurrencyLimiter::new(self.options.max_concurrent_routes);
        let started = Instant::now();
        info!(
            routes = routes.len(),
            max_concurrent = self.options.max_concurrent_routes,
            "rendering routes"
        );

        let outcomes = join_all(routes.iter().map(|route| {
            let session = PageSession::new(route, &self.options, &self.target);
            limiter.run(session.run(browser))
        }))
        .await;

        let total = outcomes.len();
        let mut rendered = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(result) => rendered.push(result),
                Err(err) => {
                    error!(route = err.route().unwrap_or("?"), error = %err, "route failed");
                    failures.push(err);
                }
            }
        }

        if !failures.is_empty() {
            return Err(PrerenderError::Batch(BatchFailure { total, failures }));
        }

        info!(
            routes = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered all routes"
        );
        Ok(rendered)
    }
}
