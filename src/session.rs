//! Single-route render lifecycle.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::browser::{BrowserHandle, ConsoleSink, PageError, PageHandle};
use crate::gate::RequestGate;
use crate::options::{RenderOptions, ServerTarget};
use crate::renderer::RenderResult;
use crate::{PrerenderError, Result};

/// Expression evaluated after the wait to learn where the page ended up.
pub const LOCATION_PATHNAME: &str = "window.location.pathname";

/// Script assigning `value` to `window[property]` before any page script runs.
pub fn injection_script(property: &str, value: &Value) -> String {
    format!(
        "(function () {{ window[{}] = {}; }})();",
        Value::String(property.to_string()),
        value
    )
}

/// Renders one route in one tab. The tab is closed on every exit path.
pub struct PageSession<'a> {
    route: &'a str,
    options: &'a RenderOptions,
    target: &'a ServerTarget,
}

impl<'a> PageSession<'a> {
    pub fn new(route: &'a str, options: &'a RenderOptions, target: &'a ServerTarget) -> Self {
        Self {
            route,
            options,
            target,
        }
    }

    pub async fn run(self, browser: &dyn BrowserHandle) -> Result<RenderResult> {
        debug!(route = %self.route, "opening page");
        let mut page = browser
            .open_page()
            .await
            .map_err(|err| self.step_error("opening a tab", err))?;

        let outcome = self.drive(page.as_mut()).await;

        if let Err(err) = page.close().await {
            warn!(route = %self.route, error = %err, "failed to close page");
        }
        match &outcome {
            Ok(_) => debug!(route = %self.route, "page rendered"),
            Err(err) => debug!(route = %self.route, error = %err, "page failed"),
        }
        outcome
    }

    async fn drive(&self, page: &mut dyn PageHandle) -> Result<RenderResult> {
        let route = self.route;
        let options = self.options;

        if let Some(handler) = &options.console_handler {
            let handler = Arc::clone(handler);
            let owner = route.to_string();
            let sink: ConsoleSink = Arc::new(move |message| handler(&owner, &message));
            page.forward_console(sink)
                .await
                .map_err(|err| self.step_error("attaching console forwarding", err))?;
        }

        if let Some(value) = &options.inject {
            page.add_init_script(&injection_script(&options.inject_property, value))
                .await
                .map_err(|err| self.step_error("registering the injection script", err))?;
        }

        let base = self
            .target
            .base_origin()
            .map_err(|err| PrerenderError::navigation(route, err.to_string()))?;
        let url = self
            .target
            .route_url(route)
            .map_err(|err| PrerenderError::navigation(route, err.to_string()))?;

        if let Some(viewport) = &options.viewport {
            page.set_viewport(viewport)
                .await
                .map_err(|err| self.step_error("applying the viewport", err))?;
        }

        if options.skip_third_party_requests {
            page.install_request_gate(RequestGate::new(&base))
                .await
                .map_err(|err| self.step_error("installing request interception", err))?;
        }

        let strategy = options.wait_strategy();
        if let Some(listener) = strategy.early_listener() {
            page.add_init_script(&listener)
                .await
                .map_err(|err| self.step_error("registering the document event listener", err))?;
        }

        debug!(route = %route, %url, wait_until = ?options.navigation.wait_until, "navigating");
        match timeout(options.navigation.timeout, page.navigate(&url, &options.navigation)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(PrerenderError::navigation(route, err.to_string())),
            Err(_) => {
                return Err(PrerenderError::navigation(
                    route,
                    format!(
                        "timed out after {:?} waiting for {:?}",
                        options.navigation.timeout, options.navigation.wait_until
                    ),
                ))
            }
        }

        if let Some(gate) = options.element_gate() {
            debug!(route = %route, selector = %gate.selector, "waiting for selector");
            gate.wait(page, route).await?;
        }

        debug!(route = %route, strategy = ?strategy, "waiting for render");
        strategy.wait(page, route).await?;

        let resolved = page
            .evaluate(LOCATION_PATHNAME)
            .await
            .map_err(|err| PrerenderError::evaluation(route, err.to_string()))?;
        let resolved = match resolved {
            Value::String(path) => path,
            other => {
                return Err(PrerenderError::evaluation(
                    route,
                    format!("location.pathname evaluated to {}", other),
                ))
            }
        };

        let html = page
            .content()
            .await
            .map_err(|err| PrerenderError::evaluation(route, err.to_string()))?;

        Ok(RenderResult {
            original_route: route.to_string(),
            route: resolved,
            html,
        })
    }

    fn step_error(&self, step: &str, err: PageError) -> PrerenderError {
        PrerenderError::navigation(self.route, format!("{} failed: {}", step, err))
    }
}
