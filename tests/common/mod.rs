//! Scriptable in-memory browser for driving the renderer without Chrome.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, sleep_until, Instant};
use url::Url;

use prerender_lib::browser::{ConsoleSink, PageResult};
use prerender_lib::session::LOCATION_PATHNAME;
use prerender_lib::wait::{document_event_script, early_listener_script, selector_probe_script};
use prerender_lib::{
    BrowserHandle, ConsoleMessage, NavigationOptions, PageError, PageHandle, RequestDecision,
    RequestGate, Viewport,
};

/// When a route's page dispatches its document event.
#[derive(Debug, Clone, Copy)]
pub enum EventTiming {
    /// While the document loads, before navigation resolves.
    DuringLoad,
    /// This long after navigation resolved.
    After(Duration),
    Never,
}

/// How the page behind one route behaves.
#[derive(Debug, Clone, Default)]
pub struct RouteScript {
    pub html: Option<String>,
    /// `location.pathname` reported after load, for redirects.
    pub pathname: Option<String>,
    pub event: Option<(String, EventTiming)>,
    pub navigate_error: Option<String>,
    pub navigate_delay: Duration,
    /// Selectors that start matching this long after navigation.
    pub selectors: Vec<(String, Duration)>,
    /// Subresources the document requests while loading.
    pub subresources: Vec<String>,
    pub console: Vec<ConsoleMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct PageLog {
    pub route: Option<String>,
    pub steps: Vec<String>,
    pub init_scripts: Vec<String>,
    pub viewport: Option<Viewport>,
    pub navigated_at: Option<Instant>,
    pub captured_at: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub opened: usize,
    pub closed: usize,
    pub open_now: usize,
    pub peak: usize,
    pub completed_requests: Vec<String>,
    pub aborted_requests: Vec<String>,
    pub pages: Vec<PageLog>,
}

#[derive(Default)]
struct Inner {
    routes: Mutex<HashMap<String, RouteScript>>,
    stats: Mutex<Stats>,
}

#[derive(Clone, Default)]
pub struct MockBrowser {
    inner: Arc<Inner>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, path: &str, script: RouteScript) -> Self {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), script);
        self
    }

    pub fn stats(&self) -> Stats {
        self.inner.stats.lock().unwrap().clone()
    }

    pub fn page_for(&self, route: &str) -> Option<PageLog> {
        self.stats()
            .pages
            .into_iter()
            .find(|page| page.route.as_deref() == Some(route))
    }
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    async fn open_page(&self) -> PageResult<Box<dyn PageHandle>> {
        let index = {
            let mut stats = self.inner.stats.lock().unwrap();
            stats.opened += 1;
            stats.open_now += 1;
            stats.peak = stats.peak.max(stats.open_now);
            stats.pages.push(PageLog::default());
            stats.pages.len() - 1
        };
        Ok(Box::new(MockPage {
            inner: Arc::clone(&self.inner),
            index,
            path: String::new(),
            script: RouteScript::default(),
            gate: None,
            sink: None,
            event_seen_early: false,
            navigated_at: None,
        }))
    }
}

struct MockPage {
    inner: Arc<Inner>,
    index: usize,
    path: String,
    script: RouteScript,
    gate: Option<RequestGate>,
    sink: Option<ConsoleSink>,
    event_seen_early: bool,
    navigated_at: Option<Instant>,
}

impl MockPage {
    fn log(&self, update: impl FnOnce(&mut PageLog)) {
        let mut stats = self.inner.stats.lock().unwrap();
        update(&mut stats.pages[self.index]);
    }

    fn step(&self, name: &str) {
        self.log(|page| page.steps.push(name.to_string()));
    }

    fn init_scripts(&self) -> Vec<String> {
        self.inner.stats.lock().unwrap().pages[self.index]
            .init_scripts
            .clone()
    }

    fn since_navigation(&self, delay: Duration) -> Instant {
        self.navigated_at.unwrap_or_else(Instant::now) + delay
    }
}

#[async_trait]
impl PageHandle for MockPage {
    async fn forward_console(&mut self, sink: ConsoleSink) -> PageResult<()> {
        self.step("console");
        self.sink = Some(sink);
        Ok(())
    }

    async fn add_init_script(&mut self, source: &str) -> PageResult<()> {
        self.step("init_script");
        let source = source.to_string();
        self.log(|page| page.init_scripts.push(source));
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: &Viewport) -> PageResult<()> {
        self.step("viewport");
        let viewport = *viewport;
        self.log(|page| page.viewport = Some(viewport));
        Ok(())
    }

    async fn install_request_gate(&mut self, gate: RequestGate) -> PageResult<()> {
        self.step("request_gate");
        self.gate = Some(gate);
        Ok(())
    }

    async fn navigate(&mut self, url: &Url, _options: &NavigationOptions) -> PageResult<()> {
        self.step("navigate");
        self.path = url.path().to_string();
        let path = self.path.clone();
        self.log(|page| page.route = Some(path));
        self.script = self
            .inner
            .routes
            .lock()
            .unwrap()
            .get(&self.path)
            .cloned()
            .unwrap_or_default();

        sleep(self.script.navigate_delay).await;
        if let Some(message) = &self.script.navigate_error {
            return Err(PageError::Navigation(message.clone()));
        }

        for request in &self.script.subresources {
            let decision = self
                .gate
                .as_ref()
                .map(|gate| gate.decide(request))
                .unwrap_or(RequestDecision::Continue);
            let mut stats = self.inner.stats.lock().unwrap();
            match decision {
                RequestDecision::Continue => stats.completed_requests.push(request.clone()),
                RequestDecision::Abort => stats.aborted_requests.push(request.clone()),
            }
        }

        if let Some(sink) = &self.sink {
            for message in &self.script.console {
                sink(message.clone());
            }
        }

        // Only a listener registered before page scripts can observe this dispatch.
        if let Some((event, EventTiming::DuringLoad)) = &self.script.event {
            let listener = early_listener_script(event);
            self.event_seen_early = self.init_scripts().contains(&listener);
        }

        let now = Instant::now();
        self.navigated_at = Some(now);
        self.log(|page| page.navigated_at = Some(now));
        Ok(())
    }

    async fn evaluate(&mut self, expression: &str) -> PageResult<Value> {
        if expression == LOCATION_PATHNAME {
            self.step("evaluate:pathname");
            let pathname = self.script.pathname.clone().unwrap_or(self.path.clone());
            return Ok(Value::String(pathname));
        }

        if expression.starts_with("document.querySelector(") {
            self.step("evaluate:selector");
            let now = Instant::now();
            let found = self.script.selectors.iter().any(|(selector, after)| {
                expression == selector_probe_script(selector) && now >= self.since_navigation(*after)
            });
            return Ok(Value::Bool(found));
        }

        if expression.starts_with("new Promise") {
            self.step("evaluate:event");
            let timing = match &self.script.event {
                Some((event, timing)) if expression == document_event_script(event) => *timing,
                _ => EventTiming::Never,
            };
            match timing {
                EventTiming::DuringLoad if self.event_seen_early => return Ok(Value::Bool(true)),
                EventTiming::After(delay) => {
                    sleep_until(self.since_navigation(delay)).await;
                    return Ok(Value::Bool(true));
                }
                EventTiming::DuringLoad | EventTiming::Never => {
                    futures::future::pending::<()>().await;
                }
            }
        }

        Err(PageError::Script(format!(
            "ReferenceError: unsupported expression {expression}"
        )))
    }

    async fn content(&mut self) -> PageResult<String> {
        self.step("content");
        let now = Instant::now();
        self.log(|page| page.captured_at = Some(now));
        Ok(self
            .script
            .html
            .clone()
            .unwrap_or_else(|| format!("<!DOCTYPE html><html><body>{}</body></html>", self.path)))
    }

    async fn close(self: Box<Self>) -> PageResult<()> {
        self.step("close");
        let mut stats = self.inner.stats.lock().unwrap();
        stats.closed += 1;
        stats.open_now -= 1;
        Ok(())
    }
}
