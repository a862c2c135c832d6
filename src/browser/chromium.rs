//! Chromium backend built on chromiumoxide (Chrome DevTools Protocol).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, LoaderId};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventFrameNavigated, EventLifecycleEvent,
    NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, EventConsoleApiCalled};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::{BrowserHandle, ConsoleMessage, ConsoleSink, PageError, PageHandle, PageResult};
use crate::gate::{RequestDecision, RequestGate};
use crate::options::{NavigationOptions, RenderOptions};
use crate::{PrerenderError, Result, Viewport};

/// Default bound for starting the browser process.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

/// chromiumoxide's own default for a single CDP command.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Headroom kept between the longest render timeout and the CDP command budget,
/// so the render timeouts always fire first.
pub const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// How the Chromium process is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    /// Browser binary; chromiumoxide looks one up when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    /// Extra command-line switches.
    pub args: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,
    /// Budget for one CDP command, including `Runtime.evaluate` on a pending promise.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: false,
            args: Vec::new(),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl LaunchOptions {
    /// These options with a CDP command budget that outlasts every timeout in `renderer`.
    pub fn for_renderer(&self, renderer: &RenderOptions) -> Self {
        let needed = renderer.longest_timeout() + REQUEST_TIMEOUT_SLACK;
        Self {
            request_timeout: self.request_timeout.max(needed),
            ..self.clone()
        }
    }
}

/// A running Chromium instance plus the task pumping its CDP connection.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if options.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        builder = builder.request_timeout(options.request_timeout);
        for arg in &options.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(PrerenderError::Launch)?;

        let (browser, mut handler) = match timeout(options.launch_timeout, Browser::launch(config)).await {
            Ok(Ok(launched)) => launched,
            Ok(Err(err)) => return Err(PrerenderError::Launch(err.to_string())),
            Err(_) => {
                return Err(PrerenderError::Launch(format!(
                    "browser did not start within {:?}",
                    options.launch_timeout
                )))
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser event error");
                }
            }
        });

        debug!(
            headless = options.headless,
            request_timeout = ?options.request_timeout,
            "browser launched"
        );
        Ok(Self { browser, handler })
    }

    /// Shuts the browser down. Failures are logged, not returned.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser");
        }
        if let Err(err) = self.browser.wait().await {
            warn!(error = %err, "failed to wait for browser exit");
        }
        self.handler.abort();
    }
}

#[async_trait]
impl BrowserHandle for ChromiumBrowser {
    async fn open_page(&self) -> PageResult<Box<dyn PageHandle>> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(Box::new(ChromiumPage::new(page)))
    }
}

/// A tab plus the listener tasks attached to it.
pub struct ChromiumPage {
    page: Page,
    listeners: Vec<JoinHandle<()>>,
}

impl ChromiumPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            listeners: Vec::new(),
        }
    }
}

impl From<CdpError> for PageError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::JavascriptException(details) => PageError::Script(
                details
                    .exception
                    .as_ref()
                    .and_then(|exception| exception.description.clone())
                    .unwrap_or_else(|| details.text.clone()),
            ),
            other => PageError::Protocol(other.to_string()),
        }
    }
}

fn console_message(event: &EventConsoleApiCalled) -> ConsoleMessage {
    let text = event
        .args
        .iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(Value::String(s)), _) => s.clone(),
            (Some(other), _) => other.to_string(),
            (None, Some(description)) => description.clone(),
            (None, None) => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    ConsoleMessage {
        level: format!("{:?}", event.r#type).to_ascii_lowercase(),
        text,
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn forward_console(&mut self, sink: ConsoleSink) -> PageResult<()> {
        let mut events = self.page.event_listener::<EventConsoleApiCalled>().await?;
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                sink(console_message(&event));
            }
        }));
        Ok(())
    }

    async fn add_init_script(&mut self, source: &str) -> PageResult<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
            .await?;
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: &Viewport) -> PageResult<()> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                viewport.device_scale_factor,
                viewport.is_mobile,
            ))
            .await?;
        Ok(())
    }

    async fn install_request_gate(&mut self, gate: RequestGate) -> PageResult<()> {
        let mut paused = self.page.event_listener::<EventRequestPaused>().await?;
        self.page.execute(FetchEnableParams::default()).await?;

        let page = self.page.clone();
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let outcome = match gate.decide(&event.request.url) {
                    RequestDecision::Continue => page
                        .execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(drop),
                    RequestDecision::Abort => {
                        debug!(url = %event.request.url, "aborting third-party request");
                        page.execute(FailRequestParams::new(
                            request_id,
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(drop)
                    }
                };
                if let Err(err) = outcome {
                    debug!(url = %event.request.url, error = %err, "request interception failed");
                }
            }
        }));
        Ok(())
    }

    async fn navigate(&mut self, url: &Url, options: &NavigationOptions) -> PageResult<()> {
        let mut lifecycle = self.page.event_listener::<EventLifecycleEvent>().await?;
        let mut committed = self.page.event_listener::<EventFrameNavigated>().await?;
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await?;

        // chromiumoxide answers Page.navigate only once `load` fired, so the
        // command runs on its own task and earlier milestones can end the wait.
        let page = self.page.clone();
        let destination = url.to_string();
        let mut request =
            tokio::spawn(async move { page.execute(NavigateParams::new(destination)).await });

        let milestone = options.wait_until.lifecycle_event();
        let mut documents: Vec<LoaderId> = Vec::new();
        let mut expected: Option<LoaderId> = None;
        let mut answered = false;

        loop {
            // Commits are drained before lifecycle events so a milestone is
            // never judged ahead of its document's commit.
            tokio::select! {
                biased;

                outcome = &mut request, if !answered => {
                    answered = true;
                    let navigation = match outcome {
                        Ok(Ok(response)) => response.result,
                        Ok(Err(err)) => {
                            return Err(PageError::Navigation(format!("{} at {}", err, url)))
                        }
                        Err(err) => return Err(PageError::Navigation(err.to_string())),
                    };
                    if let Some(error_text) = navigation.error_text {
                        return Err(PageError::Navigation(format!("{} at {}", error_text, url)));
                    }
                    // Same-document navigations have no loader and emit no lifecycle events.
                    let Some(loader_id) = navigation.loader_id else {
                        return Ok(());
                    };
                    expected = Some(loader_id);
                }
                Some(event) = committed.next() => {
                    // Error pages commit with `unreachable_url` set and never count.
                    if event.frame.parent_id.is_none() && event.frame.unreachable_url.is_none() {
                        documents.push(event.frame.loader_id.clone());
                    }
                }
                event = lifecycle.next() => {
                    let Some(event) = event else {
                        return Err(PageError::Navigation(format!(
                            "page closed before {} fired for {}",
                            milestone, url
                        )));
                    };
                    if event.name != milestone {
                        continue;
                    }
                    let reached = match &expected {
                        Some(loader_id) => event.loader_id == *loader_id,
                        None => documents.contains(&event.loader_id),
                    };
                    if reached {
                        if !answered {
                            request.abort();
                        }
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn evaluate(&mut self, expression: &str) -> PageResult<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(PageError::Protocol)?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&mut self) -> PageResult<String> {
        Ok(self.page.content().await?)
    }

    async fn close(self: Box<Self>) -> PageResult<()> {
        let ChromiumPage { page, listeners } = *self;
        for listener in listeners {
            listener.abort();
        }
        page.close().await?;
        Ok(())
    }
}
