//! Readiness conditions evaluated before a page is captured.
//!
//! A render waits on at most one [`WaitStrategy`], optionally preceded by an
//! [`ElementGate`]. Document-event waits are race-free because
//! [`early_listener_script`] runs before any page script and records the event
//! in `window.__PRERENDER_STATUS`, which [`document_event_script`] checks
//! before attaching its own listener.

use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::browser::{PageError, PageHandle};
use crate::{PrerenderError, Result};

/// Delay between two selector probes.
pub const DEFAULT_SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

const STATUS_PROPERTY: &str = "__PRERENDER_STATUS";
const RESOLVED_FLAG: &str = "__DOCUMENT_EVENT_RESOLVED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Capture once the page dispatches `event` on `document`.
    DocumentEvent { event: String, timeout: Duration },
    /// Capture after a fixed delay.
    Time(Duration),
    /// Capture as soon as navigation settled.
    Immediate,
}

impl WaitStrategy {
    /// Script to register before navigation, if this strategy needs one.
    pub fn early_listener(&self) -> Option<String> {
        match self {
            WaitStrategy::DocumentEvent { event, .. } => Some(early_listener_script(event)),
            WaitStrategy::Time(_) | WaitStrategy::Immediate => None,
        }
    }

    pub async fn wait(&self, page: &mut dyn PageHandle, route: &str) -> Result<()> {
        match self {
            WaitStrategy::DocumentEvent {
                event,
                timeout: limit,
            } => {
                let script = document_event_script(event);
                match timeout(*limit, page.evaluate(&script)).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(err)) => Err(evaluation_error(route, err)),
                    Err(_) => Err(PrerenderError::WaitTimeout {
                        route: route.to_string(),
                        event: event.clone(),
                        timeout: *limit,
                    }),
                }
            }
            WaitStrategy::Time(delay) => {
                sleep(*delay).await;
                Ok(())
            }
            WaitStrategy::Immediate => Ok(()),
        }
    }
}

/// Blocks capture until `selector` matches an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementGate {
    pub selector: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ElementGate {
    pub fn new(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            selector: selector.into(),
            timeout,
            poll_interval: DEFAULT_SELECTOR_POLL_INTERVAL,
        }
    }

    pub async fn wait(&self, page: &mut dyn PageHandle, route: &str) -> Result<()> {
        let probe = selector_probe_script(&self.selector);
        let poll = async {
            loop {
                match page.evaluate(&probe).await {
                    Ok(found) if found.as_bool().unwrap_or(false) => return Ok(()),
                    Ok(_) => sleep(self.poll_interval).await,
                    Err(err) => return Err(evaluation_error(route, err)),
                }
            }
        };

        match timeout(self.timeout, poll).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PrerenderError::SelectorTimeout {
                route: route.to_string(),
                selector: self.selector.clone(),
                timeout: self.timeout,
            }),
        }
    }
}

fn evaluation_error(route: &str, err: PageError) -> PrerenderError {
    PrerenderError::evaluation(route, err.to_string())
}

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Records `event` in a global flag as early as possible in the page's life.
pub fn early_listener_script(event: &str) -> String {
    format!(
        "(function () {{ window['{status}'] = window['{status}'] || {{}}; document.addEventListener({event}, function () {{ window['{status}'].{flag} = true; }}); }})();",
        status = STATUS_PROPERTY,
        flag = RESOLVED_FLAG,
        event = js_string(event),
    )
}

/// Promise resolving on `event`, or at once if the early listener already saw it.
pub fn document_event_script(event: &str) -> String {
    format!(
        "new Promise(function (resolve) {{ var status = window['{status}']; if (status && status.{flag}) {{ resolve(true); return; }} document.addEventListener({event}, function () {{ resolve(true); }}, {{ once: true }}); }})",
        status = STATUS_PROPERTY,
        flag = RESOLVED_FLAG,
        event = js_string(event),
    )
}

pub fn selector_probe_script(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_document_event_needs_early_listener() {
        let event = WaitStrategy::DocumentEvent {
            event: "render-ready".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(
            event.early_listener(),
            Some(early_listener_script("render-ready"))
        );
        assert!(WaitStrategy::Time(Duration::from_millis(5))
            .early_listener()
            .is_none());
        assert!(WaitStrategy::Immediate.early_listener().is_none());
    }

    #[test]
    fn scripts_share_the_readiness_flag() {
        let early = early_listener_script("ready");
        let wait = document_event_script("ready");
        for script in [&early, &wait] {
            assert!(script.contains("__PRERENDER_STATUS"));
            assert!(script.contains("__DOCUMENT_EVENT_RESOLVED"));
            assert!(script.contains("\"ready\""));
        }
        assert!(wait.starts_with("new Promise"));
    }

    #[test]
    fn event_names_and_selectors_are_escaped() {
        let script = document_event_script("x\"); alert(1); (\"");
        assert!(script.contains(r#""x\"); alert(1); (\"""#));

        let probe = selector_probe_script("a[href=\"/about\"]");
        assert_eq!(probe, r#"document.querySelector("a[href=\"/about\"]") !== null"#);
    }

    #[test]
    fn element_gate_defaults_poll_interval() {
        let gate = ElementGate::new("#app", Duration::from_secs(2));
        assert_eq!(gate.poll_interval, DEFAULT_SELECTOR_POLL_INTERVAL);
        assert_eq!(gate.timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn timed_strategy_sleeps_for_the_delay() {
        let strategy = WaitStrategy::Time(Duration::from_millis(30));
        let mut page = NullPage;
        let start = tokio::time::Instant::now();
        strategy.wait(&mut page, "/").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn document_event_times_out_when_never_dispatched() {
        let strategy = WaitStrategy::DocumentEvent {
            event: "never".to_string(),
            timeout: Duration::from_millis(20),
        };
        let mut page = NullPage;
        let err = strategy.wait(&mut page, "/stuck").await.unwrap_err();
        assert!(matches!(
            err,
            PrerenderError::WaitTimeout { ref route, ref event, .. }
                if route == "/stuck" && event == "never"
        ));
    }

    #[tokio::test]
    async fn element_gate_times_out_when_selector_never_matches() {
        let gate = ElementGate {
            selector: "#missing".to_string(),
            timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(5),
        };
        let mut page = NullPage;
        let err = gate.wait(&mut page, "/empty").await.unwrap_err();
        assert!(matches!(err, PrerenderError::SelectorTimeout { .. }));
    }

    /// Page whose promises never settle and whose selectors never match.
    struct NullPage;

    #[async_trait::async_trait]
    impl PageHandle for NullPage {
        async fn forward_console(&mut self, _: crate::browser::ConsoleSink) -> crate::browser::PageResult<()> {
            Ok(())
        }
        async fn add_init_script(&mut self, _: &str) -> crate::browser::PageResult<()> {
            Ok(())
        }
        async fn set_viewport(&mut self, _: &crate::Viewport) -> crate::browser::PageResult<()> {
            Ok(())
        }
        async fn install_request_gate(&mut self, _: crate::gate::RequestGate) -> crate::browser::PageResult<()> {
            Ok(())
        }
        async fn navigate(
            &mut self,
            _: &url::Url,
            _: &crate::options::NavigationOptions,
        ) -> crate::browser::PageResult<()> {
            Ok(())
        }
        async fn evaluate(&mut self, expression: &str) -> crate::browser::PageResult<Value> {
            if expression.starts_with("new Promise") {
                futures::future::pending::<()>().await;
            }
            Ok(Value::Bool(false))
        }
        async fn content(&mut self) -> crate::browser::PageResult<String> {
            Ok(String::new())
        }
        async fn close(self: Box<Self>) -> crate::browser::PageResult<()> {
            Ok(())
        }
    }
}
