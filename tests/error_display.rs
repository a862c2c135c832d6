use std::time::Duration;

use prerender_lib::{BatchFailure, PrerenderError};

#[test]
fn config_error_display_includes_message() {
    let err = PrerenderError::Config("missing static dir".to_string());

    assert_eq!(format!("{}", err), "Configuration error: missing static dir");
}

#[test]
fn io_error_display_wraps_source() {
    let io_err = std::io::Error::other("disk full");
    let err: PrerenderError = io_err.into();
    let rendered = format!("{}", err);

    assert!(rendered.starts_with("IO error: "));
    assert!(rendered.contains("disk full"));
}

#[test]
fn navigation_helper_names_the_route() {
    let err = PrerenderError::navigation("/about", "net::ERR_NAME_NOT_RESOLVED");

    assert_eq!(
        format!("{}", err),
        "Navigation to route /about failed: net::ERR_NAME_NOT_RESOLVED"
    );
}

#[test]
fn wait_timeout_names_event_and_route() {
    let err = PrerenderError::WaitTimeout {
        route: "/".to_string(),
        event: "app-rendered".to_string(),
        timeout: Duration::from_secs(30),
    };

    assert_eq!(
        format!("{}", err),
        "Timed out after 30s waiting for document event 'app-rendered' on route /"
    );
}

#[test]
fn batch_error_starts_with_summary_line() {
    let err = PrerenderError::Batch(BatchFailure {
        total: 5,
        failures: vec![
            PrerenderError::evaluation("/3", "TypeError: x is undefined"),
            PrerenderError::SelectorTimeout {
                route: "/4".to_string(),
                selector: "#app".to_string(),
                timeout: Duration::from_millis(500),
            },
        ],
    });
    let rendered = format!("{}", err);
    let mut lines = rendered.lines();

    assert_eq!(
        lines.next(),
        Some("Unable to prerender all routes! 2 of 5 route(s) failed")
    );
    assert_eq!(
        lines.next(),
        Some("  - Script evaluation failed on route /3: TypeError: x is undefined")
    );
    assert_eq!(
        lines.next(),
        Some("  - Selector '#app' did not appear on route /4 within 500ms")
    );
}

#[test]
fn output_error_includes_path() {
    let err = PrerenderError::Output {
        route: "/about".to_string(),
        path: "dist/about/index.html".into(),
        source: std::io::Error::other("read-only file system"),
    };

    assert_eq!(
        format!("{}", err),
        "Unable to write rendered route /about to file \"dist/about/index.html\": read-only file system"
    );
}
