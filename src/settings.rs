use std::path::Path;
use std::time::Duration;

use prerender_lib::{Config, PrerenderError, PrerenderJob};

use crate::cli::RenderArgs;

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/prerender/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, PrerenderError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        PrerenderError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        PrerenderError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Merge CLI arguments over the config file into a runnable job.
pub fn resolve_render_job(args: &RenderArgs, config: Config) -> Result<PrerenderJob, PrerenderError> {
    let mut config = config;

    if let Some(dir) = &args.static_dir {
        config.static_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if !args.routes.is_empty() {
        config.routes = args.routes.clone();
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let renderer = &mut config.renderer;
    if let Some(max) = args.max_concurrent {
        renderer.max_concurrent_routes = max;
    }
    if args.skip_third_party {
        renderer.skip_third_party_requests = true;
    }
    if let Some(event) = &args.render_after_event {
        renderer.render_after_document_event = Some(event.clone());
    }
    if let Some(ms) = args.render_after_time {
        renderer.render_after_time = Some(Duration::from_millis(ms));
    }
    if let Some(selector) = &args.render_after_element {
        renderer.render_after_element_exists = Some(selector.clone());
    }
    if let Some(raw) = &args.inject {
        let value = serde_json::from_str(raw).map_err(|e| {
            PrerenderError::Config(format!("--inject is not valid JSON: {}", e))
        })?;
        renderer.inject = Some(value);
    }
    if let Some(property) = &args.inject_property {
        renderer.inject_property = property.clone();
    }
    if let Some(viewport) = args.viewport {
        renderer.viewport = Some(viewport);
    }
    if let Some(wait_until) = args.wait_until {
        renderer.navigation.wait_until = wait_until.into();
    }
    if let Some(secs) = args.nav_timeout {
        renderer.navigation.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.wait_timeout {
        renderer.wait_timeout = Duration::from_secs(secs);
        renderer.selector_timeout = Duration::from_secs(secs);
    }

    if let Some(chrome) = &args.chrome {
        config.browser.executable = Some(chrome.clone());
    }
    if args.headful {
        config.browser.headless = false;
    }
    if args.no_sandbox {
        config.browser.no_sandbox = true;
    }

    config.validate().map_err(PrerenderError::Config)?;

    let static_dir = config.static_dir.ok_or_else(|| {
        PrerenderError::Config(
            "no static dir configured; pass --static-dir or set static_dir".to_string(),
        )
    })?;
    if config.routes.is_empty() {
        return Err(PrerenderError::Config(
            "no routes to render; pass --route or set routes".to_string(),
        ));
    }
    if !static_dir.is_dir() {
        return Err(PrerenderError::Config(format!(
            "static dir {} does not exist or is not a directory",
            static_dir.display()
        )));
    }

    Ok(PrerenderJob {
        static_dir,
        output_dir: config.output_dir,
        routes: config.routes,
        host: config.server.host,
        port: config.server.port,
        launch: config.browser,
        renderer: config.renderer,
        post_process: None,
    })
}

/// Format the effective job settings as a single-line string.
pub fn format_effective_config(job: &PrerenderJob, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let renderer = &job.renderer;
    let wait = match renderer.wait_strategy() {
        prerender_lib::WaitStrategy::DocumentEvent { event, .. } => format!("event '{}'", event),
        prerender_lib::WaitStrategy::Time(delay) => format!("{}ms", delay.as_millis()),
        prerender_lib::WaitStrategy::Immediate => "immediate".to_string(),
    };
    format!(
        "Effective config [{source}]: static_dir={}, output_dir={}, routes={}, server={}:{}, max_concurrent={}, wait={}, element={}, third_party={}, nav_timeout={}s, wait_timeout={}s, headless={}",
        job.static_dir.display(),
        job.output_dir().display(),
        job.routes.len(),
        job.host,
        job.port,
        renderer.max_concurrent_routes,
        wait,
        renderer.render_after_element_exists.as_deref().unwrap_or("-"),
        if renderer.skip_third_party_requests { "skip" } else { "allow" },
        renderer.navigation.timeout.as_secs(),
        renderer.wait_timeout.as_secs(),
        job.launch.headless,
    )
}
