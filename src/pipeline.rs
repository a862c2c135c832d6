//! End-to-end prerender job: serve, launch, render, post-process, write.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::browser::{ChromiumBrowser, LaunchOptions};
use crate::options::RenderOptions;
use crate::renderer::{RenderResult, RouteRenderer};
use crate::server::StaticServer;
use crate::{PrerenderError, Result};

/// Hook applied to every rendered route before its output path is derived.
pub type PostProcess = Arc<dyn Fn(RenderedRoute) -> Result<RenderedRoute> + Send + Sync>;

/// A rendered route on its way to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRoute {
    pub original_route: String,
    pub route: String,
    pub html: String,
    /// Set by a post-process hook to override the default location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl From<RenderResult> for RenderedRoute {
    fn from(result: RenderResult) -> Self {
        Self {
            original_route: result.original_route,
            route: result.route,
            html: result.html,
            output_path: None,
        }
    }
}

/// `output_dir/<route>/index.html`.
pub fn default_output_path(output_dir: &Path, route: &str) -> PathBuf {
    route
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .fold(output_dir.to_path_buf(), |path, segment| path.join(segment))
        .join("index.html")
}

/// Runs the post-process hook and fills in missing output paths.
pub fn finalize_routes(
    results: Vec<RenderResult>,
    output_dir: &Path,
    post_process: Option<&PostProcess>,
) -> Result<Vec<RenderedRoute>> {
    results
        .into_iter()
        .map(|result| {
            let rendered = RenderedRoute::from(result);
            let mut rendered = match post_process {
                Some(hook) => hook(rendered)?,
                None => rendered,
            };
            if rendered.output_path.is_none() {
                rendered.output_path = Some(default_output_path(output_dir, &rendered.route));
            }
            Ok(rendered)
        })
        .collect()
}

/// Writes every route's trimmed HTML, creating parent directories as needed.
pub async fn write_routes(routes: &[RenderedRoute], output_dir: &Path) -> Result<Vec<PathBuf>> {
    try_join_all(routes.iter().map(|rendered| async move {
        let path = rendered
            .output_path
            .clone()
            .unwrap_or_else(|| default_output_path(output_dir, &rendered.route));
        let output_error = |source| PrerenderError::Output {
            route: rendered.route.clone(),
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(output_error)?;
        }
        tokio::fs::write(&path, rendered.html.trim())
            .await
            .map_err(output_error)?;
        debug!(route = %rendered.route, path = %path.display(), "wrote rendered route");
        Ok::<_, PrerenderError>(path)
    }))
    .await
}

/// Everything needed to prerender a static build.
#[derive(Clone)]
pub struct PrerenderJob {
    pub static_dir: PathBuf,
    /// Defaults to `static_dir`.
    pub output_dir: Option<PathBuf>,
    pub routes: Vec<String>,
    pub host: String,
    pub port: u16,
    pub launch: LaunchOptions,
    pub renderer: RenderOptions,
    pub post_process: Option<PostProcess>,
}

impl fmt::Debug for PrerenderJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrerenderJob")
            .field("static_dir", &self.static_dir)
            .field("output_dir", &self.output_dir)
            .field("routes", &self.routes)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("launch", &self.launch)
            .field("renderer", &self.renderer)
            .field("post_process", &self.post_process.is_some())
            .finish()
    }
}

/// Where each route ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenRoute {
    pub original_route: String,
    pub route: String,
    pub output_path: PathBuf,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct PrerenderReport {
    pub routes: Vec<WrittenRoute>,
    pub elapsed: Duration,
}

impl PrerenderJob {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.static_dir)
    }

    /// Launch options whose CDP command budget covers every renderer timeout.
    pub fn launch_options(&self) -> LaunchOptions {
        self.launch.for_renderer(&self.renderer)
    }

    /// Runs the whole job. The server and browser are torn down on every path.
    pub async fn run(&self) -> Result<PrerenderReport> {
        let started = Instant::now();
        let server = StaticServer::start(&self.static_dir, &self.host, self.port).await?;
        let target = server.target();
        info!(root = %self.static_dir.display(), addr = %server.local_addr(), "serving static build");

        let browser = match ChromiumBrowser::launch(&self.launch_options()).await {
            Ok(browser) => browser,
            Err(err) => {
                server.stop().await;
                return Err(err);
            }
        };

        let renderer = RouteRenderer::new(self.renderer.clone(), target);
        let rendered = renderer.render_routes(&self.routes, &browser).await;
        browser.close().await;
        server.stop().await;
        let rendered = rendered?;

        let output_dir = self.output_dir();
        let finalized = finalize_routes(rendered, output_dir, self.post_process.as_ref())?;
        let paths = write_routes(&finalized, output_dir).await?;

        let routes = finalized
            .into_iter()
            .zip(paths)
            .map(|(route, output_path)| WrittenRoute {
                bytes: route.html.trim().len(),
                original_route: route.original_route,
                route: route.route,
                output_path,
            })
            .collect();

        Ok(PrerenderReport {
            routes,
            elapsed: started.elapsed(),
        })
    }
}
