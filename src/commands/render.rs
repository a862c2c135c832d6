use std::path::PathBuf;
use std::process::ExitCode;

use prerender_lib::{PrerenderError, PrerenderOutput, RenderOutput};
use tracing::{debug, info};

use crate::cli::RenderArgs;
use crate::formatting::{render_error, write_output};
use crate::settings::{format_effective_config, load_config, resolve_render_job};

/// Run the render command.
pub async fn run_render(config_path: Option<PathBuf>, args: RenderArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();

    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let mut job = match resolve_render_job(&args, config) {
        Ok(job) => job,
        Err(err) => return render_error(err, format, output),
    };
    debug!("{}", format_effective_config(&job, config_path.as_deref()));

    job.renderer = job
        .renderer
        .with_console_handler(|route, message| {
            debug!(route, level = %message.level, "console: {}", message.text);
        });

    info!(routes = job.routes.len(), "prerendering");
    let report = match job.run().await {
        Ok(report) => report,
        Err(err) => return render_error(err, format, output),
    };
    info!(
        routes = report.routes.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "prerender complete"
    );

    let body = PrerenderOutput::Render(RenderOutput::from(report));
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(PrerenderError::Config(err.to_string()), format, output);
    }
    ExitCode::SUCCESS
}
