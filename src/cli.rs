use clap::{Parser, Subcommand, ValueEnum};
use prerender_lib::{Viewport, WaitUntil};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prerender")]
#[command(
    version,
    about = "Prerender - Render client-side application routes to static HTML",
    long_about = "Prerender\n\nServes a static build locally, renders each route in headless Chromium, and writes the captured HTML to <output-dir>/<route>/index.html.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) with routes, server, renderer and browser settings; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render routes of a static build to HTML files
    Render(RenderArgs),
}

#[derive(clap::Args, Default)]
pub struct RenderArgs {
    #[arg(long, value_name = "DIR", help = "Directory holding the built application")]
    pub static_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory to write rendered routes to (defaults to --static-dir)"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long = "route",
        value_name = "ROUTE",
        help = "Route to render (repeatable, e.g. --route / --route /about)"
    )]
    pub routes: Vec<String>,

    #[arg(long, help = "Host the static server binds to")]
    pub host: Option<String>,

    #[arg(long, help = "Port the static server binds to (0 picks a free port)")]
    pub port: Option<u16>,

    #[arg(
        long,
        value_name = "N",
        help = "Maximum number of routes rendered at once (0 = unbounded)"
    )]
    pub max_concurrent: Option<usize>,

    #[arg(long, help = "Abort requests to origins other than the local server")]
    pub skip_third_party: bool,

    #[arg(
        long,
        value_name = "EVENT",
        help = "Capture once the page dispatches this event on document"
    )]
    pub render_after_event: Option<String>,

    #[arg(long, value_name = "MS", help = "Capture after this many milliseconds")]
    pub render_after_time: Option<u64>,

    #[arg(
        long,
        value_name = "SELECTOR",
        help = "Capture only once this selector matches an element"
    )]
    pub render_after_element: Option<String>,

    #[arg(
        long,
        value_name = "JSON",
        help = "JSON value injected into the page before any script runs"
    )]
    pub inject: Option<String>,

    #[arg(long, value_name = "NAME", help = "Global property holding the injected value")]
    pub inject_property: Option<String>,

    #[arg(long, help = "Viewport dimensions (WIDTHxHEIGHT or WIDTHxHEIGHT@SCALE)")]
    pub viewport: Option<Viewport>,

    #[arg(long, value_enum, help = "Navigation milestone to wait for")]
    pub wait_until: Option<WaitUntilArg>,

    #[arg(long, value_name = "SECS", help = "Navigation timeout (seconds)")]
    pub nav_timeout: Option<u64>,

    #[arg(
        long,
        value_name = "SECS",
        help = "Timeout (seconds) for --render-after-event and --render-after-element"
    )]
    pub wait_timeout: Option<u64>,

    #[arg(long, value_name = "PATH", help = "Chrome/Chromium executable")]
    pub chrome: Option<PathBuf>,

    #[arg(long, help = "Show the browser window")]
    pub headful: bool,

    #[arg(long, help = "Launch Chromium with --no-sandbox")]
    pub no_sandbox: bool,

    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Report file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum WaitUntilArg {
    Load,
    Domcontentloaded,
    Networkidle0,
    Networkidle2,
}

impl From<WaitUntilArg> for WaitUntil {
    fn from(arg: WaitUntilArg) -> Self {
        match arg {
            WaitUntilArg::Load => WaitUntil::Load,
            WaitUntilArg::Domcontentloaded => WaitUntil::DomContentLoaded,
            WaitUntilArg::Networkidle0 => WaitUntil::NetworkIdle0,
            WaitUntilArg::Networkidle2 => WaitUntil::NetworkIdle2,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, OutputFormat, WaitUntilArg};
    use clap::Parser;

    #[test]
    fn render_command_uses_defaults() {
        let cli = Cli::parse_from(["prerender", "render", "--static-dir", "dist", "--route", "/"]);

        assert!(!cli.verbose);
        assert!(cli.config.is_none());

        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.static_dir.as_deref(), Some(std::path::Path::new("dist")));
                assert_eq!(args.routes, vec!["/".to_string()]);
                assert!(args.output_dir.is_none());
                assert!(args.port.is_none());
                assert!(args.max_concurrent.is_none());
                assert!(!args.skip_third_party);
                assert!(!args.headful);
                assert!(args.viewport.is_none());
                assert!(matches!(args.format, OutputFormat::Json));
                assert!(args.output.is_none());
            }
        }
    }

    #[test]
    fn render_command_respects_overrides() {
        let cli = Cli::parse_from([
            "prerender",
            "--verbose",
            "render",
            "--static-dir",
            "build",
            "--output-dir",
            "out",
            "--route",
            "/",
            "--route",
            "/about",
            "--port",
            "0",
            "--max-concurrent",
            "3",
            "--skip-third-party",
            "--render-after-event",
            "app-rendered",
            "--render-after-element",
            "#app",
            "--inject",
            "{\"a\":1}",
            "--viewport",
            "375x812@3",
            "--wait-until",
            "networkidle2",
            "--nav-timeout",
            "20",
            "--chrome",
            "/usr/bin/chromium",
            "--format",
            "pretty",
            "--config",
            "prerender.toml",
        ]);

        assert!(cli.verbose);
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("prerender.toml"))
        );
        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.routes, vec!["/".to_string(), "/about".to_string()]);
                assert_eq!(args.port, Some(0));
                assert_eq!(args.max_concurrent, Some(3));
                assert!(args.skip_third_party);
                assert_eq!(args.render_after_event.as_deref(), Some("app-rendered"));
                assert_eq!(args.render_after_element.as_deref(), Some("#app"));
                assert_eq!(args.inject.as_deref(), Some("{\"a\":1}"));
                let viewport = args.viewport.expect("viewport");
                assert_eq!(viewport.width, 375);
                assert_eq!(viewport.device_scale_factor, 3.0);
                assert!(matches!(args.wait_until, Some(WaitUntilArg::Networkidle2)));
                assert_eq!(args.nav_timeout, Some(20));
                assert!(matches!(args.format, OutputFormat::Pretty));
            }
        }
    }
}
