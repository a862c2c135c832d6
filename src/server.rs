//! Local static file server the routes are rendered against.
//!
//! Unknown paths fall back to `index.html` so client-side routes resolve the
//! same way they would behind a production SPA host.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, warn};

use crate::options::ServerTarget;
use crate::{PrerenderError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

pub struct StaticServer {
    host: String,
    addr: SocketAddr,
    root: PathBuf,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl StaticServer {
    /// Serves `static_dir` on `host:port`. Port 0 picks a free port.
    pub async fn start(static_dir: &Path, host: &str, port: u16) -> Result<Self> {
        if !static_dir.is_dir() {
            return Err(PrerenderError::Config(format!(
                "static dir {} does not exist or is not a directory",
                static_dir.display()
            )));
        }

        let index = static_dir.join("index.html");
        let files = ServeDir::new(static_dir).fallback(ServeFile::new(index));
        let app = Router::new().fallback_service(files);

        let listener = TcpListener::bind((host, port)).await.map_err(|err| {
            PrerenderError::Server(format!("unable to bind {}:{}: {}", host, port, err))
        })?;
        let addr = listener.local_addr()?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        debug!(%addr, root = %static_dir.display(), "static server listening");
        Ok(Self {
            host: host.to_string(),
            addr,
            root: static_dir.to_path_buf(),
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host/port pages should be loaded from.
    pub fn target(&self) -> ServerTarget {
        ServerTarget::new(self.host.clone(), self.addr.port())
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(Ok(())) => debug!(addr = %self.addr, "static server stopped"),
            Ok(Err(err)) => warn!(error = %err, "static server failed"),
            Err(err) => warn!(error = %err, "static server task panicked"),
        }
    }
}
