//! loopchain - keyed image and latent storage for looped graph execution
//!
//! One part of a graph stashes images or latents under a key; another part,
//! possibly on a later loop iteration, reads them back whole or a page at a
//! time. A small HTTP API reports how many pages a key holds.

pub mod api;
pub mod images;
pub mod nodes;
pub mod storage;
pub mod tensor;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use images::ImageSources;
use nodes::NodeRunner;
use storage::Storage;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Uploaded files and folders; unannotated names resolve here
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8188)),
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            temp_dir: PathBuf::from("temp"),
        }
    }
}

impl Config {
    /// Defaults, then an optional TOML file, then `LOOPCHAIN_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("LOOPCHAIN_")).extract()
    }

    pub fn sources(&self) -> ImageSources {
        ImageSources::new(&self.input_dir, &self.output_dir, &self.temp_dir)
    }
}

/// The loopchain server instance
pub struct Server {
    config: Config,
    runner: Arc<NodeRunner>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance with empty storage
    pub fn new(config: Config) -> Result<Self> {
        for dir in [&config.input_dir, &config.output_dir, &config.temp_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let runner = Arc::new(NodeRunner::new(Arc::new(Storage::new()), config.sources()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            runner,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.runner.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "loopchain listening on {} (input dir {})",
            local_addr,
            self.config.input_dir.display()
        );

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("loopchain shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
