//! # Hearth Hub
//!
//! Process lifecycle controller: owns the [`MessageBus`], starts the built-in
//! applications, declares them configured and tears everything down on
//! shutdown.
//!
//! ## Example
//! ```no_run
//! use hearth_hub::Hub;
//! use hearth_kernel::config::HubConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Hub::new(HubConfig::default()).run().await
//! }
//! ```

pub mod apps;

use anyhow::{Context, Result};
use apps::{MonitorApp, SystemApp};
use hearth_bus::{Bootstrap, BusClient, MessageBus, Params};
use hearth_kernel::config::HubConfig;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Core event broadcast once every application is configured.
pub const HUB_STARTED: &str = "system.hub.started";

/// A hub with its bus and built-in applications.
#[must_use = "call .run().await to start the hub"]
#[derive(Debug)]
pub struct Hub {
    config: HubConfig,
    bootstrap: Bootstrap,
    system: BusClient<SystemApp>,
    monitor: BusClient<MonitorApp>,
    janitor: Option<JoinHandle<()>>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let bus = MessageBus::new(config.bus.clone());
        let bootstrap = Bootstrap::new(bus.clone());
        let system = BusClient::new(SystemApp::new(bus), &bootstrap);
        let monitor = BusClient::new(MonitorApp::default(), &bootstrap);
        Self { config, bootstrap, system, monitor, janitor: None }
    }

    #[must_use]
    pub const fn bootstrap(&self) -> &Bootstrap {
        &self.bootstrap
    }

    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bootstrap.bus
    }

    #[must_use]
    pub const fn system(&self) -> &BusClient<SystemApp> {
        &self.system
    }

    #[must_use]
    pub const fn monitor(&self) -> &BusClient<MonitorApp> {
        &self.monitor
    }

    /// Starts the applications, declares them configured and announces it.
    ///
    /// # Errors
    /// Returns an error if an application cannot subscribe or the
    /// announcement cannot be broadcast.
    pub async fn start(&mut self) -> Result<()> {
        self.system.start().context("Failed to start the system application")?;
        self.monitor.start().context("Failed to start the monitor application")?;

        self.bus().app_configured();
        self.janitor = Some(self.bus().spawn_janitor(self.config.bus.purge_interval()));

        self.system
            .send_core_event(HUB_STARTED, Params::new().with("modules", self.bus().subscriptions()))
            .await
            .context("Failed to announce hub start")?;
        info!(modules = ?self.bus().subscriptions(), "Hub started");
        Ok(())
    }

    /// Stops the bus first, then every application.
    pub async fn shutdown(mut self) {
        self.bus().stop();
        self.monitor.stop().await;
        self.system.stop().await;
        if let Some(janitor) = self.janitor.take()
            && let Err(e) = janitor.await
        {
            warn!("Subscription janitor ended abnormally: {e}");
        }
        info!("Hub shutdown complete");
    }

    /// Starts the hub and runs until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    /// Returns an error if startup fails; the hub is still shut down cleanly.
    pub async fn run(mut self) -> Result<()> {
        if let Err(e) = self.start().await {
            self.shutdown().await;
            return Err(e);
        }

        if let Err(e) = shutdown_signal().await {
            error!("Error while waiting for shutdown signal: {e}");
        } else {
            info!("Shutdown signal received");
        }
        self.shutdown().await;
        Ok(())
    }
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res,
        res = terminate => res,
    }
}
