//! Poll loop and lifecycle: drives fetch→publish cycles at a fixed interval
//! until asked to stop, then logs out every session.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::DeviceApi;
use crate::config::MonitorConfig;
use crate::fetch;
use crate::publish::{MetricSink, Publisher};
use crate::session::SessionManager;

pub struct Daemon {
    config: MonitorConfig,
    sessions: SessionManager,
    publisher: Publisher,
}

impl Daemon {
    pub fn new(config: MonitorConfig, api: Arc<dyn DeviceApi>, sink: Box<dyn MetricSink>) -> Self {
        Self {
            config,
            sessions: SessionManager::new(api),
            publisher: Publisher::new(sink),
        }
    }

    /// Runs until the shutdown flag flips: connect to every configured
    /// device, then loop fetch→publish→sleep. The flag is checked once per
    /// iteration boundary; an in-flight cycle always completes before the
    /// drain starts.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.sessions.connect_all(&self.config).await;
        let interval = Duration::from_secs(self.config.interval);
        info!(
            interval_secs = self.config.interval,
            active = self.sessions.active().len(),
            "entering poll loop"
        );

        while !*shutdown.borrow() {
            self.poll_cycle().await;
            // Fixed sleep between cycles; a stop signal cuts the sleep
            // short but never an in-flight cycle.
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("stop requested, draining");
        self.sessions.disconnect_all().await;
        Ok(())
    }

    /// One full fetch+publish pass across all active sessions. A fetch
    /// failure skips that device's samples for this cycle only.
    async fn poll_cycle(&mut self) {
        for session in self.sessions.active() {
            match fetch::fetch(session).await {
                Ok(samples) => {
                    for sample in &samples {
                        self.publisher.publish(&self.config, sample);
                    }
                }
                Err(e) => {
                    warn!(device = %session.key, error = %e,
                          "fetch failed, skipping device this cycle");
                }
            }
        }
    }
}

/// Wires SIGTERM/SIGINT into a watch channel the poll loop consumes.
pub fn shutdown_channel() -> std::io::Result<watch::Receiver<bool>> {
    use tokio::signal::unix::{signal, SignalKind};

    let (tx, rx) = watch::channel(false);
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM received"),
            _ = sigint.recv() => info!("SIGINT received"),
        }
        let _ = tx.send(true);
    });
    Ok(rx)
}
