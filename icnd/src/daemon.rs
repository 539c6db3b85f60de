use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use icn_forwarder::{ForwardingEngine, ForwardingStats, ManagementHandle};
use log::{error, info, warn};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::Config;
use crate::face_manager::{FaceInfo, FaceManager};
use crate::service::Service;

/// Periodic status line
#[derive(Debug, Serialize)]
pub struct DaemonStatus {
    pub faces: Vec<FaceInfo>,
    pub cs_size: usize,
    pub fib_size: usize,
    pub pit_size: usize,
    pub stats: ForwardingStats,
}

impl DaemonStatus {
    async fn collect(management: &ManagementHandle, face_manager: &FaceManager) -> Self {
        Self {
            faces: face_manager.list_faces().await,
            cs_size: management.cs_size().await,
            fib_size: management.fib_size().await,
            pit_size: management.pit_size().await,
            stats: management.stats().await,
        }
    }
}

pub struct Daemon {
    config: Config,
    management: Option<ManagementHandle>,
    face_manager: Option<Arc<FaceManager>>,
    engine_task: Option<JoinHandle<icn_forwarder::Result<()>>>,
    status_task: Option<JoinHandle<()>>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            management: None,
            face_manager: None,
            engine_task: None,
            status_task: None,
        }
    }

    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.engine_task.is_some() {
            anyhow::bail!("daemon already started");
        }
        info!("Starting ICN daemon services");

        let engine = ForwardingEngine::new(self.config.forwarding_config())
            .context("invalid forwarder configuration")?;
        let management = engine.management();
        self.seed_tables(&management).await;

        let (face_manager, channels) = FaceManager::new(self.config.daemon.queue_capacity, management.clone());
        let face_manager = Arc::new(face_manager);
        if let Err(e) = face_manager.start().await {
            error!("Failed to start {}: {}", face_manager.name(), e);
            return Err(e);
        }

        self.engine_task = Some(tokio::spawn(async move { engine.run(channels).await }));

        if let Some(period) = self.config.status_interval() {
            self.status_task = Some(tokio::spawn(log_status(
                period,
                management.clone(),
                face_manager.clone(),
            )));
        }

        self.management = Some(management);
        self.face_manager = Some(face_manager);
        info!("All services started successfully");
        Ok(())
    }

    pub async fn stop(&mut self) {
        info!("Stopping ICN daemon services");

        if let Some(task) = self.status_task.take() {
            task.abort();
        }

        // stop the engine before its queues go away
        if let Some(management) = self.management.take() {
            management.shutdown();
        }
        if let Some(task) = self.engine_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Forwarding engine failed: {}", e),
                Err(e) => error!("Forwarding engine task did not complete: {}", e),
            }
        }

        if let Some(face_manager) = self.face_manager.take() {
            if let Err(e) = face_manager.stop().await {
                error!("Failed to stop {}: {}", face_manager.name(), e);
            }
        }

        info!("All services stopped");
    }

    pub fn face_manager(&self) -> Option<Arc<FaceManager>> {
        self.face_manager.clone()
    }

    pub fn management(&self) -> Option<ManagementHandle> {
        self.management.clone()
    }

    /// Install configured routes and pinned content
    async fn seed_tables(&self, management: &ManagementHandle) {
        for route in &self.config.routes {
            management
                .add_fib_entry(route.name(), route.faces.clone(), route.is_static)
                .await;
        }
        for content in &self.config.static_content {
            management.insert_static_content(content.to_content()).await;
        }
        info!(
            "Seeded {} routes and {} static content objects",
            self.config.routes.len(),
            self.config.static_content.len()
        );
    }
}

async fn log_status(period: Duration, management: ManagementHandle, face_manager: Arc<FaceManager>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let status = DaemonStatus::collect(&management, &face_manager).await;
        match serde_json::to_string(&status) {
            Ok(json) => info!("Status: {}", json),
            Err(e) => warn!("Failed to encode status: {}", e),
        }
    }
}
